// Test doubles for the credential collaborators

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::auth::AuthToken;
use crate::aws::{
    AwsCredentials, CredentialResolver, CredentialsProvider, StaticCredentialsProvider, TokenSigner,
};

/// Resolver counting calls, optionally failing
#[derive(Default)]
pub struct StubResolver {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl StubResolver {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialResolver for StubResolver {
    async fn resolve(&self, _region: &str) -> anyhow::Result<Arc<dyn CredentialsProvider>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("no credentials available");
        }
        Ok(Arc::new(StaticCredentialsProvider::new(AwsCredentials::new(
            "AKIDTEST",
            "test-secret",
        ))))
    }
}

/// Signer handing out `token-1`, `token-2`, ... and recording its arguments
#[derive(Default)]
pub struct StubSigner {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Option<Duration>,
    pub seen: Mutex<Vec<(String, String, String)>>,
}

impl StubSigner {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(String, String, String)> {
        self.seen.lock().ok().and_then(|seen| seen.last().cloned())
    }
}

#[async_trait]
impl TokenSigner for StubSigner {
    async fn sign(
        &self,
        endpoint: &str,
        region: &str,
        db_user: &str,
        credentials: &dyn CredentialsProvider,
    ) -> anyhow::Result<AuthToken> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        credentials.credentials().await?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("signing service unavailable");
        }

        if let Ok(mut seen) = self.seen.lock() {
            seen.push((endpoint.to_string(), region.to_string(), db_user.to_string()));
        }
        Ok(AuthToken::new(format!("token-{}", n)))
    }
}
