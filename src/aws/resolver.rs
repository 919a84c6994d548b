// Default credential resolution, backed by the AWS SDK provider chain

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::default_provider::region::DefaultRegionChain;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_types::region::Region;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::types::{AwsCredentials, CredentialResolver, CredentialsProvider};

/// Renew cached credentials this long before they expire
const EXPIRY_BUFFER_SECS: i64 = 300;

/// Resolves credentials from the standard AWS sources
///
/// Uses the SDK default chain: environment, shared config and credentials
/// files (profiles, SSO, `credential_process`), web identity, container
/// endpoint and EC2 instance metadata. One provider is kept per region, so
/// token refreshes reuse both the chain and its cached credentials.
#[derive(Default)]
pub struct DefaultCredentialResolver {
    providers: Mutex<HashMap<String, Arc<SdkCredentialsProvider>>>,
}

impl DefaultCredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialResolver for DefaultCredentialResolver {
    async fn resolve(&self, region: &str) -> Result<Arc<dyn CredentialsProvider>> {
        if region.is_empty() {
            anyhow::bail!("Region is required to resolve AWS credentials");
        }

        let mut providers = self.providers.lock().await;
        if let Some(provider) = providers.get(region) {
            return Ok(provider.clone());
        }

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        let chain = sdk_config
            .credentials_provider()
            .context("AWS default credential chain is not available")?;

        tracing::debug!(region = %region, "Loaded AWS default credential chain");

        let provider = Arc::new(SdkCredentialsProvider::new(chain));
        providers.insert(region.to_string(), provider.clone());
        Ok(provider)
    }
}

/// Credentials from an SDK provider, cached until close to their expiry
pub struct SdkCredentialsProvider {
    inner: SharedCredentialsProvider,
    cached: RwLock<Option<AwsCredentials>>,
}

impl SdkCredentialsProvider {
    pub fn new(inner: SharedCredentialsProvider) -> Self {
        Self {
            inner,
            cached: RwLock::new(None),
        }
    }
}

#[async_trait]
impl CredentialsProvider for SdkCredentialsProvider {
    async fn credentials(&self) -> Result<AwsCredentials> {
        {
            let cached = self.cached.read().await;
            if let Some(ref creds) = *cached {
                if !creds.expires_within(Duration::seconds(EXPIRY_BUFFER_SECS)) {
                    return Ok(creds.clone());
                }
            }
        }

        let creds = self
            .inner
            .provide_credentials()
            .await
            .context("Failed to load AWS credentials from the default chain")?;
        let creds = AwsCredentials::from(&creds);

        tracing::debug!(
            access_key_id = %creds.access_key_id,
            expires_at = ?creds.expires_at,
            "AWS credentials loaded"
        );

        *self.cached.write().await = Some(creds.clone());
        Ok(creds)
    }

    fn name(&self) -> &'static str {
        "aws-sdk"
    }
}

impl From<&Credentials> for AwsCredentials {
    fn from(credentials: &Credentials) -> Self {
        let mut creds = AwsCredentials::new(credentials.access_key_id(), credentials.secret_access_key());
        if let Some(session_token) = credentials.session_token() {
            creds = creds.with_session_token(session_token);
        }
        if let Some(expiry) = credentials.expiry() {
            creds = creds.with_expiration(DateTime::<Utc>::from(expiry));
        }
        creds
    }
}

/// Region from the SDK default chain
///
/// Checks `AWS_REGION`, `AWS_DEFAULT_REGION`, the active profile and
/// instance metadata.
pub async fn default_region() -> Option<String> {
    DefaultRegionChain::builder()
        .build()
        .region()
        .await
        .map(|region| region.to_string())
}
