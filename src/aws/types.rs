// AWS credential types and collaborator traits

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;

/// Access credentials used to sign tokens
#[derive(Clone, PartialEq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expires_at: None,
        }
    }

    pub fn with_session_token(mut self, session_token: impl Into<String>) -> Self {
        self.session_token = Some(session_token.into());
        self
    }

    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Check if the credentials expire within `window` (never, if no expiry is known)
    pub fn expires_within(&self, window: Duration) -> bool {
        match self.expires_at {
            None => false,
            Some(exp) => exp <= Utc::now() + window,
        }
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"****")
            .field("session_token", &self.session_token.as_ref().map(|_| "****"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Reusable source of access credentials
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// Current credentials, fetching or renewing them if the source requires it
    async fn credentials(&self) -> anyhow::Result<AwsCredentials>;

    /// Short name of the source, for logs
    fn name(&self) -> &'static str;
}

/// Region-scoped lookup of a credentials provider
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, region: &str) -> anyhow::Result<Arc<dyn CredentialsProvider>>;
}

/// Provider that always returns the same credentials
#[derive(Debug, Clone)]
pub struct StaticCredentialsProvider {
    credentials: AwsCredentials,
    name: &'static str,
}

impl StaticCredentialsProvider {
    pub fn new(credentials: AwsCredentials) -> Self {
        Self {
            credentials,
            name: "static",
        }
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentialsProvider {
    async fn credentials(&self) -> anyhow::Result<AwsCredentials> {
        Ok(self.credentials.clone())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Resolver that hands out one fixed provider regardless of region
#[derive(Clone)]
pub struct StaticCredentialResolver {
    provider: Arc<dyn CredentialsProvider>,
}

impl StaticCredentialResolver {
    pub fn new(provider: Arc<dyn CredentialsProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(&self, _region: &str) -> anyhow::Result<Arc<dyn CredentialsProvider>> {
        Ok(self.provider.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = AwsCredentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI").with_session_token("session-secret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("AKIDEXAMPLE"));
        assert!(!debug.contains("wJalrXUtnFEMI"));
        assert!(!debug.contains("session-secret"));
    }

    #[test]
    fn test_expires_within() {
        let creds = AwsCredentials::new("a", "b");
        assert!(!creds.expires_within(Duration::minutes(5)));

        let creds = creds.with_expiration(Utc::now() + Duration::minutes(2));
        assert!(creds.expires_within(Duration::minutes(5)));
        assert!(!creds.expires_within(Duration::seconds(30)));
    }

    #[tokio::test]
    async fn test_static_resolver_returns_provider() {
        let provider = Arc::new(StaticCredentialsProvider::new(AwsCredentials::new("a", "b")));
        let resolver = StaticCredentialResolver::new(provider);

        let resolved = resolver.resolve("us-east-1").await.unwrap();
        assert_eq!(resolved.name(), "static");
        assert_eq!(resolved.credentials().await.unwrap().access_key_id, "a");
    }
}
