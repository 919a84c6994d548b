// RDS IAM auth token signing (SigV4 query presigning)

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::types::{AwsCredentials, CredentialsProvider};
use crate::auth::AuthToken;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "rds-db";

/// Token validity advertised to the database, in seconds
pub const TOKEN_EXPIRY_SECS: u64 = 900;

/// SHA-256 of the empty payload
const EMPTY_PAYLOAD_HASH: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Produces the time-limited secret that replaces a database password
#[async_trait]
pub trait TokenSigner: Send + Sync {
    async fn sign(
        &self,
        endpoint: &str,
        region: &str,
        db_user: &str,
        credentials: &dyn CredentialsProvider,
    ) -> Result<AuthToken>;
}

/// Signer producing standard RDS IAM auth tokens
#[derive(Debug, Clone, Default)]
pub struct SigV4TokenSigner;

impl SigV4TokenSigner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TokenSigner for SigV4TokenSigner {
    async fn sign(
        &self,
        endpoint: &str,
        region: &str,
        db_user: &str,
        credentials: &dyn CredentialsProvider,
    ) -> Result<AuthToken> {
        let creds = credentials
            .credentials()
            .await
            .with_context(|| format!("Failed to retrieve credentials from {}", credentials.name()))?;

        let token = presign_auth_token(endpoint, region, db_user, &creds, Utc::now())?;
        Ok(AuthToken::new(token))
    }
}

/// Build a presigned `connect` request for `endpoint`, without the scheme
pub fn presign_auth_token(
    endpoint: &str,
    region: &str,
    db_user: &str,
    creds: &AwsCredentials,
    now: DateTime<Utc>,
) -> Result<String> {
    validate_endpoint(endpoint)?;
    if region.is_empty() {
        anyhow::bail!("Region is required to sign an RDS auth token");
    }
    if db_user.is_empty() {
        anyhow::bail!("Database user is required to sign an RDS auth token");
    }

    let date = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let scope = format!("{}/{}/{}/aws4_request", date, region, SERVICE);

    let mut params = vec![
        ("Action", "connect".to_string()),
        ("DBUser", db_user.to_string()),
        ("X-Amz-Algorithm", ALGORITHM.to_string()),
        ("X-Amz-Credential", format!("{}/{}", creds.access_key_id, scope)),
        ("X-Amz-Date", amz_date.clone()),
        ("X-Amz-Expires", TOKEN_EXPIRY_SECS.to_string()),
        ("X-Amz-SignedHeaders", "host".to_string()),
    ];
    if let Some(ref session_token) = creds.session_token {
        params.push(("X-Amz-Security-Token", session_token.clone()));
    }

    let canonical_query = canonical_query_string(&params);
    let canonical_request = format!(
        "GET\n/\n{}\nhost:{}\n\nhost\n{}",
        canonical_query, endpoint, EMPTY_PAYLOAD_HASH
    );

    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let signing_key = derive_signing_key(&creds.secret_access_key, &date, region)?;
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

    Ok(format!(
        "{}/?{}&X-Amz-Signature={}",
        endpoint, canonical_query, signature
    ))
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let (host, port) = endpoint
        .rsplit_once(':')
        .context("Endpoint must be in host:port form")?;

    if host.is_empty() {
        anyhow::bail!("Endpoint host is empty");
    }
    port.parse::<u16>()
        .with_context(|| format!("Endpoint port is not a number: {}", port))?;

    Ok(())
}

/// Sort and percent-encode query parameters per SigV4 rules
fn canonical_query_string(params: &[(&str, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| {
            (
                urlencoding::encode(key).into_owned(),
                urlencoding::encode(value).into_owned(),
            )
        })
        .collect();
    encoded.sort();

    encoded
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

fn derive_signing_key(secret_access_key: &str, date: &str, region: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_access_key).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, SERVICE.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("HMAC init failed: {}", e))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
