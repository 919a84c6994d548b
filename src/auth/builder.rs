// Wiring: turn a configured connection string into an IAM-authenticated one

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::authenticator::RdsIamAuthenticator;
use crate::aws::{
    default_region, CredentialResolver, DefaultCredentialResolver, SigV4TokenSigner, TokenSigner,
};
use crate::config::RdsIamConfig;
use crate::conn_string::{parse_for_credential_swap, ConnectionDescriptor};
use crate::error::{IamAuthError, Result};

/// Prepare a connection string for RDS IAM authentication
///
/// Uses the default AWS credential chain and SigV4 signer. When the feature
/// is disabled the input is returned unchanged and no authenticator is created.
pub async fn build(
    connection_string: &str,
    config: RdsIamConfig,
) -> Result<(String, Option<Arc<RdsIamAuthenticator>>)> {
    if !config.enabled {
        return Ok((connection_string.to_string(), None));
    }

    build_with(
        connection_string,
        config,
        Arc::new(DefaultCredentialResolver::new()),
        Arc::new(SigV4TokenSigner::new()),
        &CancellationToken::new(),
    )
    .await
}

/// [`build`] with explicit collaborators and cancellation
///
/// Extracts the endpoint, strips the password, fetches the first token and
/// returns the connection string carrying it.
pub async fn build_with(
    connection_string: &str,
    mut config: RdsIamConfig,
    resolver: Arc<dyn CredentialResolver>,
    signer: Arc<dyn TokenSigner>,
    cancel: &CancellationToken,
) -> Result<(String, Option<Arc<RdsIamAuthenticator>>)> {
    if !config.enabled {
        return Ok((connection_string.to_string(), None));
    }

    let (endpoint, base_connection_string) =
        parse_for_credential_swap(connection_string, &config.db_user)?;

    if config.region.is_empty() {
        config.region = default_region().await.ok_or_else(|| {
            IamAuthError::CredentialResolutionFailed {
                region: String::new(),
                source: anyhow::anyhow!(
                    "no AWS region configured (set the rdsiam region, AWS_REGION or a profile region)"
                ),
            }
        })?;
    }

    let db_user = if config.db_user.is_empty() {
        ConnectionDescriptor::parse(&base_connection_string)?
            .username()
            .unwrap_or_default()
    } else {
        config.db_user.clone()
    };

    let authenticator = Arc::new(RdsIamAuthenticator::new(
        config,
        endpoint,
        db_user,
        base_connection_string,
        resolver,
        signer,
    ));

    let connection_string = authenticator
        .current_connection_string(cancel)
        .await
        .inspect_err(|e| {
            tracing::error!(
                endpoint = %authenticator.endpoint(),
                error = %e,
                "Failed to generate initial RDS IAM token"
            );
        })?;

    tracing::info!(
        endpoint = %authenticator.endpoint(),
        db_user = %authenticator.db_user(),
        refresh_interval_secs = authenticator.refresh_interval().as_secs(),
        "AWS RDS IAM authentication enabled for SQL database"
    );

    Ok((connection_string, Some(authenticator)))
}
