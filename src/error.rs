// Error handling module
// Defines the error taxonomy surfaced to the storage layer

use thiserror::Error;

/// Errors that can occur while preparing or refreshing IAM credentials
///
/// No variant ever carries a token or password. Connection strings are only
/// described by the reason they failed to parse.
#[derive(Error, Debug)]
pub enum IamAuthError {
    /// Connection string is not a postgres:// or mysql:// URL
    #[error("RDS IAM authentication is only supported for postgres:// and mysql:// connection strings")]
    UnsupportedScheme,

    /// Connection string could not be parsed
    #[error("Malformed connection string: {0}")]
    MalformedConnectionString(String),

    /// Credential resolution for the region failed
    #[error("Failed to resolve AWS credentials for region {region}")]
    CredentialResolutionFailed {
        region: String,
        #[source]
        source: anyhow::Error,
    },

    /// The signer could not produce a token
    #[error("Failed to build RDS IAM auth token for {endpoint}")]
    TokenSigningFailed {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },

    /// The base connection string could not take the new token
    #[error("Failed to inject RDS IAM token into connection string")]
    SecretInjectionFailed(#[source] Box<IamAuthError>),

    /// The caller cancelled the operation
    #[error("RDS IAM token refresh cancelled")]
    Cancelled,

    /// No driver is registered under the requested name
    #[error("Unknown database driver: {0}")]
    UnknownDriver(String),

    /// The wrapped driver failed to open a connection
    #[error("Failed to open database connection")]
    ConnectFailed(#[source] anyhow::Error),
}

impl IamAuthError {
    /// Whether the failure may succeed on a later attempt
    ///
    /// Configuration errors never do; collaborator and driver failures might.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IamAuthError::CredentialResolutionFailed { .. }
                | IamAuthError::TokenSigningFailed { .. }
                | IamAuthError::ConnectFailed(_)
        )
    }
}

/// Result type alias for credential operations
pub type Result<T> = std::result::Result<T, IamAuthError>;
