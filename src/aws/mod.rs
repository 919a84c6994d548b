// AWS collaborators
// Credential resolution and RDS auth token signing

mod resolver;
mod signer;
mod types;

pub use resolver::{default_region, DefaultCredentialResolver, SdkCredentialsProvider};
pub use signer::{presign_auth_token, SigV4TokenSigner, TokenSigner, TOKEN_EXPIRY_SECS};
pub use types::{
    AwsCredentials, CredentialResolver, CredentialsProvider, StaticCredentialResolver,
    StaticCredentialsProvider,
};
