// Authentication module
// Manages the RDS IAM token lifecycle for one database target

mod authenticator;
mod background;
mod builder;
mod types;

pub use authenticator::RdsIamAuthenticator;
pub use background::BackgroundRefresher;
pub use builder::{build, build_with};
pub use types::AuthToken;
