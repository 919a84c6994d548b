// RDS IAM Auth - Library root

pub mod auth;
pub mod aws;
pub mod config;
pub mod conn_string;
pub mod connector;
#[cfg(feature = "sqlx")]
pub mod drivers;
pub mod error;

#[cfg(test)]
mod testing;

pub use auth::{build, build_with, AuthToken, BackgroundRefresher, RdsIamAuthenticator};
pub use config::{RdsIamConfig, StorageConfig, DEFAULT_TOKEN_REFRESH_INTERVAL};
pub use connector::{create_connector, Driver, DriverRegistry, IamConnector};
pub use error::{IamAuthError, Result};
