// Connector adapter
// Opens every physical connection with a freshly checked token

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::auth::RdsIamAuthenticator;
use crate::error::{IamAuthError, Result};

/// Low-level database driver able to open one connection from a connection string
#[async_trait]
pub trait Driver: Send + Sync {
    type Connection: Send + 'static;

    async fn open(&self, connection_string: &str) -> anyhow::Result<Self::Connection>;
}

/// Connector that asks the authenticator for a connection string right
/// before every open
///
/// Nothing is cached between opens, so connections created long after the
/// pool started (scale-up, eviction) still get a valid token.
pub struct IamConnector<C> {
    authenticator: Arc<RdsIamAuthenticator>,
    driver: Arc<dyn Driver<Connection = C>>,
}

impl<C: Send + 'static> IamConnector<C> {
    pub fn new(authenticator: Arc<RdsIamAuthenticator>, driver: Arc<dyn Driver<Connection = C>>) -> Self {
        Self {
            authenticator,
            driver,
        }
    }

    /// Open a new physical connection
    ///
    /// A failed refresh fails the open without contacting the database.
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<C> {
        let connection_string = self.authenticator.current_connection_string(cancel).await?;

        tracing::debug!(
            endpoint = %self.authenticator.endpoint(),
            "Opening database connection with RDS IAM token"
        );

        self.driver
            .open(&connection_string)
            .await
            .map_err(IamAuthError::ConnectFailed)
    }

    pub fn driver(&self) -> &Arc<dyn Driver<Connection = C>> {
        &self.driver
    }

    pub fn authenticator(&self) -> &Arc<RdsIamAuthenticator> {
        &self.authenticator
    }
}

impl<C> Clone for IamConnector<C> {
    fn clone(&self) -> Self {
        Self {
            authenticator: self.authenticator.clone(),
            driver: self.driver.clone(),
        }
    }
}

/// Named drivers producing connections of type `C`
pub struct DriverRegistry<C> {
    drivers: HashMap<String, Arc<dyn Driver<Connection = C>>>,
}

impl<C> DriverRegistry<C> {
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Register `driver` under `name` (aliases are normalized)
    pub fn register(&mut self, name: &str, driver: Arc<dyn Driver<Connection = C>>) {
        self.drivers.insert(canonical_driver_name(name).to_string(), driver);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver<Connection = C>>> {
        self.drivers.get(canonical_driver_name(name)).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<C> Default for DriverRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Map driver aliases to the scheme name they serve
fn canonical_driver_name(name: &str) -> &str {
    match name {
        "postgresql" | "pgx" => "postgres",
        other => other,
    }
}

/// Bind an authenticator to the driver registered as `driver_name`
pub fn create_connector<C: Send + 'static>(
    driver_name: &str,
    authenticator: Arc<RdsIamAuthenticator>,
    registry: &DriverRegistry<C>,
) -> Result<IamConnector<C>> {
    let driver = registry
        .get(driver_name)
        .ok_or_else(|| IamAuthError::UnknownDriver(driver_name.to_string()))?;

    Ok(IamConnector::new(authenticator, driver))
}
