// sqlx-backed drivers for the connector adapter

use anyhow::Context;
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::PgConnection;
use sqlx::{ConnectOptions, Connection};
use std::str::FromStr;

use crate::connector::Driver;

/// Opens `sqlx::PgConnection`s
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

#[async_trait]
impl Driver for PostgresDriver {
    type Connection = PgConnection;

    async fn open(&self, connection_string: &str) -> anyhow::Result<PgConnection> {
        PgConnection::connect(connection_string)
            .await
            .context("Failed to open postgres connection")
    }
}

/// Opens `sqlx::MySqlConnection`s
///
/// IAM tokens are sent with the cleartext auth plugin, so the connection
/// string should require TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDriver;

#[async_trait]
impl Driver for MySqlDriver {
    type Connection = MySqlConnection;

    async fn open(&self, connection_string: &str) -> anyhow::Result<MySqlConnection> {
        MySqlConnectOptions::from_str(connection_string)
            .context("Failed to parse mysql connection string")?
            .enable_cleartext_plugin(true)
            .connect()
            .await
            .context("Failed to open mysql connection")
    }
}
