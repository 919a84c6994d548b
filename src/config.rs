use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::conn_string::redact_password;

/// Refresh interval used when none (or zero) is configured
///
/// RDS tokens are valid for 15 minutes, so tokens are refreshed a minute early.
pub const DEFAULT_TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(14 * 60);

/// Prefix of environment variables read by [`StorageConfig::load`]
const ENV_PREFIX: &str = "STORAGE";

/// RDS IAM Auth - print or verify an IAM-authenticated connection string
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Configuration file (toml, yaml or json)
    #[arg(short, long, env = "STORAGE_CONFIG_FILE")]
    pub config: Option<String>,

    /// Database connection string (postgres:// or mysql://)
    #[arg(long)]
    pub connection: Option<String>,

    /// AWS region of the RDS instance
    #[arg(short, long)]
    pub region: Option<String>,

    /// Database user to authenticate as
    #[arg(short = 'u', long)]
    pub db_user: Option<String>,

    /// Token refresh interval (e.g. 14m, 300s)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub refresh_interval: Option<Duration>,

    /// Enable IAM authentication regardless of the configuration file
    #[arg(long)]
    pub enable: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Print the connection string including the token
    #[arg(long)]
    pub show_secret: bool,
}

/// AWS RDS IAM authentication settings
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RdsIamConfig {
    /// Whether to replace the password with IAM auth tokens
    #[serde(default)]
    pub enabled: bool,

    /// AWS region of the RDS instance; falls back to AWS_REGION / AWS_DEFAULT_REGION
    #[serde(default)]
    pub region: String,

    /// Database user; empty means the user from the connection string
    #[serde(default, rename = "dbuser")]
    pub db_user: String,

    /// How often to refresh the token; zero means the default
    #[serde(
        default,
        rename = "tokenrefreshinterval",
        deserialize_with = "deserialize_duration"
    )]
    pub token_refresh_interval: Duration,

    /// Also refresh tokens proactively from a background task
    #[serde(default, rename = "backgroundrefresh")]
    pub background_refresh: bool,
}

impl RdsIamConfig {
    /// Refresh interval with zero mapped to the default
    pub fn refresh_interval(&self) -> Duration {
        if self.token_refresh_interval.is_zero() {
            DEFAULT_TOKEN_REFRESH_INTERVAL
        } else {
            self.token_refresh_interval
        }
    }
}

impl Default for RdsIamConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            region: String::new(),
            db_user: String::new(),
            token_refresh_interval: DEFAULT_TOKEN_REFRESH_INTERVAL,
            background_refresh: false,
        }
    }
}

/// SQL storage settings
#[derive(Clone, Default, Deserialize)]
pub struct SqlConfig {
    /// Connection string; may contain a password, so never logged verbatim
    #[serde(default, rename = "connection")]
    pub connection_string: String,

    #[serde(default)]
    pub rdsiam: RdsIamConfig,
}

impl fmt::Debug for SqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlConfig")
            .field("connection_string", &redact_password(&self.connection_string))
            .field("rdsiam", &self.rdsiam)
            .finish()
    }
}

/// Storage configuration root
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub sql: SqlConfig,
}

impl StorageConfig {
    /// Load configuration with priority: environment > file > defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::load_from(path, None)
    }

    /// Load configuration, reading variables from `env` instead of the process
    /// environment when given
    pub fn load_from(path: Option<&Path>, env: Option<config::Map<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("sql.rdsiam.tokenrefreshinterval", "14m")
            .context("Failed to set configuration defaults")?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("_")
                .try_parsing(true)
                .source(env),
        );

        builder
            .build()
            .context("Failed to load storage configuration")?
            .try_deserialize()
            .context("Failed to parse storage configuration")
    }

    /// Apply command line overrides
    pub fn apply_args(&mut self, args: &CliArgs) {
        if let Some(ref connection) = args.connection {
            self.sql.connection_string = connection.clone();
        }
        if let Some(ref region) = args.region {
            self.sql.rdsiam.region = region.clone();
        }
        if let Some(ref db_user) = args.db_user {
            self.sql.rdsiam.db_user = db_user.clone();
        }
        if let Some(interval) = args.refresh_interval {
            self.sql.rdsiam.token_refresh_interval = interval;
        }
        if args.enable {
            self.sql.rdsiam.enabled = true;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sql.rdsiam.enabled && self.sql.connection_string.is_empty() {
            anyhow::bail!(
                "RDS IAM authentication is enabled but no SQL connection string is configured (set STORAGE_SQL_CONNECTION or --connection)"
            );
        }

        Ok(())
    }
}

/// Expand tilde (~) in file paths to user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Accept `humantime` strings ("14m", "90s") or integer seconds
fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Seconds(u64),
        Text(String),
    }

    match RawDuration::deserialize(deserializer)? {
        RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
        RawDuration::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(Duration::ZERO);
            }
            humantime::parse_duration(text).map_err(serde::de::Error::custom)
        }
    }
}
