use anyhow::{Context, Result};
use clap::Parser;

use rds_iam_auth::auth::{build, BackgroundRefresher};
use rds_iam_auth::config::{expand_tilde, CliArgs, StorageConfig};
use rds_iam_auth::conn_string::redact_password;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Initialize logging with the configured level
    let log_level = args.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let config_path = args.config.as_deref().map(expand_tilde);
    let mut config = StorageConfig::load(config_path.as_deref())?;
    config.apply_args(&args);
    config.validate()?;

    tracing::debug!(config = ?config.sql, "Configuration loaded");

    let rdsiam = config.sql.rdsiam.clone();
    let background_refresh = rdsiam.background_refresh;

    if !rdsiam.enabled {
        tracing::info!("RDS IAM authentication disabled, using connection string as configured");
    }

    let (connection_string, authenticator) = build(&config.sql.connection_string, rdsiam)
        .await
        .context("Failed to set up RDS IAM authentication")?;

    if args.show_secret {
        println!("{}", connection_string);
    } else {
        println!("{}", redact_password(&connection_string));
    }

    let Some(authenticator) = authenticator else {
        return Ok(());
    };

    if !background_refresh {
        return Ok(());
    }

    // Keep the token warm until interrupted
    let refresher = BackgroundRefresher::start_default(authenticator.clone());
    tracing::info!(
        endpoint = %authenticator.endpoint(),
        period_secs = authenticator.refresh_interval().as_secs(),
        "Background token refresh running, press Ctrl+C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down...");
    refresher.stop().await;

    Ok(())
}
