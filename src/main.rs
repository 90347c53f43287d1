use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hn_mail_gateway::api::HnSearchClient;
use hn_mail_gateway::config::Config;
use hn_mail_gateway::constants::APP_ID;
use hn_mail_gateway::db::{Database, SqliteCursorStore};
use hn_mail_gateway::mda::CommandMda;
use hn_mail_gateway::sync;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(api_url = %config.api_url, mda = %config.mda_command, "Starting hn-mail-gateway");

    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize cursor database")?;
    let store = SqliteCursorStore::new(db, APP_ID);
    let api = HnSearchClient::new(&config)?;
    let mda = CommandMda::new(config.mda_command.clone(), config.mda_timeout);

    match config.poll_interval {
        Some(interval) => {
            info!(interval_secs = interval.as_secs(), "Polling continuously");
            tokio::select! {
                () = sync::poll_loop(&api, &mda, &store, &config, interval) => {},
                () = shutdown_signal() => info!("Shutting down"),
            }
        }
        None => {
            sync::sync_once(&api, &mda, &store, &config)
                .await
                .context("Sync cycle failed")?;
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hn_mail_gateway=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
