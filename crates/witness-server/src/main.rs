//! Witness - blind intake server for encrypted incident reports
//!
//! Usage:
//!   witness serve         - Run the HTTP API
//!   witness recent        - Print the latest stored reports
//!   witness trends        - Print report counts per day
//!   witness check-config  - Show the effective configuration (secrets redacted)

mod api;
mod config;
mod error;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use witness_core::DEFAULT_RECENT_LIMIT;
use witness_notify::Notifier;

use crate::api::AppState;
use crate::config::ServerConfig;

#[derive(Parser)]
#[command(name = "witness")]
#[command(author = "HeyBattle1")]
#[command(version)]
#[command(about = "Blind intake server for client-encrypted incident reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listening port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Store connection string (overrides DATABASE_URL)
        #[arg(long)]
        database_url: Option<String>,
    },

    /// Print the most recent reports as JSON
    Recent {
        /// How many reports to show
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
    },

    /// Print daily report counts as JSON
    Trends,

    /// Load configuration and print it with secrets redacted
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::from_env().context("Invalid configuration")?;

    match cli.command {
        Commands::Serve { port, database_url } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(url) = database_url {
                config.database_url = url;
            }
            serve(config).await?;
        }

        Commands::Recent { limit } => {
            let store = witness_store::open(&config.database_url)
                .await
                .context("Failed to open report store")?;
            let reports = store.list_recent(limit).await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
            store.close().await;
        }

        Commands::Trends => {
            let store = witness_store::open(&config.database_url)
                .await
                .context("Failed to open report store")?;
            let counts = store.daily_counts().await?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
            store.close().await;
        }

        Commands::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        }
    }

    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let cors = config.cors_origin.layer()?;

    let store = witness_store::open(&config.database_url)
        .await
        .with_context(|| format!("Failed to open report store at {}", config.database_url))?;
    let notifier = Notifier::from_config(config.email, config.telegram)
        .context("Failed to set up notifications")?;

    let channels = notifier.channel_names();
    if channels.is_empty() {
        tracing::info!("No notification channels configured");
    } else {
        tracing::info!(?channels, "Notification channels ready");
    }

    let app = api::router(AppState::new(store.clone(), notifier), cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Witness listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("Witness shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
