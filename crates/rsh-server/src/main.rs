//! rsh Responder Daemon
//!
//! Listens for rsh initiators, runs their commands and serves their
//! interactive shells.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rsh_core::config;
use rsh_server::{Responder, ServerState};

#[derive(Parser)]
#[command(name = "rsh-server")]
#[command(about = "rsh responder daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Shared secret initiators must present (overrides config)
    #[arg(long, env = "RSH_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("rsh responder starting...");

    // Load configuration
    let mut config = config::load_config_file(args.config.as_deref())
        .context("Failed to load configuration")?
        .responder;

    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    let secret = config
        .shared_secret(args.secret.as_deref())
        .context("Refusing to start without a shared secret")?;

    tracing::info!(
        "Batch policy {:?}, command timeout {:?}",
        config.exec.policy,
        config.exec.timeout
    );

    let state = Arc::new(ServerState::new(config, secret));

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    let responder = Responder::bind(state, cancel).await?;
    responder.run().await?;

    tracing::info!("Responder shutdown complete");
    Ok(())
}
