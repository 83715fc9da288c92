//! rsh CLI
//!
//! Runs one command on a responder, or opens an interactive shell on it.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rsh::commands;
use rsh::connect::Connector;
use rsh::output::print_error;
use rsh_core::config;

#[derive(Parser)]
#[command(name = "rsh")]
#[command(author, version)]
#[command(about = "Remote command and shell relay")]
#[command(long_about = "Remote command and shell relay.\n\n\
--terminal/-t and --command/-c stand in for the single-dash -terminal and \
-command flags of earlier rsh clients.")]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["terminal", "command"])
))]
struct Cli {
    /// Open an interactive terminal session
    #[arg(short, long)]
    terminal: bool,

    /// Run a single command and print its output
    #[arg(short, long, value_name = "COMMAND")]
    command: Option<String>,

    /// Responder address: host or host:port (default port 7107)
    target: String,

    /// Shared secret (overrides config)
    #[arg(long, env = "RSH_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Path to configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::load_config_file(cli.config.as_deref())
        .context("Failed to load configuration")?
        .initiator;

    let secret = config.shared_secret(cli.secret.as_deref())?;
    let connector = Connector::new(&cli.target, &config);

    match cli.command {
        Some(command) => commands::run::run(&connector, &secret, &command, cli.quiet).await,
        None => commands::shell::run(&connector, &secret, cli.quiet).await,
    }
}
