//! Core error types for rsh

use rsh_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the rsh ecosystem
#[derive(Error, Debug)]
pub enum RshError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connection-related errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Could not reach the responder
    #[error("error connecting to {address}: {source}")]
    Unreachable {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Connect attempt did not complete in time
    #[error("connection to {0} timed out")]
    Timeout(String),

    /// The responder rejected the handshake
    #[error("server rejected the session: {0}")]
    Rejected(String),
}

/// Session-related errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// PTY allocation failed
    #[error("PTY allocation failed: {0}")]
    PtyAllocation(String),

    /// Shell is not allowed or does not exist
    #[error("Invalid shell: {0}")]
    InvalidShell(String),

    /// Process could not be spawned
    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    /// Initiator's stdin is not a terminal
    #[error("not running in a terminal")]
    NotATerminal,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// No shared secret was configured
    #[error("No shared secret configured (use --secret, RSH_SECRET, secret or secret_file)")]
    MissingSecret,
}
