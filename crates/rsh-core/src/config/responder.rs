//! Responder configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::{duration_secs, option_duration_secs};
use crate::error::ConfigError;
use crate::secret::SharedSecret;

/// Configuration for the responder daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Address to bind the listener to
    pub bind_address: String,

    /// Shared secret (prefer `secret_file` or `RSH_SECRET`)
    pub secret: Option<String>,

    /// File holding the shared secret
    pub secret_file: Option<PathBuf>,

    /// How long a fresh connection may take to send its handshake
    #[serde(with = "duration_secs")]
    pub handshake_timeout: Duration,

    /// How long shutdown waits for live sessions to release
    #[serde(with = "duration_secs")]
    pub shutdown_grace: Duration,

    /// Batch command execution
    pub exec: ExecConfig,

    /// Interactive terminal sessions
    pub terminal: TerminalConfig,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", rsh_protocol::DEFAULT_PORT),
            secret: None,
            secret_file: None,
            handshake_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
            exec: ExecConfig::default(),
            terminal: TerminalConfig::default(),
        }
    }
}

impl ResponderConfig {
    /// Resolve the shared secret, letting `explicit` (CLI/env) win
    pub fn shared_secret(&self, explicit: Option<&str>) -> Result<SharedSecret, ConfigError> {
        SharedSecret::resolve(
            explicit,
            self.secret.as_deref(),
            self.secret_file.as_deref(),
        )
    }
}

/// How a batch command line is turned into a process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecPolicy {
    /// `sh -c <line>`: pipes, redirection and globbing work
    #[default]
    Shell,
    /// Whitespace-split argument vector, no shell, empty environment
    Direct,
}

/// Batch executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Execution policy
    pub policy: ExecPolicy,

    /// Hard deadline for one command
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            policy: ExecPolicy::Shell,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Interactive session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Shell to spawn; falls back to `$SHELL`, then `/bin/sh`
    pub shell: Option<String>,

    /// Extra environment variables for the shell
    pub env: Vec<(String, String)>,

    /// End a session after this long without input from the initiator.
    /// Unset means sessions are unbounded.
    #[serde(with = "option_duration_secs")]
    pub idle_timeout: Option<Duration>,

    /// PTY rows (the PTY is never resized)
    pub rows: u16,

    /// PTY columns
    pub cols: u16,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            shell: None,
            env: vec![],
            idle_timeout: None,
            rows: 24,
            cols: 80,
        }
    }
}

impl TerminalConfig {
    /// The shell this config asks for, before validation
    pub fn requested_shell(&self) -> String {
        self.shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| "/bin/sh".to_string())
    }
}
