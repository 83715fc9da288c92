//! Initiator configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;
use crate::secret::SharedSecret;

/// Configuration for the initiator CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InitiatorConfig {
    /// Shared secret (prefer `secret_file` or `RSH_SECRET`)
    pub secret: Option<String>,

    /// File holding the shared secret
    pub secret_file: Option<PathBuf>,

    /// Timeout for one TCP connect attempt
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Connection retry policy
    #[serde(flatten)]
    pub retry: RetryConfig,
}

impl Default for InitiatorConfig {
    fn default() -> Self {
        Self {
            secret: None,
            secret_file: None,
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }
}

impl InitiatorConfig {
    /// Resolve the shared secret, letting `explicit` (CLI/env) win
    pub fn shared_secret(&self, explicit: Option<&str>) -> Result<SharedSecret, ConfigError> {
        SharedSecret::resolve(
            explicit,
            self.secret.as_deref(),
            self.secret_file.as_deref(),
        )
    }
}

/// Retry configuration for connection establishment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total connect attempts (at least one is always made)
    #[serde(rename = "retry_attempts")]
    pub attempts: u32,

    /// Delay before the first retry
    #[serde(rename = "retry_delay", with = "duration_secs")]
    pub delay: Duration,

    /// Upper bound on the delay between retries
    #[serde(rename = "retry_max_delay", with = "duration_secs")]
    pub max_delay: Duration,

    /// Multiplier for each retry
    #[serde(rename = "retry_multiplier")]
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    #[serde(rename = "retry_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}
