//! Configuration management for rsh

mod initiator;
mod responder;
pub mod serde_utils;

pub use initiator::{InitiatorConfig, RetryConfig};
pub use responder::{ExecConfig, ExecPolicy, ResponderConfig, TerminalConfig};

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level config file with one section per role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// `[responder]` section
    pub responder: ResponderConfig,
    /// `[initiator]` section
    pub initiator: InitiatorConfig,
}

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rsh")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load the config file from an explicit path, or from the default path
/// when it exists, falling back to defaults otherwise.
///
/// An explicit path that cannot be loaded is an error; a broken default
/// file is logged and ignored.
pub fn load_config_file(path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(path) = path {
        return load_config(path);
    }

    let default_path = default_config_path();
    if !default_path.exists() {
        tracing::debug!("No config file at {:?}, using defaults", default_path);
        return Ok(ConfigFile::default());
    }

    Ok(load_config(&default_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
        ConfigFile::default()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_sections() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[responder]
bind_address = "127.0.0.1:9000"
secret = "K"
handshake_timeout = 5

[responder.exec]
policy = "direct"
timeout = 2

[responder.terminal]
shell = "/bin/sh"
env = [["LANG", "C.UTF-8"]]
idle_timeout = 60

[initiator]
connect_timeout = 1
retry_attempts = 5
"#
        )
        .unwrap();

        let config: ConfigFile = load_config(file.path()).unwrap();
        assert_eq!(config.responder.bind_address, "127.0.0.1:9000");
        assert_eq!(config.responder.secret.as_deref(), Some("K"));
        assert_eq!(config.responder.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.responder.exec.policy, ExecPolicy::Direct);
        assert_eq!(config.responder.exec.timeout, Duration::from_secs(2));
        assert_eq!(config.responder.terminal.shell.as_deref(), Some("/bin/sh"));
        assert_eq!(
            config.responder.terminal.idle_timeout,
            Some(Duration::from_secs(60))
        );
        assert_eq!(config.responder.terminal.rows, 24);
        assert_eq!(config.initiator.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.initiator.retry.attempts, 5);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = load_config::<ConfigFile>(Path::new("/nonexistent/rsh.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let file = NamedTempFile::new().unwrap();
        let config: ConfigFile = load_config(file.path()).unwrap();
        assert_eq!(config.responder.bind_address, "0.0.0.0:7107");
        assert_eq!(config.responder.exec.policy, ExecPolicy::Shell);
        assert!(config.responder.terminal.idle_timeout.is_none());
    }
}
