//! Shared secret handling
//!
//! The responder and initiator authenticate with one static secret that
//! travels in clear text inside the handshake. It is resolved once at
//! startup from the command line/environment, the config file, or a
//! secret file, and is immutable afterwards.

use std::fmt;
use std::path::Path;

use crate::error::ConfigError;

/// The shared secret presented in every handshake
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(String);

impl SharedSecret {
    /// Wrap a secret value. Empty secrets are rejected.
    pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        Ok(Self(value))
    }

    /// Resolve the secret by precedence: explicit value, inline config
    /// value, then the contents of a secret file.
    pub fn resolve(
        explicit: Option<&str>,
        inline: Option<&str>,
        file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = explicit.or(inline).filter(|v| !v.is_empty()) {
            return Self::new(value);
        }

        if let Some(path) = file {
            tracing::debug!("Reading shared secret from {:?}", path);
            let content = std::fs::read_to_string(path).map_err(|e| {
                ConfigError::Invalid(format!("Failed to read secret file {:?}: {}", path, e))
            })?;
            return Self::new(content.trim_end_matches(&['\r', '\n'][..]));
        }

        Err(ConfigError::MissingSecret)
    }

    /// The raw secret, for building handshake records
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check a presented secret.
    ///
    /// Exact byte equality, compared in constant time over the presented
    /// length so a mismatch position is not observable.
    pub fn verify(&self, presented: &str) -> bool {
        let expected = self.0.as_bytes();
        let presented = presented.as_bytes();

        let mut diff = (expected.len() != presented.len()) as u8;
        for (i, b) in presented.iter().enumerate() {
            let a = expected.get(i).copied().unwrap_or(0);
            diff |= a ^ b;
        }
        diff == 0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}
