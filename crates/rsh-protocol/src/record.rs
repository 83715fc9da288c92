//! Handshake and result records
//!
//! # Message Flow
//!
//! 1. Initiator connects and sends one [`HandshakeRecord`] line
//! 2. Responder validates the secret
//! 3. On rejection the responder writes one [`ResultRecord`] line and closes
//! 4. Otherwise the connection becomes a raw byte stream (command output, or
//!    the interactive terminal in both directions)
//!
//! Successful batch output is deliberately NOT wrapped in a `ResultRecord`:
//! the control reply only exists for the handshake phase.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reply error for a handshake line that does not decode
pub const ERR_INVALID_FORMAT: &str = "Invalid command format";

/// Reply error for a missing or wrong secret
pub const ERR_INVALID_KEY: &str = "Invalid API key";

/// Reply error for a handshake that requests neither mode
pub const ERR_EMPTY_REQUEST: &str = "No command specified";

/// The record that opens every session
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeRecord {
    /// Shared secret presented by the initiator
    pub api_key: String,
    /// Command line to run in batch mode
    pub command: String,
    /// Request an interactive terminal instead of a command
    pub terminal: bool,
}

/// What a handshake asks the responder to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedMode<'a> {
    /// Interactive PTY session
    Terminal,
    /// One batch command
    Command(&'a str),
    /// Neither a command nor a terminal was requested
    Nothing,
}

impl HandshakeRecord {
    /// Build a record requesting an interactive terminal
    pub fn terminal(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            command: String::new(),
            terminal: true,
        }
    }

    /// Build a record requesting a single command
    pub fn command(api_key: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            command: command.into(),
            terminal: false,
        }
    }

    /// Resolve the requested mode. `terminal` takes precedence over `command`.
    pub fn mode(&self) -> RequestedMode<'_> {
        if self.terminal {
            RequestedMode::Terminal
        } else if self.command.is_empty() {
            RequestedMode::Nothing
        } else {
            RequestedMode::Command(&self.command)
        }
    }
}

impl fmt::Debug for HandshakeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeRecord")
            .field("api_key", &"<redacted>")
            .field("command", &self.command)
            .field("terminal", &self.terminal)
            .finish()
    }
}

/// Control reply for a rejected handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResultRecord {
    /// Always empty for handshake failures
    pub output: String,
    /// Human readable failure
    pub error: String,
}

impl ResultRecord {
    /// Create a failure reply
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            error: error.into(),
        }
    }

    /// Reply for an undecodable handshake
    pub fn invalid_format() -> Self {
        Self::failure(ERR_INVALID_FORMAT)
    }

    /// Reply for a rejected secret
    pub fn invalid_key() -> Self {
        Self::failure(ERR_INVALID_KEY)
    }

    /// Reply for a handshake with nothing to do
    pub fn empty_request() -> Self {
        Self::failure(ERR_EMPTY_REQUEST)
    }

    /// Interpret a complete reply as a control record.
    ///
    /// Returns `Some` only when the whole reply is exactly one record line
    /// carrying a non-empty error. Anything else is raw session data.
    pub fn from_reply(reply: &[u8]) -> Option<Self> {
        let line = reply.strip_suffix(b"\n").unwrap_or(reply);
        if line.contains(&b'\n') {
            return None;
        }
        serde_json::from_slice::<Self>(line)
            .ok()
            .filter(|record| !record.error.is_empty())
    }
}
