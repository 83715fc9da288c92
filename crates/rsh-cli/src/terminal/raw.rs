//! Raw mode for the controlling terminal

use std::io;

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::tty::IsTty;

use rsh_core::error::SessionError;

/// Fail unless stdin is a terminal
pub fn ensure_terminal() -> Result<(), SessionError> {
    if io::stdin().is_tty() {
        Ok(())
    } else {
        Err(SessionError::NotATerminal)
    }
}

/// Keeps the terminal in raw mode while alive.
///
/// Dropping the guard restores the previous mode, so every way out of an
/// interactive session leaves the terminal usable.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        tracing::debug!("Terminal switched to raw mode");
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            tracing::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}
