//! Interactive session lifecycle
//!
//! A session ends for exactly one recorded reason. Whatever notices the
//! end first (either pump direction, the exit watcher, an idle timer, or
//! server shutdown) triggers the shared [`Teardown`]; the session owner
//! then releases the shell, the PTY and the connection once.

mod bridge;
mod teardown;

pub use bridge::{run_bridge, PUMP_CHUNK_SIZE};
pub use teardown::Teardown;

use std::fmt;
use std::io;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The initiator closed its side of the connection
    PeerClosed,
    /// The PTY reported end of stream
    PtyClosed,
    /// The shell exited
    ProcessExited(Option<u32>),
    /// No input from the initiator within the idle timeout
    IdleTimeout,
    /// The responder is shutting down
    Shutdown,
    /// An I/O error other than a plain disconnect
    Io {
        context: &'static str,
        message: String,
    },
}

impl SessionEnd {
    /// Classify an I/O error seen while pumping bytes.
    ///
    /// Resets and broken pipes are how peers usually leave, so they count
    /// as an ordinary close rather than an error.
    pub fn from_io(context: &'static str, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof => SessionEnd::PeerClosed,
            _ => SessionEnd::Io {
                context,
                message: err.to_string(),
            },
        }
    }

    /// Whether this end deserves a warning in the logs
    pub fn is_error(&self) -> bool {
        matches!(self, SessionEnd::Io { .. })
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::PeerClosed => write!(f, "peer closed the connection"),
            SessionEnd::PtyClosed => write!(f, "terminal closed"),
            SessionEnd::ProcessExited(Some(code)) => write!(f, "shell exited with status {}", code),
            SessionEnd::ProcessExited(None) => write!(f, "shell exited"),
            SessionEnd::IdleTimeout => write!(f, "idle timeout"),
            SessionEnd::Shutdown => write!(f, "responder shutting down"),
            SessionEnd::Io { context, message } => write!(f, "{}: {}", context, message),
        }
    }
}
