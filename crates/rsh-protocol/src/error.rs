//! Protocol error types

use thiserror::Error;

/// Errors that can occur while reading or writing protocol records
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Handshake line is not a valid record
    #[error("Malformed handshake: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Handshake line exceeds the maximum length
    #[error("Handshake too long: more than {max} bytes without a newline")]
    TooLong { max: usize },

    /// Peer closed the connection before a full record arrived
    #[error("Connection closed before handshake completed")]
    ConnectionClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
