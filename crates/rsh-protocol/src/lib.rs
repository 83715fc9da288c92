//! rsh-protocol: Wire protocol for rsh sessions
//!
//! A session opens with exactly one newline-terminated JSON handshake
//! record sent by the initiator. After that the connection carries either
//! a single control reply (a [`ResultRecord`] line, only when the handshake
//! is rejected) or an unframed raw byte stream for the rest of its life.

pub mod codec;
pub mod error;
pub mod record;
pub mod session;

pub use codec::{write_record, HandshakeCodec, MAX_HANDSHAKE_LEN};
pub use error::ProtocolError;
pub use record::{HandshakeRecord, RequestedMode, ResultRecord};
pub use session::SessionId;

/// Default TCP port of the responder
pub const DEFAULT_PORT: u16 = 7107;
