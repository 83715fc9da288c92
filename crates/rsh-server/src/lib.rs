//! rsh-server: Responder daemon for rsh
//!
//! Accepts TCP connections, reads one handshake per connection, checks the
//! shared secret, then either runs a single command and writes back its
//! output, or bridges an interactive shell on a pseudo-terminal to the
//! connection until one side goes away.

pub mod exec;
pub mod pty;
pub mod server;
pub mod session;
pub mod state;

pub use server::Responder;
pub use state::ServerState;
