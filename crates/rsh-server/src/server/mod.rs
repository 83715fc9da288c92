//! Accept loop and per-connection handling

mod handler;
mod listener;
mod registry;

pub use handler::handle_connection;
pub use listener::Responder;
pub use registry::{SessionGuard, SessionInfo, SessionKind, SessionRegistry};
