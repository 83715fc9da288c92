//! rsh: Initiator side of rsh
//!
//! Connects to a responder, sends the handshake, and then either prints the
//! output of a single command or relays the local terminal to a remote
//! shell.

pub mod commands;
pub mod connect;
pub mod output;
pub mod terminal;
