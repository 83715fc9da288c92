//! rsh-core: Shared configuration and types for rsh
//!
//! This crate provides the configuration structures, the shared secret,
//! address helpers and error types used by both the responder daemon and
//! the initiator CLI.

pub mod addr;
pub mod config;
pub mod error;
pub mod secret;

pub use addr::with_default_port;
pub use error::RshError;
pub use secret::SharedSecret;
