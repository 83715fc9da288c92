//! Responder state shared by every connection

use rsh_core::config::ResponderConfig;
use rsh_core::SharedSecret;

use crate::exec::BatchExecutor;
use crate::server::SessionRegistry;

/// Immutable configuration plus the live session registry
pub struct ServerState {
    /// Configuration, fixed at startup
    pub config: ResponderConfig,
    /// Secret every handshake must present
    pub secret: SharedSecret,
    /// Executor for batch commands
    pub executor: BatchExecutor,
    /// Sessions currently being served
    pub sessions: SessionRegistry,
}

impl ServerState {
    /// Create state from a resolved configuration
    pub fn new(config: ResponderConfig, secret: SharedSecret) -> Self {
        let executor = BatchExecutor::from_config(&config.exec);
        Self {
            config,
            secret,
            executor,
            sessions: SessionRegistry::new(),
        }
    }
}
