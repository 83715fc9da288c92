//! Live session registry

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use rsh_protocol::SessionId;

/// What a connection is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Still reading the handshake
    Handshake,
    /// Running one command
    Batch,
    /// Bridging an interactive shell
    Interactive,
}

/// Registry entry for one connection
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub kind: SessionKind,
    pub peer: SocketAddr,
    pub started: Instant,
}

impl SessionInfo {
    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Concurrent map of the sessions currently being served
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionInfo>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh connection. The entry is removed when the guard drops.
    pub fn register(&self, id: SessionId, peer: SocketAddr) -> SessionGuard<'_> {
        self.sessions.insert(
            id,
            SessionInfo {
                kind: SessionKind::Handshake,
                peer,
                started: Instant::now(),
            },
        );
        SessionGuard { registry: self, id }
    }

    pub fn get(&self, id: SessionId) -> Option<SessionInfo> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of sessions of `kind`
    #[cfg(test)]
    fn count(&self, kind: SessionKind) -> usize {
        self.sessions.iter().filter(|entry| entry.kind == kind).count()
    }

    fn set_kind(&self, id: SessionId, kind: SessionKind) {
        if let Some(mut entry) = self.sessions.get_mut(&id) {
            entry.kind = kind;
        }
    }

    fn remove(&self, id: SessionId) {
        self.sessions.remove(&id);
    }
}

/// Keeps a session registered for as long as it lives
pub struct SessionGuard<'a> {
    registry: &'a SessionRegistry,
    id: SessionId,
}

impl SessionGuard<'_> {
    /// Record that the handshake chose `kind`
    pub fn set_kind(&self, kind: SessionKind) {
        self.registry.set_kind(self.id, kind);
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
