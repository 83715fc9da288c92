//! Responder listener
//!
//! Accepts incoming connections and spawns a handler for each one. On
//! shutdown it stops accepting and gives live sessions a grace period to
//! release their shells.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::handler::handle_connection;
use crate::state::ServerState;

/// Pause after a failed accept so a persistent error (e.g. fd exhaustion)
/// does not spin the loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// TCP responder serving rsh sessions
pub struct Responder {
    listener: TcpListener,
    /// Shared responder state
    state: Arc<ServerState>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
    /// Tracks session tasks for the shutdown drain
    tracker: TaskTracker,
}

impl Responder {
    /// Bind the listener on the configured address
    pub async fn bind(state: Arc<ServerState>, cancel: CancellationToken) -> Result<Self> {
        let bind_addr = state.config.bind_address.clone();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;

        Ok(Self {
            listener,
            state,
            cancel,
            tracker: TaskTracker::new(),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    /// Serve connections until the cancellation token fires, then drain
    pub async fn run(self) -> Result<()> {
        tracing::info!("Responder listening on {}", self.local_addr()?);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Responder shutting down");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => self.spawn_session(socket, peer_addr),
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }

        let Self {
            listener,
            state,
            tracker,
            ..
        } = self;
        drop(listener);

        drain(&tracker, &state).await;
        Ok(())
    }

    fn spawn_session(&self, socket: tokio::net::TcpStream, peer_addr: SocketAddr) {
        if let Err(e) = socket.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY for {}: {}", peer_addr, e);
        }

        let state = Arc::clone(&self.state);
        let cancel = self.cancel.child_token();
        self.tracker
            .spawn(handle_connection(socket, peer_addr, state, cancel));
    }
}

/// Wait for live sessions to release, up to the configured grace period
async fn drain(tracker: &TaskTracker, state: &ServerState) {
    tracker.close();

    let live = state.sessions.len();
    if live == 0 {
        return;
    }

    let grace = state.config.shutdown_grace;
    tracing::info!("Waiting up to {:?} for {} session(s) to end", grace, live);

    if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
        tracing::warn!(
            "{} session(s) still open after {:?}; exiting anyway",
            state.sessions.len(),
            grace
        );
    } else {
        tracing::info!("All sessions ended");
    }
}
