//! Termination signals for the initiator

/// Resolve when the process is asked to stop, with the signal's name.
///
/// In raw mode Ctrl+C reaches the remote shell as a byte, so these only
/// arrive from outside (kill, a closing terminal emulator, and so on).
#[cfg(unix)]
pub async fn termination_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    async fn wait_for(kind: SignalKind, name: &'static str) -> &'static str {
        match signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
                name
            }
            Err(e) => {
                tracing::warn!("Failed to install {} handler: {}", name, e);
                std::future::pending().await
            }
        }
    }

    tokio::select! {
        name = wait_for(SignalKind::interrupt(), "SIGINT") => name,
        name = wait_for(SignalKind::terminate(), "SIGTERM") => name,
        name = wait_for(SignalKind::hangup(), "SIGHUP") => name,
    }
}

#[cfg(not(unix))]
pub async fn termination_signal() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    "Ctrl+C"
}
