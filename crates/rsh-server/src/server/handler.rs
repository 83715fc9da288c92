//! Per-connection handling: handshake, authentication, dispatch

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use rsh_protocol::{
    write_record, HandshakeCodec, HandshakeRecord, ProtocolError, RequestedMode, ResultRecord,
    SessionId,
};

use super::registry::{SessionGuard, SessionKind};
use crate::exec::ExecOutcome;
use crate::pty::PtyProcess;
use crate::session::run_bridge;
use crate::state::ServerState;

/// A successfully decoded handshake and what is left of the connection
struct Handshake {
    record: HandshakeRecord,
    stream: TcpStream,
    /// Bytes received after the handshake line
    pending: Bytes,
}

/// Serve one accepted connection from handshake to close
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
    cancel: CancellationToken,
) {
    let id = SessionId::next();
    let span = tracing::info_span!("session", session = %id, %peer);

    async move {
        let guard = state.sessions.register(id, peer);
        tracing::debug!("Connection accepted");

        if let Err(e) = serve(stream, &state, &guard, cancel).await {
            tracing::warn!("Connection ended with error: {:#}", e);
        }
        if let Some(info) = state.sessions.get(id) {
            tracing::debug!("Connection closed after {:?}", info.age());
        }
    }
    .instrument(span)
    .await
}

async fn serve(
    stream: TcpStream,
    state: &ServerState,
    guard: &SessionGuard<'_>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let handshake = tokio::select! {
        _ = cancel.cancelled() => {
            tracing::debug!("Shutdown before handshake completed");
            return Ok(());
        }
        handshake = read_handshake(stream, state) => handshake?,
    };
    let Some(Handshake {
        record,
        mut stream,
        pending,
    }) = handshake
    else {
        return Ok(());
    };

    if !state.secret.verify(&record.api_key) {
        tracing::warn!("Rejected handshake: invalid API key");
        return reject(&mut stream, ResultRecord::invalid_key()).await;
    }

    match record.mode() {
        RequestedMode::Terminal => {
            guard.set_kind(SessionKind::Interactive);
            run_interactive(stream, pending, state, cancel).await
        }
        RequestedMode::Command(command) => {
            guard.set_kind(SessionKind::Batch);
            run_batch(stream, command, state, cancel).await
        }
        RequestedMode::Nothing => {
            tracing::warn!("Rejected handshake: neither command nor terminal requested");
            reject(&mut stream, ResultRecord::empty_request()).await
        }
    }
}

/// Read the handshake line. `Ok(None)` means the connection was already
/// dealt with (rejected, timed out, or closed by the peer).
async fn read_handshake(stream: TcpStream, state: &ServerState) -> anyhow::Result<Option<Handshake>> {
    let limit = state.config.handshake_timeout;
    let mut framed = FramedRead::new(stream, HandshakeCodec::new());

    let frame = match tokio::time::timeout(limit, framed.next()).await {
        Ok(frame) => frame,
        Err(_) => {
            tracing::warn!("No handshake within {:?}; closing", limit);
            return Ok(None);
        }
    };

    match frame {
        Some(Ok(record)) => {
            let pending = framed.read_buffer().clone().freeze();
            if !pending.is_empty() {
                tracing::trace!("{} bytes arrived behind the handshake", pending.len());
            }
            Ok(Some(Handshake {
                record,
                stream: framed.into_inner(),
                pending,
            }))
        }
        Some(Err(e @ (ProtocolError::Malformed(_) | ProtocolError::TooLong { .. }))) => {
            tracing::warn!("Rejected handshake: {}", e);
            let mut stream = framed.into_inner();
            reject(&mut stream, ResultRecord::invalid_format()).await?;
            Ok(None)
        }
        Some(Err(e)) => {
            tracing::debug!("Connection lost during handshake: {}", e);
            Ok(None)
        }
        None => {
            tracing::debug!("Peer closed before sending a handshake");
            Ok(None)
        }
    }
}

/// Answer a handshake with a failure record and close
async fn reject(stream: &mut TcpStream, reply: ResultRecord) -> anyhow::Result<()> {
    write_record(stream, &reply).await?;
    let _ = stream.shutdown().await;
    Ok(())
}

async fn run_batch(
    stream: TcpStream,
    command: &str,
    state: &ServerState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    tracing::info!("Running command: {}", command);

    let outcome = state.executor.run(command, &cancel).await;
    if let ExecOutcome::Failed { reason, .. } = &outcome {
        tracing::warn!("Command failed: {}", reason);
    }

    let reply = outcome.into_reply();
    let mut writer = BufWriter::new(stream);
    writer.write_all(&reply).await?;
    writer.flush().await?;
    let _ = writer.shutdown().await;

    tracing::debug!("Wrote {} bytes of command output", reply.len());
    Ok(())
}

async fn run_interactive(
    stream: TcpStream,
    pending: Bytes,
    state: &ServerState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let config = state.config.terminal.clone();
    let process = match tokio::task::spawn_blocking(move || PtyProcess::spawn(&config)).await? {
        Ok(process) => process,
        Err(e) => {
            // Nothing has been written yet; closing tells the initiator
            tracing::error!("Could not start interactive shell: {}", e);
            return Ok(());
        }
    };

    tracing::info!("Interactive session started: {} (pid {:?})", process.shell, process.pid);

    let end = run_bridge(
        stream,
        pending,
        process,
        cancel.child_token(),
        state.config.terminal.idle_timeout,
    )
    .await;

    if end.is_error() {
        tracing::warn!("Interactive session ended: {}", end);
    } else {
        tracing::info!("Interactive session ended: {}", end);
    }
    Ok(())
}
