//! Byte pump between a connection and a shell on a PTY
//!
//! Bytes are copied unchanged in chunks of up to [`PUMP_CHUNK_SIZE`].
//! PTY handles are blocking, so the PTY side of each direction runs on a
//! blocking task and talks to its async half over a bounded channel.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{SessionEnd, Teardown};
use crate::pty::PtyProcess;

/// Largest chunk moved in one step, in either direction
pub const PUMP_CHUNK_SIZE: usize = 1024;

const PUMP_CHANNEL_CAPACITY: usize = 32;

/// How long the owner waits for blocking PTY tasks after release
const BLOCKING_JOIN_GRACE: Duration = Duration::from_secs(2);

/// How long output already produced by an exited shell may take to flush
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Bridge `stream` to the shell in `process` until the session ends.
///
/// `pending` holds bytes that arrived behind the handshake line; they reach
/// the shell before anything else read from `stream`. The session also ends
/// when `cancel` is cancelled. Returns the first recorded end reason after
/// the shell has been killed and the connection shut down.
pub async fn run_bridge<S>(
    stream: S,
    pending: Bytes,
    process: PtyProcess,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
) -> SessionEnd
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let PtyProcess {
        master,
        reader,
        writer,
        child,
        killer,
        ..
    } = process;

    let teardown = Arc::new(Teardown::new(cancel, killer));
    let (conn_read, conn_write) = tokio::io::split(stream);

    let (output_tx, output_rx) = mpsc::channel(PUMP_CHANNEL_CAPACITY);
    let (input_tx, input_rx) = mpsc::channel(PUMP_CHANNEL_CAPACITY);

    let pty_reader = spawn_blocking_named(
        "pty reader",
        pty_read_loop(reader, output_tx, Arc::clone(&teardown)),
    );
    let pty_writer = spawn_blocking_named(
        "pty writer",
        pty_write_loop(writer, input_rx, Arc::clone(&teardown)),
    );
    let exit_watcher = spawn_blocking_named("exit watcher", wait_for_exit(child, Arc::clone(&teardown)));

    let conn_writer = tokio::spawn(connection_write_loop(
        conn_write,
        output_rx,
        Arc::clone(&teardown),
    ));
    let conn_reader = tokio::spawn(connection_read_loop(
        conn_read,
        pending,
        input_tx,
        Arc::clone(&teardown),
        idle_timeout,
    ));

    teardown.cancelled().await;
    teardown.trigger(SessionEnd::Shutdown);

    teardown.release();
    drop(master);

    // The writer shuts down the connection's write half on its way out
    let _ = conn_writer.await;
    let _ = conn_reader.await;

    let blocking = async {
        let _ = exit_watcher.await;
        let _ = pty_writer.await;
        let _ = pty_reader.await;
    };
    if tokio::time::timeout(BLOCKING_JOIN_GRACE, blocking).await.is_err() {
        tracing::debug!("PTY tasks still blocked after release; detaching them");
    }

    teardown.reason()
}

fn spawn_blocking_named<F>(name: &'static str, f: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        f();
        tracing::trace!("{} finished", name);
    })
}

/// PTY -> channel. Runs on a blocking thread.
fn pty_read_loop(
    mut reader: Box<dyn Read + Send>,
    tx: mpsc::Sender<Bytes>,
    teardown: Arc<Teardown>,
) -> impl FnOnce() + Send + 'static {
    move || {
        let mut buf = [0u8; PUMP_CHUNK_SIZE];
        // After the shell exits, keep reading until the PTY hangs up so its
        // last output still reaches the connection
        while !teardown.is_cancelled() || teardown.drains_output() {
            match reader.read(&mut buf) {
                Ok(0) => {
                    teardown.trigger(SessionEnd::PtyClosed);
                    break;
                }
                Ok(n) => {
                    if tx.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_pty_hangup(&e) => {
                    teardown.trigger(SessionEnd::PtyClosed);
                    break;
                }
                Err(e) => {
                    teardown.trigger(SessionEnd::from_io("read from pty", &e));
                    break;
                }
            }
        }
    }
}

/// Channel -> PTY. Runs on a blocking thread.
fn pty_write_loop(
    mut writer: Box<dyn Write + Send>,
    mut rx: mpsc::Receiver<Bytes>,
    teardown: Arc<Teardown>,
) -> impl FnOnce() + Send + 'static {
    move || {
        while let Some(chunk) = rx.blocking_recv() {
            if teardown.is_cancelled() {
                break;
            }
            if let Err(e) = writer.write_all(&chunk).and_then(|_| writer.flush()) {
                teardown.trigger(SessionEnd::from_io("write to pty", &e));
                break;
            }
        }
    }
}

fn wait_for_exit(
    mut child: Box<dyn portable_pty::Child + Send + Sync>,
    teardown: Arc<Teardown>,
) -> impl FnOnce() + Send + 'static {
    move || {
        let code = match child.wait() {
            Ok(status) => Some(status.exit_code()),
            Err(e) => {
                tracing::debug!("Waiting for shell failed: {}", e);
                None
            }
        };
        teardown.process_exited(code);
    }
}

/// Channel -> connection
async fn connection_write_loop<W>(mut writer: W, mut rx: mpsc::Receiver<Bytes>, teardown: Arc<Teardown>)
where
    W: AsyncWrite + Unpin,
{
    let cancelled = loop {
        let chunk = tokio::select! {
            biased;
            _ = teardown.cancelled() => break true,
            chunk = rx.recv() => match chunk {
                Some(chunk) => chunk,
                None => break false,
            },
        };

        tokio::select! {
            biased;
            _ = teardown.cancelled() => break true,
            result = writer.write_all(&chunk) => {
                if let Err(e) = result {
                    teardown.trigger(SessionEnd::from_io("write to connection", &e));
                    break false;
                }
            }
        }
    };

    if cancelled && teardown.drains_output() {
        flush_remaining(&mut writer, &mut rx).await;
    }

    let _ = writer.shutdown().await;
}

/// Deliver output the PTY produced before the shell went away, in order
async fn flush_remaining<W>(writer: &mut W, rx: &mut mpsc::Receiver<Bytes>)
where
    W: AsyncWrite + Unpin,
{
    let flush = async {
        while let Some(chunk) = rx.recv().await {
            if writer.write_all(&chunk).await.is_err() {
                break;
            }
        }
    };
    if tokio::time::timeout(OUTPUT_DRAIN_GRACE, flush).await.is_err() {
        tracing::debug!("Dropped trailing output after {:?}", OUTPUT_DRAIN_GRACE);
    }
}

/// Connection -> channel
async fn connection_read_loop<R>(
    mut reader: R,
    pending: Bytes,
    tx: mpsc::Sender<Bytes>,
    teardown: Arc<Teardown>,
    idle_timeout: Option<Duration>,
) where
    R: AsyncRead + Unpin,
{
    if !pending.is_empty() && !forward(&tx, pending, &teardown).await {
        return;
    }

    let mut buf = [0u8; PUMP_CHUNK_SIZE];
    while !teardown.is_cancelled() {
        let read = tokio::select! {
            biased;
            _ = teardown.cancelled() => break,
            read = read_with_idle(&mut reader, &mut buf, idle_timeout) => read,
        };

        match read {
            None => {
                teardown.trigger(SessionEnd::IdleTimeout);
                break;
            }
            Some(Ok(0)) => {
                teardown.trigger(SessionEnd::PeerClosed);
                break;
            }
            Some(Ok(n)) => {
                if !forward(&tx, Bytes::copy_from_slice(&buf[..n]), &teardown).await {
                    break;
                }
            }
            Some(Err(e)) => {
                teardown.trigger(SessionEnd::from_io("read from connection", &e));
                break;
            }
        }
    }
}

/// Hand a chunk to the PTY writer. False once the session is over.
async fn forward(tx: &mpsc::Sender<Bytes>, chunk: Bytes, teardown: &Teardown) -> bool {
    tokio::select! {
        biased;
        _ = teardown.cancelled() => false,
        sent = tx.send(chunk) => sent.is_ok(),
    }
}

/// One read, or `None` when `idle` elapses first
async fn read_with_idle<R>(
    reader: &mut R,
    buf: &mut [u8],
    idle: Option<Duration>,
) -> Option<io::Result<usize>>
where
    R: AsyncRead + Unpin,
{
    match idle {
        Some(limit) => tokio::time::timeout(limit, reader.read(buf)).await.ok(),
        None => Some(reader.read(buf).await),
    }
}

/// Linux reports EIO on the master once every slave handle is closed
fn is_pty_hangup(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EIO)
    }
    #[cfg(not(unix))]
    {
        let _ = err;
        false
    }
}
