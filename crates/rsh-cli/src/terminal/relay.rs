//! Bidirectional relay between the local terminal and a session
//!
//! Input chunks go to the connection, connection bytes go to the output,
//! unchanged. The relay ends when the remote side closes, either side
//! fails, or the interrupt future resolves.

use std::future::Future;
use std::io;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use rsh_protocol::ResultRecord;

/// Largest chunk moved in one step
pub const RELAY_CHUNK_SIZE: usize = 1024;

/// Leading output kept for recognising a handshake rejection
const REPLY_PROBE_LEN: usize = 1024;

/// How a relay ended
#[derive(Debug)]
pub enum RelayEnd {
    /// The responder closed the connection
    RemoteClosed,
    /// A termination signal arrived
    Interrupted(&'static str),
    /// Reading or writing failed
    Failed(io::Error),
}

/// Outcome of a relay
#[derive(Debug)]
pub struct RelaySummary {
    pub end: RelayEnd,
    /// Bytes received from the responder
    pub received: u64,
    head: Vec<u8>,
}

impl RelaySummary {
    fn new() -> Self {
        Self {
            end: RelayEnd::RemoteClosed,
            received: 0,
            head: Vec::new(),
        }
    }

    fn record(&mut self, chunk: &[u8]) {
        self.received += chunk.len() as u64;
        let room = REPLY_PROBE_LEN.saturating_sub(self.head.len());
        self.head.extend_from_slice(&chunk[..room.min(chunk.len())]);
    }

    /// The failure record, if all the responder ever sent was a rejection
    pub fn rejection(&self) -> Option<ResultRecord> {
        if self.received as usize != self.head.len() {
            return None;
        }
        ResultRecord::from_reply(&self.head)
    }
}

/// Relay between `stream` and the local terminal until the session ends
pub async fn relay<S, W, F>(
    stream: S,
    mut input: mpsc::Receiver<Bytes>,
    mut output: W,
    interrupt: F,
) -> RelaySummary
where
    S: AsyncRead + AsyncWrite,
    W: AsyncWrite + Unpin,
    F: Future<Output = &'static str>,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    tokio::pin!(interrupt);

    let mut summary = RelaySummary::new();
    let mut buf = [0u8; RELAY_CHUNK_SIZE];
    let mut input_open = true;

    summary.end = loop {
        tokio::select! {
            signal = &mut interrupt => break RelayEnd::Interrupted(signal),

            read = reader.read(&mut buf) => match read {
                Ok(0) => break RelayEnd::RemoteClosed,
                Ok(n) => {
                    summary.record(&buf[..n]);
                    let written = async {
                        output.write_all(&buf[..n]).await?;
                        output.flush().await
                    };
                    if let Err(e) = written.await {
                        break RelayEnd::Failed(e);
                    }
                }
                Err(e) => break RelayEnd::Failed(e),
            },

            chunk = input.recv(), if input_open => match chunk {
                Some(chunk) => {
                    if let Err(e) = writer.write_all(&chunk).await {
                        break RelayEnd::Failed(e);
                    }
                }
                None => {
                    tracing::debug!("Local input closed");
                    input_open = false;
                }
            },
        }
    };

    let _ = writer.shutdown().await;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn never() -> impl Future<Output = &'static str> {
        std::future::pending()
    }

    #[tokio::test]
    async fn test_relays_both_directions() {
        let (local, mut remote) = tokio::io::duplex(1024);
        let (tx, rx) = mpsc::channel(4);
        let mut output = Vec::new();

        let remote_side = tokio::spawn(async move {
            let mut typed = [0u8; 3];
            remote.read_exact(&mut typed).await.unwrap();
            assert_eq!(&typed, b"ls\r");
            remote.write_all(b"file.txt\r\n").await.unwrap();
        });

        tx.send(Bytes::from_static(b"ls\r")).await.unwrap();
        let summary = relay(local, rx, &mut output, never()).await;
        remote_side.await.unwrap();

        assert!(matches!(summary.end, RelayEnd::RemoteClosed));
        assert_eq!(output, b"file.txt\r\n");
        assert_eq!(summary.received, 10);
        assert!(summary.rejection().is_none());
    }

    #[tokio::test]
    async fn test_interrupt_ends_relay() {
        let (local, _remote) = tokio::io::duplex(1024);
        let (_tx, rx) = mpsc::channel(4);
        let mut output = Vec::new();

        let interrupt = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            "SIGTERM"
        };
        let summary = relay(local, rx, &mut output, interrupt).await;
        assert!(matches!(summary.end, RelayEnd::Interrupted("SIGTERM")));
    }

    #[tokio::test]
    async fn test_input_close_keeps_output_flowing() {
        let (local, mut remote) = tokio::io::duplex(1024);
        let (tx, rx) = mpsc::channel(4);
        drop(tx);

        let remote_side = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            remote.write_all(b"late output").await.unwrap();
        });

        let mut output = Vec::new();
        let summary = relay(local, rx, &mut output, never()).await;
        remote_side.await.unwrap();

        assert!(matches!(summary.end, RelayEnd::RemoteClosed));
        assert_eq!(output, b"late output");
    }

    #[tokio::test]
    async fn test_rejection_recognised() {
        let (local, mut remote) = tokio::io::duplex(1024);
        let (_tx, rx) = mpsc::channel(4);

        tokio::spawn(async move {
            remote
                .write_all(b"{\"output\":\"\",\"error\":\"Invalid API key\"}\n")
                .await
                .unwrap();
        });

        let mut output = Vec::new();
        let summary = relay(local, rx, &mut output, never()).await;
        let record = summary.rejection().unwrap();
        assert_eq!(record.error, "Invalid API key");
    }
}
