//! Blocking stdin reader

use std::io::{self, Read};

use bytes::Bytes;
use tokio::sync::mpsc;

use super::RELAY_CHUNK_SIZE;

const STDIN_CHANNEL_CAPACITY: usize = 32;

/// Read stdin on a dedicated thread and hand chunks to the returned channel.
///
/// A plain thread rather than a blocking task: a read parked on a quiet
/// terminal must not hold up runtime shutdown. The channel closes on EOF.
pub fn spawn_stdin_reader() -> io::Result<mpsc::Receiver<Bytes>> {
    let (tx, rx) = mpsc::channel(STDIN_CHANNEL_CAPACITY);

    std::thread::Builder::new()
        .name("rsh-stdin".to_string())
        .spawn(move || {
            let mut stdin = io::stdin().lock();
            let mut buf = [0u8; RELAY_CHUNK_SIZE];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        tracing::debug!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
        })?;

    Ok(rx)
}
