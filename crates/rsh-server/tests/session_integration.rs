//! Session integration tests
//!
//! Runs a responder on an ephemeral port and drives it over real TCP
//! connections.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use rsh_core::config::{ExecPolicy, ResponderConfig};
use rsh_protocol::{HandshakeRecord, ResultRecord};
use rsh_server::{Responder, ServerState};
use tempfile::NamedTempFile;

const SECRET: &str = "integration-secret";

/// A responder running in the background
struct TestResponder {
    addr: SocketAddr,
    state: Arc<ServerState>,
    cancel: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestResponder {
    async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    async fn start_with(configure: impl FnOnce(&mut ResponderConfig)) -> Self {
        let mut config = ResponderConfig {
            bind_address: "127.0.0.1:0".to_string(),
            ..Default::default()
        };
        config.secret = Some(SECRET.to_string());
        config.terminal.shell = Some("/bin/sh".to_string());
        config.exec.timeout = Duration::from_secs(10);
        configure(&mut config);

        let secret = config.shared_secret(None).expect("No usable secret in config");
        let state = Arc::new(ServerState::new(config, secret));
        let cancel = CancellationToken::new();

        let responder = Responder::bind(Arc::clone(&state), cancel.clone())
            .await
            .expect("Failed to bind responder");
        let addr = responder.local_addr().unwrap();
        let handle = tokio::spawn(responder.run());

        Self {
            addr,
            state,
            cancel,
            handle,
        }
    }

    async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr)
            .await
            .expect("Failed to connect to responder")
    }

    /// Send a raw handshake line and collect everything until close
    async fn exchange(&self, line: &[u8]) -> Vec<u8> {
        let mut stream = self.connect().await;
        stream.write_all(line).await.unwrap();

        let mut reply = Vec::new();
        timeout(Duration::from_secs(20), stream.read_to_end(&mut reply))
            .await
            .expect("Responder did not close the connection")
            .unwrap();
        reply
    }

    async fn run_command(&self, command: &str) -> Vec<u8> {
        let record = HandshakeRecord::command(SECRET, command);
        self.exchange(&handshake_line(&record)).await
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        timeout(Duration::from_secs(15), self.handle)
            .await
            .expect("Responder did not stop")
            .unwrap()
            .unwrap();
    }
}

fn handshake_line(record: &HandshakeRecord) -> Vec<u8> {
    let mut line = serde_json::to_vec(record).unwrap();
    line.push(b'\n');
    line
}

async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
    let mut seen = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed before {:?} appeared", needle);
        seen.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&seen).to_string();
        if text.contains(needle) {
            return text;
        }
    }
}

#[tokio::test]
async fn test_batch_echo() {
    let responder = TestResponder::start().await;

    let reply = responder.run_command("echo hi").await;
    assert_eq!(reply, b"hi\n");

    responder.shutdown().await;
}

#[tokio::test]
async fn test_batch_empty_output() {
    let responder = TestResponder::start().await;

    let reply = responder.run_command("true").await;
    assert!(reply.is_empty());

    responder.shutdown().await;
}

#[tokio::test]
async fn test_batch_multiline_output() {
    let responder = TestResponder::start().await;

    let reply = responder.run_command("printf 'one\\ntwo\\nthree\\n'").await;
    assert_eq!(reply, b"one\ntwo\nthree\n");

    responder.shutdown().await;
}

#[tokio::test]
async fn test_batch_nonzero_exit() {
    let responder = TestResponder::start().await;

    let reply = responder.run_command("echo partial; exit 3").await;
    let reply = String::from_utf8(reply).unwrap();
    assert!(reply.starts_with("Error executing command: exit status 3\nOutput:\n"));
    assert!(reply.ends_with("partial\n"));

    responder.shutdown().await;
}

#[tokio::test]
async fn test_batch_timeout() {
    let responder = TestResponder::start_with(|config| {
        config.exec.timeout = Duration::from_secs(1);
    })
    .await;

    let reply = responder.run_command("echo started; sleep 30").await;
    assert_eq!(
        reply,
        b"Error executing command: command timed out after 1s\nOutput:\nstarted\n"
    );

    responder.shutdown().await;
}

#[tokio::test]
async fn test_batch_direct_policy() {
    let responder = TestResponder::start_with(|config| {
        config.exec.policy = ExecPolicy::Direct;
    })
    .await;

    let reply = responder.run_command("/bin/echo one;two $HOME").await;
    assert_eq!(reply, b"one;two $HOME\n");

    responder.shutdown().await;
}

#[tokio::test]
async fn test_secret_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", SECRET).unwrap();
    let path = file.path().to_path_buf();

    let responder = TestResponder::start_with(move |config| {
        config.secret = None;
        config.secret_file = Some(path);
    })
    .await;

    // Trailing newline in the file is not part of the secret
    let reply = responder.run_command("echo from-file").await;
    assert_eq!(reply, b"from-file\n");

    let record = HandshakeRecord::command(format!("{}\n", SECRET), "echo no");
    let reply = responder.exchange(&handshake_line(&record)).await;
    assert_eq!(ResultRecord::from_reply(&reply), Some(ResultRecord::invalid_key()));

    responder.shutdown().await;
}

#[tokio::test]
async fn test_wrong_key_rejected() {
    let responder = TestResponder::start().await;

    let record = HandshakeRecord::command("wrong", "touch /tmp/rsh-should-not-exist");
    let reply = responder.exchange(&handshake_line(&record)).await;
    assert_eq!(reply, b"{\"output\":\"\",\"error\":\"Invalid API key\"}\n");

    responder.shutdown().await;
}

#[tokio::test]
async fn test_missing_key_rejected() {
    let responder = TestResponder::start().await;

    let reply = responder.exchange(b"{\"command\":\"echo hi\"}\n").await;
    let record = ResultRecord::from_reply(&reply).unwrap();
    assert_eq!(record, ResultRecord::invalid_key());

    responder.shutdown().await;
}

#[tokio::test]
async fn test_malformed_handshake() {
    let responder = TestResponder::start().await;

    let reply = responder.exchange(b"not json\n").await;
    assert_eq!(reply, b"{\"output\":\"\",\"error\":\"Invalid command format\"}\n");

    responder.shutdown().await;
}

#[tokio::test]
async fn test_empty_request() {
    let responder = TestResponder::start().await;

    let line = format!("{{\"api_key\":\"{}\"}}\n", SECRET);
    let reply = responder.exchange(line.as_bytes()).await;
    let record = ResultRecord::from_reply(&reply).unwrap();
    assert_eq!(record.error, "No command specified");

    responder.shutdown().await;
}

#[tokio::test]
async fn test_handshake_timeout_closes() {
    let responder = TestResponder::start_with(|config| {
        config.handshake_timeout = Duration::from_millis(300);
    })
    .await;

    // Half a handshake, never finished
    let reply = responder.exchange(b"{\"api_key\":").await;
    assert!(reply.is_empty());

    responder.shutdown().await;
}

#[tokio::test]
async fn test_interactive_marker_round_trip() {
    let responder = TestResponder::start().await;

    let mut stream = responder.connect().await;
    let record = HandshakeRecord::terminal(SECRET);
    stream.write_all(&handshake_line(&record)).await.unwrap();
    stream.write_all(b"echo rsh-$((20+22))\n").await.unwrap();

    let seen = timeout(Duration::from_secs(10), read_until(&mut stream, "rsh-42"))
        .await
        .expect("marker never echoed back");
    assert!(seen.contains("rsh-42"));

    stream.write_all(b"exit\n").await.unwrap();
    let mut rest = Vec::new();
    timeout(Duration::from_secs(10), stream.read_to_end(&mut rest))
        .await
        .expect("session did not end after exit")
        .unwrap();

    responder.shutdown().await;
}

#[tokio::test]
async fn test_keystrokes_behind_handshake_are_kept() {
    let responder = TestResponder::start().await;

    let mut stream = responder.connect().await;
    let mut bytes = handshake_line(&HandshakeRecord::terminal(SECRET));
    bytes.extend_from_slice(b"echo same-$((1+1))-write\n");
    stream.write_all(&bytes).await.unwrap();

    timeout(Duration::from_secs(10), read_until(&mut stream, "same-2-write"))
        .await
        .expect("bytes sent with the handshake were lost");

    responder.shutdown().await;
}

#[tokio::test]
async fn test_interactive_peer_close_releases_session() {
    let responder = TestResponder::start().await;

    let mut stream = responder.connect().await;
    stream
        .write_all(&handshake_line(&HandshakeRecord::terminal(SECRET)))
        .await
        .unwrap();
    stream.write_all(b"echo ready\n").await.unwrap();
    timeout(Duration::from_secs(10), read_until(&mut stream, "ready"))
        .await
        .unwrap();
    drop(stream);

    timeout(Duration::from_secs(10), async {
        while !responder.state.sessions.is_empty() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("session was not released after the peer left");

    responder.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_drains_interactive_sessions() {
    let responder = TestResponder::start().await;

    let mut stream = responder.connect().await;
    stream
        .write_all(&handshake_line(&HandshakeRecord::terminal(SECRET)))
        .await
        .unwrap();
    stream.write_all(b"echo up\n").await.unwrap();
    timeout(Duration::from_secs(10), read_until(&mut stream, "up"))
        .await
        .unwrap();
    assert_eq!(responder.state.sessions.len(), 1);

    let state = Arc::clone(&responder.state);
    responder.shutdown().await;
    assert!(state.sessions.is_empty());

    // The responder closed our connection on its way out
    let mut rest = Vec::new();
    timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
        .await
        .expect("connection still open after shutdown")
        .ok();
}

#[tokio::test]
async fn test_concurrent_batch_sessions() {
    let responder = Arc::new(TestResponder::start().await);

    let tasks: Vec<_> = (0..5)
        .map(|i| {
            let responder = Arc::clone(&responder);
            tokio::spawn(async move { (i, responder.run_command(&format!("echo job-{}", i)).await) })
        })
        .collect();

    for task in tasks {
        let (i, reply) = task.await.unwrap();
        assert_eq!(reply, format!("job-{}\n", i).into_bytes());
    }

    let responder = Arc::try_unwrap(responder).ok().unwrap();
    responder.shutdown().await;
}
