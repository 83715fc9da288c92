//! Batch mode: run one command remotely and print its output

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use rsh_core::error::{ConnectionError, RshError};
use rsh_core::SharedSecret;
use rsh_protocol::{write_record, HandshakeRecord, ResultRecord};

use crate::connect::Connector;
use crate::output::output_banner;

/// Run `command` on the responder and return everything it sent back.
///
/// A reply consisting of a single failure record means the handshake was
/// rejected and is returned as [`ConnectionError::Rejected`].
pub async fn execute(
    connector: &Connector,
    secret: &SharedSecret,
    command: &str,
) -> Result<Vec<u8>, RshError> {
    let mut stream = connector.connect().await?;

    let record = HandshakeRecord::command(secret.expose(), command);
    write_record(&mut stream, &record).await?;
    tracing::debug!("Sent command handshake to {}", connector.address());

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await?;
    tracing::debug!("Received {} bytes", reply.len());

    if let Some(ResultRecord { error, .. }) = ResultRecord::from_reply(&reply) {
        return Err(ConnectionError::Rejected(error).into());
    }

    Ok(reply)
}

/// Run `command` and copy its output to stdout
pub async fn run(connector: &Connector, secret: &SharedSecret, command: &str, quiet: bool) -> Result<()> {
    let reply = execute(connector, secret, command).await?;

    let mut stdout = tokio::io::stdout();
    if !quiet {
        stdout
            .write_all(output_banner(connector.address()).as_bytes())
            .await?;
    }
    stdout.write_all(&reply).await?;
    stdout.flush().await?;
    Ok(())
}
