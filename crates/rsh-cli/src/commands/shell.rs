//! Interactive mode: attach the local terminal to a remote shell

use anyhow::{Context, Result};

use rsh_core::error::ConnectionError;
use rsh_core::SharedSecret;
use rsh_protocol::{write_record, HandshakeRecord};

use crate::connect::Connector;
use crate::output::{print_info, print_warning};
use crate::terminal::{
    ensure_terminal, relay, spawn_stdin_reader, termination_signal, RawModeGuard, RelayEnd,
};

/// Open an interactive session and relay the terminal until it ends
pub async fn run(connector: &Connector, secret: &SharedSecret, quiet: bool) -> Result<()> {
    ensure_terminal()?;

    let mut stream = connector.connect().await?;
    write_record(&mut stream, &HandshakeRecord::terminal(secret.expose()))
        .await
        .context("Failed to send handshake")?;

    let input = spawn_stdin_reader().context("Failed to start reading stdin")?;

    let summary = {
        let _raw = RawModeGuard::enable().context("Failed to enable raw mode")?;
        relay(stream, input, tokio::io::stdout(), termination_signal()).await
    };

    if !quiet {
        println!();
        print_info("Terminal session ended.");
    }

    if let Some(record) = summary.rejection() {
        return Err(ConnectionError::Rejected(record.error).into());
    }

    match summary.end {
        RelayEnd::RemoteClosed => Ok(()),
        RelayEnd::Interrupted(signal) => {
            if !quiet {
                print_warning(&format!("Session interrupted by {}", signal));
            }
            Ok(())
        }
        RelayEnd::Failed(e) => Err(e).context("Terminal session failed"),
    }
}
