//! A shell running on a freshly opened PTY

use std::io::{Read, Write};

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};

use rsh_core::config::TerminalConfig;
use rsh_core::error::SessionError;

use super::shell::resolve_shell;

/// `TERM` exported to every interactive shell
pub const SHELL_TERM: &str = "xterm-256color";

/// Handles to a shell spawned on a PTY.
///
/// The slave side is dropped right after spawning, so once the shell and
/// its descendants exit, reads from `reader` report end of stream.
pub struct PtyProcess {
    /// Path of the spawned shell
    pub shell: String,
    /// Process ID of the shell
    pub pid: Option<u32>,
    /// Master side; dropping it hangs up the terminal
    pub master: Box<dyn MasterPty + Send>,
    /// Terminal output
    pub reader: Box<dyn Read + Send>,
    /// Terminal input
    pub writer: Box<dyn Write + Send>,
    /// Child handle, for waiting on exit
    pub child: Box<dyn Child + Send + Sync>,
    /// Kill handle usable while another thread waits on `child`
    pub killer: Box<dyn ChildKiller + Send + Sync>,
}

impl PtyProcess {
    /// Open a PTY of the configured size and start the configured shell on it
    pub fn spawn(config: &TerminalConfig) -> Result<Self, SessionError> {
        let shell = resolve_shell(config)?;

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: config.rows,
                cols: config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SessionError::PtyAllocation(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&shell);
        cmd.env("TERM", SHELL_TERM);
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SessionError::Spawn(format!("{}: {}", shell, e)))?;
        drop(pair.slave);

        let pid = child.process_id();
        let killer = child.clone_killer();

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SessionError::PtyAllocation(format!("clone reader: {}", e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| SessionError::PtyAllocation(format!("take writer: {}", e)))?;

        tracing::debug!(
            "Spawned {} (pid {:?}) on a {}x{} PTY",
            shell,
            pid,
            config.cols,
            config.rows
        );

        Ok(Self {
            shell,
            pid,
            master: pair.master,
            reader,
            writer,
            child,
            killer,
        })
    }
}
