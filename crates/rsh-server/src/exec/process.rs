//! Spawning and killing batch processes

use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};

use rsh_core::config::ExecPolicy;

/// Start `line` under `policy` with piped stdout/stderr.
///
/// Each command leads its own process group so a timeout can take down
/// everything it started.
pub(super) fn spawn(policy: ExecPolicy, line: &str) -> io::Result<Child> {
    let mut command = match policy {
        ExecPolicy::Shell => {
            let mut command = Command::new("sh");
            command.arg("-c").arg(line);
            command
        }
        ExecPolicy::Direct => {
            let mut parts = line.split_whitespace();
            let program = parts
                .next()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
            let mut command = Command::new(program);
            command.args(parts).env_clear();
            command
        }
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    command.process_group(0);

    command.spawn()
}

/// Kill the child's process group, then reap the child
pub(super) async fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: killpg only sends a signal; the group was created for this child
        let result = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if result != 0 {
            tracing::debug!("killpg({}) failed: {}", pid, io::Error::last_os_error());
        }
    }

    if let Err(e) = child.start_kill() {
        tracing::debug!("Kill after timeout: {}", e);
    }
    if let Err(e) = child.wait().await {
        tracing::debug!("Reaping killed command failed: {}", e);
    }
}

/// Render a non-success status the way `exit status 3` reads
pub(super) fn describe_status(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit status {}", code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal: {}", signal);
        }
    }

    status.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_describe_exit_code() {
        let status = Command::new("sh").arg("-c").arg("exit 7").status().await.unwrap();
        assert_eq!(describe_status(status), "exit status 7");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_describe_signal() {
        let status = Command::new("sh")
            .arg("-c")
            .arg("kill -9 $$")
            .status()
            .await
            .unwrap();
        assert_eq!(describe_status(status), "signal: 9");
    }

    #[test]
    fn test_direct_rejects_empty_line() {
        let err = spawn(ExecPolicy::Direct, "").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(err.to_string(), "empty command");
    }
}
