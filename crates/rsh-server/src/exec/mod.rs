//! One-shot command execution
//!
//! A batch request runs one command line to completion and answers with
//! its combined stdout and stderr. Failures of any kind (spawn error,
//! non-zero exit, signal, timeout) are answered in one textual shape that
//! still carries whatever output was produced.

mod process;

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use rsh_core::config::{ExecConfig, ExecPolicy};

use process::{describe_status, kill_process_group, spawn};

const CAPTURE_CHUNK_SIZE: usize = 4096;

/// Result of running one batch command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Exited with status zero
    Success(Vec<u8>),
    /// Anything else, with the output captured before the failure
    Failed { reason: String, output: Vec<u8> },
}

impl ExecOutcome {
    /// Bytes written back to the initiator
    pub fn into_reply(self) -> Vec<u8> {
        match self {
            ExecOutcome::Success(output) => output,
            ExecOutcome::Failed { reason, output } => {
                let mut reply = format!("Error executing command: {}\nOutput:\n", reason).into_bytes();
                reply.extend_from_slice(&output);
                reply
            }
        }
    }

    #[cfg(test)]
    fn is_success(&self) -> bool {
        matches!(self, ExecOutcome::Success(_))
    }
}

/// Runs batch commands under a policy and a deadline
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    policy: ExecPolicy,
    timeout: Duration,
}

impl BatchExecutor {
    pub fn new(policy: ExecPolicy, timeout: Duration) -> Self {
        Self { policy, timeout }
    }

    pub fn from_config(config: &ExecConfig) -> Self {
        Self::new(config.policy, config.timeout)
    }

    /// Run `command` and collect its combined output.
    ///
    /// The command's whole process group is killed when the deadline passes
    /// or `cancel` fires.
    pub async fn run(&self, command: &str, cancel: &CancellationToken) -> ExecOutcome {
        let mut child = match spawn(self.policy, command) {
            Ok(child) => child,
            Err(e) => {
                return ExecOutcome::Failed {
                    reason: e.to_string(),
                    output: Vec::new(),
                }
            }
        };
        tracing::debug!("Started {:?} command (pid {:?})", self.policy, child.id());

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut output = Vec::new();

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut out_buf = [0u8; CAPTURE_CHUNK_SIZE];
        let mut err_buf = [0u8; CAPTURE_CHUNK_SIZE];

        while stdout.is_some() || stderr.is_some() {
            tokio::select! {
                _ = &mut deadline => {
                    kill_process_group(&mut child).await;
                    return self.timed_out(output);
                }
                _ = cancel.cancelled() => {
                    kill_process_group(&mut child).await;
                    return ExecOutcome::Failed { reason: "responder shutting down".to_string(), output };
                }
                read = read_chunk(&mut stdout, &mut out_buf), if stdout.is_some() => {
                    match read {
                        Some(n) => output.extend_from_slice(&out_buf[..n]),
                        None => stdout = None,
                    }
                }
                read = read_chunk(&mut stderr, &mut err_buf), if stderr.is_some() => {
                    match read {
                        Some(n) => output.extend_from_slice(&err_buf[..n]),
                        None => stderr = None,
                    }
                }
            }
        }

        let status = tokio::select! {
            _ = &mut deadline => {
                kill_process_group(&mut child).await;
                return self.timed_out(output);
            }
            _ = cancel.cancelled() => {
                kill_process_group(&mut child).await;
                return ExecOutcome::Failed { reason: "responder shutting down".to_string(), output };
            }
            status = child.wait() => status,
        };

        match status {
            Ok(status) if status.success() => ExecOutcome::Success(output),
            Ok(status) => ExecOutcome::Failed {
                reason: describe_status(status),
                output,
            },
            Err(e) => ExecOutcome::Failed {
                reason: e.to_string(),
                output,
            },
        }
    }

    fn timed_out(&self, output: Vec<u8>) -> ExecOutcome {
        tracing::warn!("Command timed out after {:?}", self.timeout);
        ExecOutcome::Failed {
            reason: format!("command timed out after {}s", self.timeout.as_secs()),
            output,
        }
    }
}

/// Read one chunk; `None` on end of stream or a failed read
async fn read_chunk<R>(reader: &mut Option<R>, buf: &mut [u8]) -> Option<usize>
where
    R: AsyncRead + Unpin,
{
    let reader = reader.as_mut()?;
    match reader.read(buf).await {
        Ok(0) => None,
        Ok(n) => Some(n),
        Err(e) => {
            tracing::debug!("Output pipe read failed: {}", e);
            None
        }
    }
}
