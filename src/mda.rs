//! Hand-off of rendered messages to a local mail delivery agent.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::SyncError;
use crate::message::Message;

/// Anything that can accept a message for delivery.
#[async_trait]
pub trait Mda: Send + Sync {
    /// Deliver one message. Failures are reported, never retried here.
    async fn deliver(&self, message: &Message) -> Result<(), SyncError>;
}

/// Delivers by piping the message into a shell command such as `procmail`.
///
/// The agent's stderr is drained while the message is written, and the whole
/// hand-off is bounded by `timeout`; the agent is killed when it expires.
#[derive(Debug, Clone)]
pub struct CommandMda {
    command: String,
    timeout: Duration,
}

impl CommandMda {
    #[must_use]
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    async fn run(&self, bytes: &[u8]) -> Result<(), String> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to start `{}`: {e}", self.command))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| "delivery agent stdin unavailable".to_string())?;
        let write = async move {
            let written = stdin.write_all(bytes).await;
            // Closing stdin signals end of message.
            drop(stdin);
            written
        };

        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output.map_err(|e| format!("failed to wait for delivery agent: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            ));
        }
        written.map_err(|e| format!("failed to write message: {e}"))
    }
}

#[async_trait]
impl Mda for CommandMda {
    async fn deliver(&self, message: &Message) -> Result<(), SyncError> {
        let bytes = message.to_rfc5322()?;

        let reason = match timeout(self.timeout, self.run(&bytes)).await {
            Ok(Ok(())) => {
                debug!(message_id = %message.message_id, bytes = bytes.len(), "Message delivered");
                return Ok(());
            }
            Ok(Err(reason)) => reason,
            Err(_) => format!(
                "`{}` did not finish within {}s",
                self.command,
                self.timeout.as_secs_f64()
            ),
        };

        Err(SyncError::Delivery {
            message_id: message.message_id.clone(),
            reason,
        })
    }
}
