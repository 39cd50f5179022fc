//! Commentary from an external command.
//!
//! The configured command line runs under `sh -c`, receives the prompt on
//! stdin and answers on stdout. Any language-model CLI, or a plain script,
//! can sit behind it.

use crate::domain::error::MetalwatchError;
use crate::ports::commentary_port::CommentaryPort;
use crate::ports::config_port::ConfigPort;
use std::io::{ErrorKind, Write};
use std::process::{Child, Command, Stdio};

const RESOURCE: &str = "commentary";

pub struct CommandCommentary {
    command: String,
}

impl CommandCommentary {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// `None` when `[commentary] command` is unset.
    pub fn from_config(config: &dyn ConfigPort) -> Option<Self> {
        config
            .get_string("commentary", "command")
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .map(Self::new)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn unavailable(reason: impl Into<String>) -> MetalwatchError {
        MetalwatchError::ExternalResourceUnavailable {
            resource: RESOURCE.to_string(),
            reason: reason.into(),
        }
    }

    /// Stops a child that will not be waited on normally so it is not left running.
    fn abort(child: &mut Child, reason: String) -> MetalwatchError {
        if let Err(e) = child.kill() {
            tracing::debug!(error = %e, "commentary command already exited");
        }
        let _ = child.wait();
        Self::unavailable(reason)
    }
}

impl CommentaryPort for CommandCommentary {
    fn complete(&self, prompt: &str) -> Result<String, MetalwatchError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::unavailable(format!("failed to start {:?}: {}", self.command, e)))?;

        // Commands that ignore their input may exit before the prompt is written.
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(prompt.as_bytes()) {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => {
                    return Err(Self::abort(&mut child, format!("failed to send prompt: {e}")));
                }
                _ => {}
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Self::unavailable(format!("command did not finish: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::unavailable(format!(
                "command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let reply = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if reply.is_empty() {
            return Err(Self::unavailable("command produced no output"));
        }
        tracing::debug!(chars = reply.len(), "commentary received");
        Ok(reply)
    }
}
