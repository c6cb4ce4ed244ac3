//! # Process Runner
//!
//! Launches a [`CommandLine`] as a child process without a shell.
//!
//! - `wait = false`: the child is spawned and left running with no completion
//!   handle kept. This is how the long-lived netserver is started; stopping it
//!   is the namespace owner's job, not ours.
//! - `wait = true`: the call suspends until the child exits and returns its
//!   standard output decoded as text. Standard error is captured and dropped.
//!   A non-zero exit status is not an error at this layer; unusable output
//!   shows up later as a run with no samples.

use crate::command::CommandLine;
use crate::error::{HarnessError, Result};
use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Executes commands on behalf of the orchestrator.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command`. Returns `Some(stdout)` when `wait` is set, `None`
    /// otherwise.
    async fn execute(&self, command: &CommandLine, wait: bool) -> Result<Option<String>>;
}

/// [`CommandExecutor`] backed by real subprocesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubprocessExecutor;

impl SubprocessExecutor {
    pub fn new() -> Self {
        Self
    }

    fn command(command: &CommandLine) -> Result<Command> {
        let program = command.program().ok_or_else(|| HarnessError::Launch {
            command: command.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(command.arguments()).stdin(Stdio::null());
        Ok(cmd)
    }
}

#[async_trait]
impl CommandExecutor for SubprocessExecutor {
    async fn execute(&self, command: &CommandLine, wait: bool) -> Result<Option<String>> {
        let mut cmd = Self::command(command)?;

        if !wait {
            // Nobody reads a detached child's output; a closed pipe would
            // kill it on its first write.
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
            let child = cmd.spawn().map_err(|source| HarnessError::Launch {
                command: command.to_string(),
                source,
            })?;
            debug!(pid = ?child.id(), command = %command, "spawned detached process");
            return Ok(None);
        }

        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let child = cmd.spawn().map_err(|source| HarnessError::Launch {
            command: command.to_string(),
            source,
        })?;
        debug!(pid = ?child.id(), command = %command, "spawned process, waiting for exit");

        let output = child.wait_with_output().await?;
        debug!(
            status = %output.status,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "process exited"
        );

        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}
