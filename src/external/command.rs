//! Local process execution
//!
//! Provides the foundational trait for executing local processes (`ssh`,
//! `ping`), enabling dependency injection for testing.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },
    #[error("Command not found: {command}")]
    CommandNotFound { command: String },
    #[error("Command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("IO error: {message}")]
    Io { message: String },
    #[error("Could not reach {target}: {message}")]
    Transport { target: String, message: String },
}

/// Runs a local program to completion. A non-zero exit is a normal
/// [`CommandOutput`]; only failing to run the program at all is an error.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError>;
}

/// Real implementation using tokio::process::Command
#[derive(Debug, Clone, Default)]
pub struct ProcessCommandExecutor {
    timeout: Option<Duration>,
}

impl ProcessCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the child and report `Timeout` when it runs longer than `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

#[async_trait]
impl CommandExecutor for ProcessCommandExecutor {
    async fn execute(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        use tokio::process::Command;

        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child).await.map_err(|_| {
                CommandError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                }
            })?,
            None => child.await,
        };

        let output = result.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandError::CommandNotFound {
                    command: program.to_string(),
                }
            } else {
                CommandError::Io { message: e.to_string() }
            }
        })?;

        Ok(CommandOutput {
            status_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
