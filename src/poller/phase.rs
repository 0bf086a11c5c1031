//! Phase definitions
//!
//! A phase is data: an optional one-shot remote action, the probe that confirms
//! the action took effect, and the retry budget for that probe.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::policy::RetryPolicy;
use super::probe::Probe;
use crate::external::RemoteChannel;

/// How a failing phase affects the rest of the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseMode {
    /// Failure halts the run
    #[default]
    Required,
    /// Failure is logged and recorded, the run continues
    BestEffort,
}

/// A remote command issued once before polling starts
#[derive(Clone)]
pub struct RemoteAction {
    pub command: String,
    pub channel: Arc<dyn RemoteChannel>,
}

impl RemoteAction {
    pub fn new(command: impl Into<String>, channel: Arc<dyn RemoteChannel>) -> Self {
        Self {
            command: command.into(),
            channel,
        }
    }

    /// Run the action. Any non-zero exit is reported with its stderr.
    pub async fn execute(&self) -> Result<(), String> {
        debug!(command = %self.command, target = %self.channel.target(), "Issuing phase action");

        match self.channel.run(&self.command).await {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => {
                let stderr = output.stderr.trim();
                warn!(
                    command = %self.command,
                    status = output.status_code,
                    stderr = %stderr,
                    "Phase action exited non-zero"
                );
                Err(format!(
                    "action `{}` exited with status {}{}",
                    self.command,
                    output.status_code,
                    if stderr.is_empty() {
                        String::new()
                    } else {
                        format!(": {stderr}")
                    }
                ))
            }
            Err(e) => Err(format!("action `{}` could not run: {e}", self.command)),
        }
    }
}

impl std::fmt::Debug for RemoteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAction")
            .field("command", &self.command)
            .field("target", &self.channel.target())
            .finish()
    }
}

#[derive(Clone)]
pub struct Phase {
    pub name: String,
    pub action: Option<RemoteAction>,
    pub probe: Arc<dyn Probe>,
    pub policy: RetryPolicy,
    pub mode: PhaseMode,
    pub on_failure: Option<String>,
    pub leaves: Option<String>,
    /// Names of earlier phases whose `leaves` state this phase undoes
    pub clears: Vec<String>,
}

impl Phase {
    pub fn new(name: impl Into<String>, probe: Arc<dyn Probe>, policy: RetryPolicy) -> Self {
        Self {
            name: name.into(),
            action: None,
            probe,
            policy,
            mode: PhaseMode::Required,
            on_failure: None,
            leaves: None,
            clears: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: RemoteAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_mode(mut self, mode: PhaseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_on_failure(mut self, note: impl Into<String>) -> Self {
        self.on_failure = Some(note.into());
        self
    }

    pub fn leaving(mut self, note: impl Into<String>) -> Self {
        self.leaves = Some(note.into());
        self
    }

    pub fn clearing<I, S>(mut self, phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clears.extend(phases.into_iter().map(Into::into));
        self
    }
}

impl std::fmt::Debug for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Phase")
            .field("name", &self.name)
            .field("action", &self.action)
            .field("probe", &self.probe.describe())
            .field("policy", &self.policy)
            .field("mode", &self.mode)
            .field("clears", &self.clears)
            .finish()
    }
}
