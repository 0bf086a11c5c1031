// Remote command probe
//
// Exit status 0 means the condition holds. Used for "can we log in over SSH"
// and for subsystem readiness checks that already encode their answer in the
// exit status.

use std::sync::Arc;

use async_trait::async_trait;

use crate::external::RemoteChannel;
use crate::poller::{Probe, ProbeError, ProbeResult};

pub struct RemoteCommandProbe {
    channel: Arc<dyn RemoteChannel>,
    command: String,
    expect: Option<String>,
}

impl RemoteCommandProbe {
    pub fn new(channel: Arc<dyn RemoteChannel>, command: impl Into<String>) -> Self {
        Self {
            channel,
            command: command.into(),
            expect: None,
        }
    }

    /// Additionally require `text` in stdout
    pub fn expecting(mut self, text: impl Into<String>) -> Self {
        self.expect = Some(text.into());
        self
    }
}

#[async_trait]
impl Probe for RemoteCommandProbe {
    async fn probe(&self) -> Result<ProbeResult, ProbeError> {
        let output = self
            .channel
            .run(&self.command)
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        let matched = match &self.expect {
            Some(text) => output.stdout.contains(text.as_str()),
            None => true,
        };
        Ok(ProbeResult::Flag(output.success() && matched))
    }

    fn describe(&self) -> String {
        format!("`{}` on {}", self.command, self.channel.target())
    }
}
