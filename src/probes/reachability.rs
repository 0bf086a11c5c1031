// Host reachability over ICMP

use std::sync::Arc;

use async_trait::async_trait;

use crate::external::CommandExecutor;
use crate::poller::{Probe, ProbeError, ProbeResult};

/// One `ping` to a host. Up means at least one reply within the timeout.
pub struct ReachabilityProbe {
    executor: Arc<dyn CommandExecutor>,
    host: String,
    timeout_secs: u64,
}

impl ReachabilityProbe {
    pub fn new(executor: Arc<dyn CommandExecutor>, host: impl Into<String>) -> Self {
        Self {
            executor,
            host: host.into(),
            timeout_secs: 5,
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs.max(1);
        self
    }

    fn args(&self) -> Vec<String> {
        vec![
            "-c".to_string(),
            "1".to_string(),
            "-W".to_string(),
            self.timeout_secs.to_string(),
            self.host.clone(),
        ]
    }
}

#[async_trait]
impl Probe for ReachabilityProbe {
    async fn probe(&self) -> Result<ProbeResult, ProbeError> {
        let output = self
            .executor
            .execute("ping", &self.args())
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        tracing::debug!(host = %self.host, status = output.status_code, "Ping finished");
        Ok(ProbeResult::Flag(output.success()))
    }

    fn describe(&self) -> String {
        format!("ping {}", self.host)
    }
}
