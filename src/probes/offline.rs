// Inverted probe for the "went down" half of a reboot cycle

use std::sync::Arc;

use async_trait::async_trait;

use crate::poller::{Probe, ProbeError, ProbeResult};

/// Satisfied once the wrapped boolean probe reports `false`
pub struct OfflineProbe {
    inner: Arc<dyn Probe>,
    transport_means_offline: bool,
}

impl OfflineProbe {
    pub fn new(inner: Arc<dyn Probe>) -> Self {
        Self {
            inner,
            transport_means_offline: false,
        }
    }

    /// Treat a transport failure of the inner probe as "offline". Right for
    /// SSH-based checks where a refused connection is the signal being awaited.
    pub fn transport_means_offline(mut self, value: bool) -> Self {
        self.transport_means_offline = value;
        self
    }
}

#[async_trait]
impl Probe for OfflineProbe {
    async fn probe(&self) -> Result<ProbeResult, ProbeError> {
        match self.inner.probe().await {
            Ok(ProbeResult::Flag(up)) => Ok(ProbeResult::Flag(!up)),
            Ok(ProbeResult::Pending { .. }) => Err(ProbeError::Unsupported(format!(
                "cannot invert count probe {}",
                self.inner.describe()
            ))),
            Err(ProbeError::Transport(_)) if self.transport_means_offline => {
                Ok(ProbeResult::Flag(true))
            }
            Err(e) => Err(e),
        }
    }

    fn describe(&self) -> String {
        format!("not ({})", self.inner.describe())
    }
}
