//! Transfer-queue drain detection
//!
//! BRMS and object-storage listings announce an empty queue in more than one
//! way: a message id, a literal such as `No media`, or simply a listing with no
//! volume lines left. [`DrainDetector`] supports all three so each plan can say
//! which one its listing command produces.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::external::RemoteChannel;
use crate::poller::{Probe, ProbeError, ProbeResult};

const EXCERPT_LEN: usize = 160;

#[derive(Debug, Clone)]
pub struct DrainDetector {
    /// Any of these in the output means drained
    empty_markers: Vec<String>,
    /// Each match is one outstanding item; capture group 1, if present, is
    /// the item's identifier
    item_pattern: Option<Regex>,
}

impl DrainDetector {
    pub fn new(empty_markers: Vec<String>, item_pattern: Option<Regex>) -> Self {
        Self {
            empty_markers,
            item_pattern,
        }
    }

    pub fn with_markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(markers.into_iter().map(Into::into).collect(), None)
    }

    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.item_pattern = Some(pattern);
        self
    }

    /// First empty marker present in `output`
    pub fn marker_in(&self, output: &str) -> Option<&str> {
        self.empty_markers
            .iter()
            .map(String::as_str)
            .find(|m| output.contains(m))
    }

    pub fn detect(&self, output: &str) -> Result<ProbeResult, ProbeError> {
        if let Some(marker) = self.marker_in(output) {
            tracing::debug!(marker = %marker, "Drain marker found");
            return Ok(ProbeResult::drained());
        }

        match &self.item_pattern {
            Some(pattern) => {
                let mut items: Vec<String> = Vec::new();
                for caps in pattern.captures_iter(output) {
                    let id = caps
                        .get(1)
                        .or_else(|| caps.get(0))
                        .map(|m| m.as_str().trim().to_string())
                        .unwrap_or_default();
                    if !items.contains(&id) {
                        items.push(id);
                    }
                }

                if !items.is_empty() {
                    Ok(ProbeResult::pending(items))
                } else if self.empty_markers.is_empty() {
                    Ok(ProbeResult::drained())
                } else {
                    // Markers were expected to announce the empty case
                    Err(ProbeError::UnrecognizedOutput(excerpt(output)))
                }
            }
            None => {
                let count = output.lines().filter(|line| !line.trim().is_empty()).count() as u64;
                if count == 0 {
                    Err(ProbeError::UnrecognizedOutput("empty output".to_string()))
                } else {
                    Ok(ProbeResult::Pending {
                        count,
                        items: Vec::new(),
                    })
                }
            }
        }
    }
}

fn excerpt(output: &str) -> String {
    let flat = output.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.is_empty() {
        return "empty output".to_string();
    }
    match flat.char_indices().nth(EXCERPT_LEN) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

/// Lists the transfer queue remotely and counts what is still outstanding
pub struct TransferQueueProbe {
    channel: Arc<dyn RemoteChannel>,
    command: String,
    detector: DrainDetector,
    /// Exit statuses under which the listing is trusted without a marker
    ok_exit_codes: Vec<i32>,
}

impl TransferQueueProbe {
    pub fn new(channel: Arc<dyn RemoteChannel>, command: impl Into<String>, detector: DrainDetector) -> Self {
        Self {
            channel,
            command: command.into(),
            detector,
            ok_exit_codes: vec![0],
        }
    }

    pub fn with_ok_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.ok_exit_codes = codes;
        self
    }
}

#[async_trait]
impl Probe for TransferQueueProbe {
    async fn probe(&self) -> Result<ProbeResult, ProbeError> {
        let output = self
            .channel
            .run(&self.command)
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        // `system` exits non-zero when the CL command ends in an escape
        // message, and "no media" is often exactly that, so a marker in either
        // stream counts regardless of status.
        let combined = format!("{}\n{}", output.stdout, output.stderr);
        if self.detector.marker_in(&combined).is_none()
            && !self.ok_exit_codes.contains(&output.status_code)
        {
            tracing::warn!(status = output.status_code, "Transfer queue listing failed");
            return Err(ProbeError::UnrecognizedOutput(format!(
                "listing exited with status {}: {}",
                output.status_code,
                excerpt(&combined)
            )));
        }
        let result = self.detector.detect(&combined)?;
        tracing::debug!(status = output.status_code, %result, "Transfer queue listed");
        Ok(result)
    }

    fn describe(&self) -> String {
        format!("transfer queue `{}` on {}", self.command, self.channel.target())
    }
}
