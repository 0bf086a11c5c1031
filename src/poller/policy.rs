//! Fixed-interval retry policy
//!
//! Each phase carries its own interval and attempt budget. Polling is purely
//! time-driven: no exponential growth, no jitter.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::probe::{Probe, ProbeResult};
use super::run::{PendingSnapshot, PollOutcome};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("interval must be greater than zero")]
    ZeroInterval,
    #[error("max_attempts must be greater than zero")]
    ZeroAttempts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    interval: Duration,
    max_attempts: u32,
}

/// What happened while polling one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub outcome: PollOutcome,
    pub attempts: u32,
    pub waits: u32,
    pub last_pending: Option<PendingSnapshot>,
    pub warnings: Vec<String>,
    /// Set when the final attempt ended in a retryable error
    pub last_error: Option<String>,
}

impl PollReport {
    fn start() -> Self {
        Self {
            outcome: PollOutcome::Timeout,
            attempts: 0,
            waits: 0,
            last_pending: None,
            warnings: Vec::new(),
            last_error: None,
        }
    }

    fn finish(mut self, outcome: PollOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Result<Self, PolicyError> {
        if interval.is_zero() {
            return Err(PolicyError::ZeroInterval);
        }
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        Ok(Self {
            interval,
            max_attempts,
        })
    }

    pub fn from_secs(interval_secs: u64, max_attempts: u32) -> Result<Self, PolicyError> {
        Self::new(Duration::from_secs(interval_secs), max_attempts)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Worst-case wall time spent sleeping before the phase times out
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }

    /// Poll `probe` until it reports success, the budget runs out, a
    /// non-retryable error occurs, or `cancel` fires.
    ///
    /// Exhaustion is always `Timeout`. When the final attempt was a transport
    /// error its text is kept in `last_error` for the operator.
    pub async fn poll(&self, probe: &dyn Probe, cancel: &CancellationToken) -> PollReport {
        let mut report = PollReport::start();

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return report.finish(PollOutcome::Cancelled);
            }

            report.attempts = attempt;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return report.finish(PollOutcome::Cancelled),
                result = probe.probe() => result,
            };

            match result {
                Ok(result) if result.is_satisfied() => {
                    debug!(attempt, %result, "Probe satisfied");
                    report.last_error = None;
                    return report.finish(PollOutcome::Success);
                }
                Ok(result) => {
                    debug!(attempt, max_attempts = self.max_attempts, %result, "Probe not yet satisfied");
                    report.last_error = None;
                    if let ProbeResult::Pending { count, items } = result {
                        report.last_pending = Some(PendingSnapshot { count, items });
                    }
                }
                Err(error) if error.is_retryable() => {
                    warn!(attempt, %error, "Probe failed, counting as a retry");
                    report.warnings.push(format!("attempt {attempt}: {error}"));
                    report.last_error = Some(error.to_string());
                }
                Err(error) => {
                    warn!(attempt, %error, "Probe failed permanently");
                    return report.finish(PollOutcome::ProbeError(error.to_string()));
                }
            }

            if attempt < self.max_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return report.finish(PollOutcome::Cancelled),
                    _ = tokio::time::sleep(self.interval) => report.waits += 1,
                }
            }
        }

        report.finish(PollOutcome::Timeout)
    }
}
