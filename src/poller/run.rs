//! Run records
//!
//! A [`WorkflowRun`] is the single mutable value threaded through a run. The
//! sequencer appends one [`PhaseRecord`] per executed phase and seals the run
//! when it reaches a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::phase::PhaseMode;

/// Terminal result of polling one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollOutcome {
    Success,
    Timeout,
    ProbeError(String),
    Cancelled,
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Success)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::Success => "Success",
            PollOutcome::Timeout => "Timeout",
            PollOutcome::ProbeError(_) => "ProbeError",
            PollOutcome::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollOutcome::ProbeError(detail) => write!(f, "ProbeError: {detail}"),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Pending state seen by the last unsatisfied probe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSnapshot {
    pub count: u64,
    pub items: Vec<String>,
}

/// Everything the sequencer learned about one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub name: String,
    pub mode: PhaseMode,
    pub outcome: PollOutcome,
    /// Probe calls made, including calls that ended in a transport error
    pub attempts: u32,
    /// Interval sleeps completed between attempts
    pub waits: u32,
    pub max_attempts: u32,
    pub interval_secs: u64,
    pub last_pending: Option<PendingSnapshot>,
    /// Retryable probe errors absorbed along the way
    pub warnings: Vec<String>,
    /// Error seen by the final attempt, if it ended in one
    pub last_error: Option<String>,
    /// Manual correction needed when this phase fails
    pub on_failure: Option<String>,
    /// Remote state this phase leaves behind once it succeeds
    pub leaves: Option<String>,
    /// Earlier phases whose left-behind state this phase undoes
    pub clears: Vec<String>,
}

impl PhaseRecord {
    pub fn blocks_run(&self) -> bool {
        match self.outcome {
            PollOutcome::Success => false,
            PollOutcome::Cancelled => true,
            _ => self.mode == PhaseMode::Required,
        }
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    InProgress,
    AllPhasesSucceeded,
    /// Every required phase passed, at least one best-effort phase did not
    SucceededWithWarnings,
    FailedAtPhase { name: String, reason: String },
    Cancelled { phase: String },
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::InProgress)
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RunStatus::AllPhasesSucceeded | RunStatus::SucceededWithWarnings
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub run_id: Uuid,
    pub plan: String,
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub phases_declared: usize,
    pub records: Vec<PhaseRecord>,
    pub status: RunStatus,
}

impl WorkflowRun {
    pub fn new(plan: impl Into<String>, phases_declared: usize) -> Self {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            run_id: Uuid::new_v4(),
            plan: plan.into(),
            host,
            started_at: Utc::now(),
            finished_at: None,
            phases_declared,
            records: Vec::new(),
            status: RunStatus::InProgress,
        }
    }

    /// Append a phase record. Refused once the run is terminal.
    pub fn record(&mut self, record: PhaseRecord) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Seal the run. The first terminal status wins.
    pub fn finish(&mut self, status: RunStatus) {
        if self.status.is_terminal() || !status.is_terminal() {
            return;
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    pub fn failing_record(&self) -> Option<&PhaseRecord> {
        self.records.iter().find(|record| record.blocks_run())
    }

    /// Index of the phase that halted the run, in declaration order
    pub fn failing_index(&self) -> Option<usize> {
        self.records.iter().position(|record| record.blocks_run())
    }
}
