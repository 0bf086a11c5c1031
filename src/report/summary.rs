//! Run summary
//!
//! [`report`] is a pure function of a finished [`WorkflowRun`]: calling it twice
//! on the same run yields equal summaries. How the summary is shown is decided
//! by [`SummaryOutput`](super::output::SummaryOutput).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::poller::{PendingSnapshot, PhaseMode, PhaseRecord, PollOutcome, RunStatus, WorkflowRun};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Passed,
    PassedWithWarnings,
    Failed,
    Cancelled,
    Incomplete,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Passed | Verdict::PassedWithWarnings)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub name: String,
    pub mode: PhaseMode,
    pub outcome: PollOutcome,
    pub attempts: u32,
    pub max_attempts: u32,
    pub waits: u32,
    pub interval_secs: u64,
    /// Items still outstanding at the last unsatisfied probe
    pub pending: Option<PendingSnapshot>,
    pub warnings: Vec<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub run_id: Uuid,
    pub plan: String,
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub verdict: Verdict,
    pub failing_phase: Option<String>,
    pub failure_reason: Option<String>,
    pub phases: Vec<PhaseSummary>,
    /// Declared phases that never started
    pub not_started: usize,
    /// Remote state an operator may have to fix by hand
    pub manual_actions: Vec<String>,
}

impl Summary {
    pub fn total_attempts(&self) -> u32 {
        self.phases.iter().map(|p| p.attempts).sum()
    }
}

pub fn report(run: &WorkflowRun) -> Summary {
    let (verdict, failing_phase, failure_reason) = match &run.status {
        RunStatus::AllPhasesSucceeded => (Verdict::Passed, None, None),
        RunStatus::SucceededWithWarnings => (Verdict::PassedWithWarnings, None, None),
        RunStatus::FailedAtPhase { name, reason } => {
            (Verdict::Failed, Some(name.clone()), Some(reason.clone()))
        }
        RunStatus::Cancelled { phase } => (
            Verdict::Cancelled,
            Some(phase.clone()),
            Some("cancelled by operator".to_string()),
        ),
        RunStatus::InProgress => (Verdict::Incomplete, None, None),
    };

    Summary {
        run_id: run.run_id,
        plan: run.plan.clone(),
        host: run.host.clone(),
        started_at: run.started_at,
        finished_at: run.finished_at,
        verdict,
        failing_phase,
        failure_reason,
        phases: run.records.iter().map(summarize_phase).collect(),
        not_started: run.phases_declared.saturating_sub(run.records.len()),
        manual_actions: manual_actions(run, verdict),
    }
}

fn summarize_phase(record: &PhaseRecord) -> PhaseSummary {
    PhaseSummary {
        name: record.name.clone(),
        mode: record.mode,
        outcome: record.outcome.clone(),
        attempts: record.attempts,
        max_attempts: record.max_attempts,
        waits: record.waits,
        interval_secs: record.interval_secs,
        pending: record.last_pending.clone(),
        warnings: record.warnings.clone(),
        last_error: record.last_error.clone(),
    }
}

/// Nothing is rolled back automatically. When a run stops early, every state
/// left behind by a confirmed phase and not undone by a later confirmed phase
/// is listed, then the failing phase's own note. Failed best-effort phases are
/// listed even on a passing run.
fn manual_actions(run: &WorkflowRun, verdict: Verdict) -> Vec<String> {
    let mut actions = Vec::new();

    if !verdict.is_pass() {
        let mut left_behind: Vec<(&str, &str)> = Vec::new();
        for record in run.records.iter().filter(|r| r.outcome.is_success()) {
            left_behind.retain(|(name, _)| !record.clears.iter().any(|c| c.as_str() == *name));
            if let Some(leaves) = &record.leaves {
                left_behind.push((record.name.as_str(), leaves.as_str()));
            }
        }
        actions.extend(
            left_behind
                .into_iter()
                .map(|(name, leaves)| format!("{name}: {leaves}")),
        );

        if let Some(record) = run.failing_record() {
            if let Some(note) = &record.on_failure {
                actions.push(format!("{}: {}", record.name, note));
            }
        }
    }

    for record in run
        .records
        .iter()
        .filter(|r| r.mode == PhaseMode::BestEffort && !r.outcome.is_success())
    {
        if let Some(note) = &record.on_failure {
            actions.push(format!("{} (best effort): {}", record.name, note));
        }
    }

    actions
}
