//! Phase sequencer
//!
//! Runs phases strictly in declared order, one at a time. Phase N+1's action
//! or probe is only issued after phase N's probe confirmed success. A required
//! phase that fails halts the run; nothing already done remotely is undone.

use statig::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use super::lifecycle::{RunLifecycle, SequencerEvent};
use super::phase::{Phase, PhaseMode};
use super::policy::PollReport;
use super::run::{PhaseRecord, PollOutcome, RunStatus, WorkflowRun};

pub struct Sequencer {
    plan: String,
    phases: Vec<Phase>,
    cancel: CancellationToken,
}

impl Sequencer {
    pub fn new(plan: impl Into<String>, phases: Vec<Phase>) -> Self {
        Self {
            plan: plan.into(),
            phases,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token so a signal handler can stop the run
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self) -> WorkflowRun {
        let mut run = WorkflowRun::new(self.plan.clone(), self.phases.len());
        let mut lifecycle = RunLifecycle::new(self.phases.len()).state_machine();

        info!(
            run.id = %run.run_id,
            plan = %self.plan,
            phases = self.phases.len(),
            "Starting workflow run"
        );

        for (index, phase) in self.phases.iter().enumerate() {
            let span = info_span!(
                "phase",
                run.id = %run.run_id,
                phase.name = %phase.name,
                phase.index = index
            );
            let record = self.execute_phase(phase).instrument(span).await;
            let event = event_for(&record);

            run.record(record);
            lifecycle.handle(&event);
            if lifecycle.is_finished() {
                break;
            }
        }

        let status = lifecycle
            .terminal_status()
            .cloned()
            .unwrap_or(RunStatus::AllPhasesSucceeded);
        run.finish(status);

        info!(run.id = %run.run_id, status = ?run.status, "Workflow run finished");
        run
    }

    async fn execute_phase(&self, phase: &Phase) -> PhaseRecord {
        info!(
            probe = %phase.probe.describe(),
            interval_secs = phase.policy.interval().as_secs(),
            max_attempts = phase.policy.max_attempts(),
            "Entering phase"
        );

        if self.cancel.is_cancelled() {
            return record_for(phase, not_polled(PollOutcome::Cancelled));
        }

        if let Some(action) = &phase.action {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return record_for(phase, not_polled(PollOutcome::Cancelled));
                }
                result = action.execute() => result,
            };
            if let Err(detail) = result {
                warn!(detail = %detail, "Phase action failed, probe not started");
                return record_for(phase, not_polled(PollOutcome::ProbeError(detail)));
            }
        }

        let report = phase.policy.poll(phase.probe.as_ref(), &self.cancel).await;
        info!(
            outcome = %report.outcome,
            attempts = report.attempts,
            waits = report.waits,
            "Phase finished"
        );
        record_for(phase, report)
    }
}

fn not_polled(outcome: PollOutcome) -> PollReport {
    PollReport {
        outcome,
        attempts: 0,
        waits: 0,
        last_pending: None,
        warnings: Vec::new(),
        last_error: None,
    }
}

fn record_for(phase: &Phase, report: PollReport) -> PhaseRecord {
    PhaseRecord {
        name: phase.name.clone(),
        mode: phase.mode,
        outcome: report.outcome,
        attempts: report.attempts,
        waits: report.waits,
        max_attempts: phase.policy.max_attempts(),
        interval_secs: phase.policy.interval().as_secs(),
        last_pending: report.last_pending,
        warnings: report.warnings,
        last_error: report.last_error,
        on_failure: phase.on_failure.clone(),
        leaves: phase.leaves.clone(),
        clears: phase.clears.clone(),
    }
}

fn event_for(record: &PhaseRecord) -> SequencerEvent {
    let name = record.name.clone();
    match &record.outcome {
        PollOutcome::Success => SequencerEvent::PhaseSucceeded { name },
        PollOutcome::Cancelled => SequencerEvent::Cancelled { name },
        PollOutcome::Timeout => SequencerEvent::PhaseFailed {
            name,
            reason: match &record.last_error {
                Some(error) => format!(
                    "timed out after {} attempt(s) at {}s intervals, last attempt: {}",
                    record.attempts, record.interval_secs, error
                ),
                None => format!(
                    "timed out after {} attempt(s) at {}s intervals",
                    record.attempts, record.interval_secs
                ),
            },
            best_effort: record.mode == PhaseMode::BestEffort,
        },
        PollOutcome::ProbeError(detail) => SequencerEvent::PhaseFailed {
            name,
            reason: detail.clone(),
            best_effort: record.mode == PhaseMode::BestEffort,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{CommandError, CommandOutput, MockRemoteChannel};
    use crate::poller::phase::RemoteAction;
    use crate::poller::policy::RetryPolicy;
    use crate::poller::probe::{MockProbe, ProbeResult};
    use std::sync::Arc;

    fn probe_returning(result: ProbeResult, times: usize) -> Arc<MockProbe> {
        let mut probe = MockProbe::new();
        probe
            .expect_probe()
            .times(times)
            .returning(move || Ok(result.clone()));
        probe.expect_describe().return_const("mock".to_string());
        Arc::new(probe)
    }

    fn policy(interval_secs: u64, attempts: u32) -> RetryPolicy {
        RetryPolicy::from_secs(interval_secs, attempts).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_phases_run_in_order_until_done() {
        let phases = vec![
            Phase::new("online", probe_returning(ProbeResult::Flag(true), 1), policy(30, 15)),
            Phase::new("drain", probe_returning(ProbeResult::drained(), 1), policy(300, 72)),
        ];

        let run = Sequencer::new("nightly", phases).run().await;

        assert_eq!(run.status, RunStatus::AllPhasesSucceeded);
        let names: Vec<_> = run.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["online", "drain"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_required_timeout_skips_later_phases() {
        let phases = vec![
            Phase::new("reachable", probe_returning(ProbeResult::Flag(false), 2), policy(1, 2)),
            Phase::new("never", probe_returning(ProbeResult::Flag(true), 0), policy(1, 2)),
        ];

        let run = Sequencer::new("nightly", phases).run().await;

        assert!(matches!(run.status, RunStatus::FailedAtPhase { ref name, .. } if name == "reachable"));
        assert_eq!(run.records.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_best_effort_failure_continues() {
        let phases = vec![
            Phase::new("remove-history", probe_returning(ProbeResult::Flag(false), 1), policy(5, 1))
                .with_mode(PhaseMode::BestEffort),
            Phase::new("exit-backup-mode", probe_returning(ProbeResult::Flag(true), 1), policy(5, 3)),
        ];

        let run = Sequencer::new("nightly", phases).run().await;

        assert_eq!(run.status, RunStatus::SucceededWithWarnings);
        assert_eq!(run.records[0].outcome, PollOutcome::Timeout);
        assert_eq!(run.records[1].outcome, PollOutcome::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_action_skips_probe() {
        let mut channel = MockRemoteChannel::new();
        channel.expect_run().times(1).returning(|_| {
            Ok(CommandOutput {
                status_code: 1,
                stdout: String::new(),
                stderr: "CPF9801 object not found".to_string(),
            })
        });
        channel.expect_target().return_const("clone".to_string());

        let phases = vec![Phase::new(
            "start-control-group",
            probe_returning(ProbeResult::Flag(true), 0),
            policy(60, 5),
        )
        .with_action(RemoteAction::new("STRBKUBRM CTLGRP(NIGHTLY)", Arc::new(channel)))];

        let run = Sequencer::new("nightly", phases).run().await;

        let record = &run.records[0];
        assert_eq!(record.attempts, 0);
        match &record.outcome {
            PollOutcome::ProbeError(detail) => assert!(detail.contains("CPF9801")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(!run.status.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_transport_error_fails_phase() {
        let mut channel = MockRemoteChannel::new();
        channel.expect_run().returning(|_| {
            Err(CommandError::Timeout { timeout_ms: 30_000 })
        });
        channel.expect_target().return_const("clone".to_string());

        let phases = vec![Phase::new(
            "enter-backup-mode",
            probe_returning(ProbeResult::Flag(true), 0),
            policy(60, 5),
        )
        .with_action(RemoteAction::new("CALL QGPL/BKPMODE", Arc::new(channel)))];

        let run = Sequencer::new("nightly", phases).run().await;

        assert!(matches!(run.status, RunStatus::FailedAtPhase { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_cancelled_run_polls_nothing() {
        let phases = vec![Phase::new(
            "online",
            probe_returning(ProbeResult::Flag(true), 0),
            policy(30, 15),
        )];
        let cancel = CancellationToken::new();
        cancel.cancel();

        let run = Sequencer::new("nightly", phases)
            .with_cancellation(cancel)
            .run()
            .await;

        assert_eq!(run.status, RunStatus::Cancelled { phase: "online".into() });
        assert_eq!(run.records[0].attempts, 0);
    }
}
