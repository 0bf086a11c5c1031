use anyhow::Result;
use tokio_util::sync::CancellationToken;

use super::{exit_code, print_plan, Command};
use crate::config::FlashcopyConfig;
use crate::lock::RunLock;
use crate::plan::PlanBuilder;
use crate::poller::{RunStatus, Sequencer, WorkflowRun};
use crate::report::{report, ReportFormat, SummaryOutput};

pub struct RunCommand {
    config: FlashcopyConfig,
    format: ReportFormat,
    dry_run: bool,
    verbose: bool,
    cancel: CancellationToken,
}

impl RunCommand {
    pub fn new(config: FlashcopyConfig) -> Self {
        Self {
            config,
            format: ReportFormat::Text,
            dry_run: false,
            verbose: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Command for RunCommand {
    async fn execute(&self) -> Result<i32> {
        let plan = PlanBuilder::new(&self.config).build()?;

        if self.dry_run {
            print_plan(&plan.name, &plan.phases);
            println!();
            println!("🧪 Dry run - no host was contacted");
            return Ok(exit_code::SUCCESS);
        }

        let _lock = match RunLock::acquire(&self.config.run.lock_file) {
            Ok(lock) => lock,
            Err(e) => {
                eprintln!("🔒 {e}");
                return Ok(exit_code::LOCKED);
            }
        };

        let sequencer = Sequencer::new(plan.name, plan.phases).with_cancellation(self.cancel.clone());
        let run = sequencer.run().await;

        SummaryOutput::new(self.format, self.verbose).emit(&report(&run))?;
        Ok(exit_code_for_run(&run))
    }
}

pub fn exit_code_for_run(run: &WorkflowRun) -> i32 {
    match &run.status {
        RunStatus::AllPhasesSucceeded | RunStatus::SucceededWithWarnings => exit_code::SUCCESS,
        RunStatus::Cancelled { .. } => exit_code::CANCELLED,
        RunStatus::FailedAtPhase { .. } => run
            .failing_index()
            .map(exit_code::for_phase)
            .unwrap_or(exit_code::FAILURE),
        RunStatus::InProgress => exit_code::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::{PhaseMode, PhaseRecord, PollOutcome};

    fn record(name: &str, mode: PhaseMode, outcome: PollOutcome) -> PhaseRecord {
        PhaseRecord {
            name: name.into(),
            mode,
            outcome,
            attempts: 1,
            waits: 0,
            max_attempts: 1,
            interval_secs: 1,
            last_pending: None,
            warnings: Vec::new(),
            last_error: None,
            on_failure: None,
            leaves: None,
            clears: Vec::new(),
        }
    }

    #[test]
    fn test_exit_code_names_failing_phase_index() {
        let mut run = WorkflowRun::new("nightly", 3);
        run.record(record("a", PhaseMode::Required, PollOutcome::Success));
        run.record(record("b", PhaseMode::BestEffort, PollOutcome::Timeout));
        run.record(record("c", PhaseMode::Required, PollOutcome::Timeout));
        run.finish(RunStatus::FailedAtPhase {
            name: "c".into(),
            reason: "timed out".into(),
        });

        assert_eq!(exit_code_for_run(&run), 12);
    }

    #[test]
    fn test_exit_code_for_cancel_and_success() {
        let mut run = WorkflowRun::new("nightly", 1);
        run.finish(RunStatus::SucceededWithWarnings);
        assert_eq!(exit_code_for_run(&run), exit_code::SUCCESS);

        let mut run = WorkflowRun::new("nightly", 1);
        run.finish(RunStatus::Cancelled { phase: "a".into() });
        assert_eq!(exit_code_for_run(&run), exit_code::CANCELLED);
    }

    #[tokio::test]
    async fn test_empty_plan_is_config_error() {
        let err = RunCommand::new(FlashcopyConfig::default())
            .execute()
            .await
            .unwrap_err();
        assert_eq!(super::super::exit_code_for_error(&err), exit_code::CONFIG_ERROR);
    }
}
