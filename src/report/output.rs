use anyhow::Result;
use clap::ValueEnum;
use std::fmt::Write as _;

use super::summary::{PhaseSummary, Summary, Verdict};
use crate::poller::{PhaseMode, PollOutcome};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Output and rendering for run summaries
pub struct SummaryOutput {
    format: ReportFormat,
    verbose: bool,
}

impl SummaryOutput {
    pub fn new(format: ReportFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn render(&self, summary: &Summary) -> Result<String> {
        match self.format {
            ReportFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
            ReportFormat::Text => Ok(self.render_text(summary)?),
        }
    }

    pub fn emit(&self, summary: &Summary) -> Result<()> {
        println!("{}", self.render(summary)?);
        Ok(())
    }

    fn render_text(&self, summary: &Summary) -> std::result::Result<String, std::fmt::Error> {
        let mut out = String::new();

        writeln!(out, "💾 FLASHCOPY RUN SUMMARY - {}", summary.plan)?;
        writeln!(out, "==========================================")?;
        writeln!(out, "Run:  {}", summary.run_id)?;
        writeln!(out, "Host: {}", summary.host)?;
        if let Some(finished) = summary.finished_at {
            let elapsed = finished - summary.started_at;
            writeln!(out, "Time: {}s", elapsed.num_seconds())?;
        }
        writeln!(out, "Probes: {}", summary.total_attempts())?;
        writeln!(out)?;

        writeln!(out, "🔍 PHASES:")?;
        writeln!(out, "──────────")?;
        for phase in &summary.phases {
            self.render_phase(&mut out, phase)?;
        }
        if summary.not_started > 0 {
            writeln!(out, "⏭️  {} phase(s) not started", summary.not_started)?;
        }
        writeln!(out)?;

        match summary.verdict {
            Verdict::Passed => writeln!(out, "✅ PASSED: all phases confirmed")?,
            Verdict::PassedWithWarnings => {
                writeln!(out, "⚠️  PASSED WITH WARNINGS: a best-effort phase did not complete")?
            }
            Verdict::Failed | Verdict::Cancelled => {
                let label = if summary.verdict == Verdict::Failed {
                    "❌ FAILED"
                } else {
                    "🛑 CANCELLED"
                };
                writeln!(
                    out,
                    "{label} at phase `{}`: {}",
                    summary.failing_phase.as_deref().unwrap_or("?"),
                    summary.failure_reason.as_deref().unwrap_or("no detail")
                )?;
            }
            Verdict::Incomplete => writeln!(out, "⏳ INCOMPLETE: run did not reach a terminal state")?,
        }

        if !summary.manual_actions.is_empty() {
            writeln!(out)?;
            writeln!(out, "🔧 MANUAL ACTION MAY BE REQUIRED:")?;
            for action in &summary.manual_actions {
                writeln!(out, "   → {action}")?;
            }
        }

        Ok(out.trim_end().to_string())
    }

    fn render_phase(&self, out: &mut String, phase: &PhaseSummary) -> std::fmt::Result {
        let icon = match (&phase.outcome, phase.mode) {
            (PollOutcome::Success, _) => "✅",
            (_, PhaseMode::BestEffort) => "⚠️",
            (PollOutcome::Cancelled, _) => "🛑",
            _ => "❌",
        };

        writeln!(
            out,
            "{icon} {}: {} ({}/{} attempts, {}s interval)",
            phase.name, phase.outcome, phase.attempts, phase.max_attempts, phase.interval_secs
        )?;

        let failed = !phase.outcome.is_success();
        if let Some(pending) = &phase.pending {
            if self.verbose || failed {
                if pending.items.is_empty() {
                    writeln!(out, "   Pending: {}", pending.count)?;
                } else {
                    writeln!(out, "   Pending: {} ({})", pending.count, pending.items.join(", "))?;
                }
            }
        }
        if self.verbose || failed {
            for warning in &phase.warnings {
                writeln!(out, "   Warning: {warning}")?;
            }
        }
        if failed {
            if let Some(error) = &phase.last_error {
                writeln!(out, "   Last error: {error}")?;
            }
        }
        Ok(())
    }
}
