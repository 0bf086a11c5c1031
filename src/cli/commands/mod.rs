use anyhow::Result;

use crate::plan::ConfigError;
use crate::poller::Phase;

pub mod probe;
pub mod run;
pub mod validate;

pub use probe::ProbeCommand;
pub use run::RunCommand;
pub use validate::ValidateCommand;

/// Process exit codes
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const LOCKED: i32 = 3;
    /// Phase failures exit with `PHASE_BASE + index`, capped at `PHASE_MAX`
    pub const PHASE_BASE: i32 = 10;
    pub const PHASE_MAX: i32 = 119;
    pub const CANCELLED: i32 = 130;

    pub fn for_phase(index: usize) -> i32 {
        let offset = i32::try_from(index).unwrap_or(i32::MAX);
        PHASE_BASE.saturating_add(offset).min(PHASE_MAX)
    }
}

#[allow(async_fn_in_trait)]
pub trait Command {
    /// Execute and return the process exit code
    async fn execute(&self) -> Result<i32>;
}

/// Map an error escaping a command to an exit code
pub fn exit_code_for_error(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<ConfigError>().is_some() {
        exit_code::CONFIG_ERROR
    } else {
        exit_code::FAILURE
    }
}

pub fn print_plan(name: &str, phases: &[Phase]) {
    println!("📋 Plan `{}` - {} phase(s)", name, phases.len());
    println!();
    for (index, phase) in phases.iter().enumerate() {
        let budget = phase.policy.budget();
        println!(
            "  {:>2}. {} [{}]",
            index + 1,
            phase.name,
            match phase.mode {
                crate::poller::PhaseMode::Required => "required",
                crate::poller::PhaseMode::BestEffort => "best effort",
            }
        );
        if let Some(action) = &phase.action {
            println!("      ▶️  {} on {}", action.command, action.channel.target());
        }
        println!("      🔍 {}", phase.probe.describe());
        println!(
            "      ⏱️  every {}s × {} attempts (up to {}m waiting)",
            phase.policy.interval().as_secs(),
            phase.policy.max_attempts(),
            budget.as_secs() / 60
        );
        if let Some(note) = &phase.leaves {
            println!("      📌 leaves: {note}");
        }
    }
}

pub fn show_how_to_run() -> Result<i32> {
    println!("💾 flashcopy-runner - FlashCopy backup sequencing");
    println!();
    println!("To get started:");
    println!("  ✅ flashcopy-runner validate          # Check the plan in flashcopy-runner.toml");
    println!("  🚀 flashcopy-runner run               # Execute every phase in order");
    println!("  🔍 flashcopy-runner probe <PHASE>     # Invoke one phase's probe once");
    println!();
    println!("💡 Use --config <FILE> to point at a different plan.");
    Ok(exit_code::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_exit_codes_are_distinct_and_capped() {
        assert_eq!(exit_code::for_phase(0), 10);
        assert_eq!(exit_code::for_phase(3), 13);
        assert_eq!(exit_code::for_phase(500), exit_code::PHASE_MAX);
        assert_ne!(exit_code::for_phase(0), exit_code::CONFIG_ERROR);
    }

    #[test]
    fn test_config_errors_map_to_code_two() {
        let error = anyhow::Error::new(ConfigError::EmptyPlan);
        assert_eq!(exit_code_for_error(&error), exit_code::CONFIG_ERROR);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for_error(&other), exit_code::FAILURE);
    }
}
