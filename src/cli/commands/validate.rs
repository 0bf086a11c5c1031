use anyhow::Result;

use super::{exit_code, print_plan, Command};
use crate::config::FlashcopyConfig;
use crate::plan::PlanBuilder;

pub struct ValidateCommand {
    config: FlashcopyConfig,
}

impl ValidateCommand {
    pub fn new(config: FlashcopyConfig) -> Self {
        Self { config }
    }
}

impl Command for ValidateCommand {
    async fn execute(&self) -> Result<i32> {
        println!("🔎 Validating plan...");
        println!();

        let plan = PlanBuilder::new(&self.config).build()?;
        print_plan(&plan.name, &plan.phases);

        let total_budget: u64 = plan.phases.iter().map(|p| p.policy.budget().as_secs()).sum();
        println!();
        println!(
            "✅ Plan is valid. Worst-case waiting across all phases: {}h {}m",
            total_budget / 3600,
            (total_budget % 3600) / 60
        );
        Ok(exit_code::SUCCESS)
    }
}
