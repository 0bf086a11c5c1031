use anyhow::{anyhow, Result};

use super::{exit_code, Command};
use crate::config::FlashcopyConfig;
use crate::plan::PlanBuilder;

/// Invoke one phase's probe exactly once, without its action or retries
pub struct ProbeCommand {
    config: FlashcopyConfig,
    phase: String,
}

impl ProbeCommand {
    pub fn new(config: FlashcopyConfig, phase: impl Into<String>) -> Self {
        Self {
            config,
            phase: phase.into(),
        }
    }
}

impl Command for ProbeCommand {
    async fn execute(&self) -> Result<i32> {
        let probe = PlanBuilder::new(&self.config)
            .build_probe_for(&self.phase)
            .ok_or_else(|| anyhow!("No phase named `{}` in the plan", self.phase))??;

        println!("🔍 {}", probe.describe());
        match probe.probe().await {
            Ok(result) if result.is_satisfied() => {
                println!("✅ {result}");
                Ok(exit_code::SUCCESS)
            }
            Ok(result) => {
                println!("⏳ {result}");
                Ok(exit_code::FAILURE)
            }
            Err(e) => {
                println!("❌ {e}");
                Ok(exit_code::FAILURE)
            }
        }
    }
}
