use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::report::ReportFormat;

pub mod commands;

#[derive(Parser)]
#[command(name = "flashcopy-runner")]
#[command(about = "Sequence and poll an IBM i FlashCopy backup workflow")]
#[command(long_about = "flashcopy-runner drives a FlashCopy backup as an ordered list of phases. \
                       Each phase may issue one remote command over double-hop SSH, then polls a \
                       probe at a fixed interval until the remote side confirms the step or the \
                       attempt budget runs out.")]
pub struct Cli {
    /// Configuration file (defaults to ./flashcopy-runner.toml)
    #[arg(long, short = 'c', global = true, help = "Path to the plan/configuration TOML file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute every phase of the plan in order
    Run {
        /// Summary output format
        #[arg(long, value_enum, default_value = "text", help = "Summary format: text or json")]
        format: ReportFormat,
        /// Show the plan without contacting any host
        #[arg(long, help = "Print the phases that would run and exit")]
        dry_run: bool,
        /// Show pending items and warnings for successful phases too
        #[arg(long, short = 'v', help = "Include detail for every phase in the summary")]
        verbose: bool,
    },
    /// Load and validate the plan, then list its phases
    Validate,
    /// Run a single probe of a named phase exactly once
    Probe {
        /// Phase whose probe should be invoked
        phase: String,
    },
}
