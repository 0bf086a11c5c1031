// flashcopy-runner library
// This exposes the sequencing core and its collaborators for testing and integration

pub mod cli;
pub mod config;
pub mod external;
pub mod lock;
pub mod plan;
pub mod poller;
pub mod probes;
pub mod report;
pub mod shutdown;
pub mod telemetry;

// Re-export key types for easy access
pub use config::{FlashcopyConfig, PhaseConfig, ProbeConfig};
pub use external::{CommandExecutor, CommandOutput, RemoteChannel, SshChannel};
pub use plan::{ConfigError, Plan, PlanBuilder};
pub use poller::{
    Phase, PhaseMode, PhaseRecord, PollOutcome, Probe, ProbeError, ProbeResult, RetryPolicy,
    RunStatus, Sequencer, WorkflowRun,
};
pub use report::{report, ReportFormat, Summary, SummaryOutput, Verdict};
pub use shutdown::ShutdownCoordinator;
pub use telemetry::{init_telemetry, shutdown_telemetry};
