// Asynchronous condition poller
//
// Probe -> RetryPolicy -> Sequencer. Everything that waits on remote state
// (reboot cycles, transfer-queue drains, service readiness) goes through here.

pub mod lifecycle;
pub mod phase;
pub mod policy;
pub mod probe;
pub mod run;
pub mod sequencer;

pub use lifecycle::{RunLifecycle, SequencerEvent};
pub use phase::{Phase, PhaseMode, RemoteAction};
pub use policy::{PolicyError, PollReport, RetryPolicy};
pub use probe::{Probe, ProbeError, ProbeResult};
pub use run::{PendingSnapshot, PhaseRecord, PollOutcome, RunStatus, WorkflowRun};
pub use sequencer::Sequencer;
