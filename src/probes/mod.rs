// Probe implementations
//
// Each probe wraps exactly one external interaction: a local ping, a remote
// command over the SSH channel, or a transfer-queue listing.

pub mod drain;
pub mod offline;
pub mod reachability;
pub mod remote;

pub use drain::{DrainDetector, TransferQueueProbe};
pub use offline::OfflineProbe;
pub use reachability::ReachabilityProbe;
pub use remote::RemoteCommandProbe;
