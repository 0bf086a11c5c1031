//! External tool abstractions
//! 
//! This module provides trait-based abstractions for the local processes the
//! runner spawns (`ssh`, `ping`) and for the remote command channel built on
//! top of them, enabling testable code through dependency injection and mock
//! implementations.

pub mod command;
pub mod ssh;

pub use command::{CommandError, CommandExecutor, CommandOutput, ProcessCommandExecutor};
pub use ssh::{Endpoint, HopStyle, RemoteChannel, SshChannel, SshOptions, SSH_TRANSPORT_EXIT};

#[cfg(test)]
pub use ssh::MockRemoteChannel;
