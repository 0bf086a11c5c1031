//! Probe contract
//!
//! A probe performs exactly one external check and reports what it saw. It never
//! retries on its own; retrying is the job of [`RetryPolicy`](super::policy::RetryPolicy).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a single probe call observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeResult {
    /// Boolean condition (host up, SSH login works, subsystem ready)
    Flag(bool),
    /// Outstanding units of work. Zero means drained. `items` are volume
    /// identifiers kept for reporting only.
    Pending { count: u64, items: Vec<String> },
}

impl ProbeResult {
    pub fn drained() -> Self {
        ProbeResult::Pending {
            count: 0,
            items: Vec::new(),
        }
    }

    pub fn pending<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<String> = items.into_iter().map(Into::into).collect();
        ProbeResult::Pending {
            count: items.len() as u64,
            items,
        }
    }

    /// Whether the awaited condition holds
    pub fn is_satisfied(&self) -> bool {
        match self {
            ProbeResult::Flag(value) => *value,
            ProbeResult::Pending { count, .. } => *count == 0,
        }
    }
}

impl std::fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeResult::Flag(true) => write!(f, "ready"),
            ProbeResult::Flag(false) => write!(f, "not ready"),
            ProbeResult::Pending { count: 0, .. } => write!(f, "drained"),
            ProbeResult::Pending { count, items } if items.is_empty() => {
                write!(f, "{count} outstanding")
            }
            ProbeResult::Pending { count, items } => {
                write!(f, "{count} outstanding ({})", items.join(", "))
            }
        }
    }
}

/// A probe that could not produce an answer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The remote interaction itself failed (SSH down, command could not start)
    #[error("transport failure: {0}")]
    Transport(String),
    /// The check ran but its output did not match any known shape
    #[error("unrecognized probe output: {0}")]
    UnrecognizedOutput(String),
    /// The probe was wired in a way it cannot honour
    #[error("unsupported probe use: {0}")]
    Unsupported(String),
}

impl ProbeError {
    /// Retryable errors are absorbed by the retry policy as a consumed attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProbeError::Transport(_) | ProbeError::UnrecognizedOutput(_)
        )
    }
}

/// A single external check
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self) -> Result<ProbeResult, ProbeError>;

    /// Short human description used in logs and plan listings
    fn describe(&self) -> String;
}
