//! Errors surfaced by a poll cycle.

use monitor_chain::ChainError;
use thiserror::Error;

use crate::state::StateError;

/// Failure of a cycle. The cursor is not advanced for any of these, so the
/// same window is retried on the next cycle.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// RPC failure while fetching logs, timestamps, prices or rates
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] ChainError),

    /// State file could not be read or written
    #[error("state persistence failed: {0}")]
    Persistence(#[from] StateError),

    /// Notification channel rejected a message
    #[error(transparent)]
    Notification(anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}
