//! Retrieval errors raised by the chain layer.

use alloy::primitives::B256;
use thiserror::Error;

/// Failure of an RPC interaction or of decoding what it returned.
///
/// None of these are retried here. Callers abort the current poll cycle and
/// pick the same range up again on the next one.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC transport or node error
    #[error("rpc call {method} failed: {message}")]
    Rpc {
        method: &'static str,
        message: String,
    },

    /// A log matched a known signature but its payload did not decode
    #[error("failed to decode {event} log in tx {tx_hash}: {message}")]
    Decode {
        event: &'static str,
        tx_hash: B256,
        message: String,
    },

    /// A mined log came back without a field we rely on
    #[error("log is missing {0}")]
    MissingField(&'static str),

    /// Block header could not be found
    #[error("block {0} not found")]
    BlockNotFound(u64),

    #[error("invalid rpc url '{0}'")]
    InvalidUrl(String),
}

impl ChainError {
    pub(crate) fn rpc(method: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Rpc {
            method,
            message: err.to_string(),
        }
    }
}
