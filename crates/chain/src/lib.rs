//! Chain access for the BOLD monitor.
//!
//! This crate provides:
//! - Contract bindings for trove managers, stability pools, the BOLD token
//!   and Chainlink feeds
//! - A typed event model and log decoding
//! - The [`ChainClient`] capability and its alloy HTTP implementation
//! - Range-limited log fetching and a block timestamp cache

pub mod contracts;
mod error;
pub mod events;
mod fetcher;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
mod provider;
mod timestamps;

pub use error::ChainError;
pub use events::{
    AnswerUpdated, BatchOperationKind, BatchUpdated, DepositOperation, DepositOperationKind,
    DepositUpdated, EventKind, Liquidation, ProtocolEvent, RawEvent, Redemption, Transfer,
    TroveOperation, TroveOperationKind, TroveUpdated,
};
pub use fetcher::{ChunkedLogFetcher, DEFAULT_CHUNK_SIZE};
pub use provider::{AlloyChainClient, ChainClient, LogQuery};
pub use timestamps::BlockTimestampCache;
