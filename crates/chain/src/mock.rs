//! In-memory [`ChainClient`] for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};

use crate::error::ChainError;
use crate::events::RawEvent;
use crate::provider::{ChainClient, LogQuery};

/// Seconds per block used to derive timestamps.
pub const BLOCK_TIME: u64 = 12;
/// Timestamp of block zero.
pub const GENESIS_TIME: u64 = 1_600_000_000;

#[derive(Debug, Default)]
struct State {
    events: Vec<RawEvent>,
    head: u64,
    exchange_rates: HashMap<Address, U256>,
    aggregators: HashMap<Address, Address>,
    failing_log_blocks: HashSet<u64>,
    failing_timestamps: HashSet<u64>,
    fail_head: bool,
}

/// Chain double backed by a list of already decoded events.
///
/// Block `n` has timestamp `GENESIS_TIME + n * BLOCK_TIME`.
#[derive(Debug, Default)]
pub struct MockChainClient {
    state: Mutex<State>,
    max_log_range: Option<u64>,
    log_calls: AtomicUsize,
    timestamp_calls: AtomicUsize,
    exchange_rate_calls: AtomicUsize,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject log queries spanning more than `blocks` blocks.
    pub fn with_max_log_range(mut self, blocks: u64) -> Self {
        self.max_log_range = Some(blocks);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock()
    }

    /// The event's timestamp is dropped; it is derived from the block.
    pub fn push_event(&self, mut event: RawEvent) {
        event.timestamp = None;
        self.state().events.push(event);
    }

    pub fn set_head(&self, head: u64) {
        self.state().head = head;
    }

    pub fn set_exchange_rate(&self, contract: Address, rate: U256) {
        self.state().exchange_rates.insert(contract, rate);
    }

    pub fn set_aggregator(&self, proxy: Address, aggregator: Address) {
        self.state().aggregators.insert(proxy, aggregator);
    }

    /// Fail any log query whose range contains `block`.
    pub fn fail_logs_at(&self, block: u64) {
        self.state().failing_log_blocks.insert(block);
    }

    pub fn fail_timestamp(&self, block: u64) {
        self.state().failing_timestamps.insert(block);
    }

    pub fn fail_head(&self, fail: bool) {
        self.state().fail_head = fail;
    }

    /// Remove all injected failures.
    pub fn heal(&self) {
        let mut state = self.state();
        state.failing_log_blocks.clear();
        state.failing_timestamps.clear();
        state.fail_head = false;
    }

    pub fn timestamp_for(&self, block: u64) -> u64 {
        GENESIS_TIME + block * BLOCK_TIME
    }

    pub fn log_calls(&self) -> usize {
        self.log_calls.load(Ordering::Relaxed)
    }

    pub fn timestamp_calls(&self) -> usize {
        self.timestamp_calls.load(Ordering::Relaxed)
    }

    pub fn exchange_rate_calls(&self) -> usize {
        self.exchange_rate_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_logs(&self, query: LogQuery) -> Result<Vec<RawEvent>, ChainError> {
        self.log_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(max) = self.max_log_range {
            let span = query.to_block.saturating_sub(query.from_block) + 1;
            if span > max {
                return Err(ChainError::rpc(
                    "eth_getLogs",
                    format!("range of {span} blocks exceeds limit of {max}"),
                ));
            }
        }

        let state = self.state();
        let range = query.from_block..=query.to_block;
        if state.failing_log_blocks.iter().any(|b| range.contains(b)) {
            return Err(ChainError::rpc("eth_getLogs", "injected failure"));
        }

        Ok(state
            .events
            .iter()
            .filter(|e| e.contract == query.address)
            .filter(|e| range.contains(&e.block_number))
            .filter(|e| query.kinds.contains(&e.kind()))
            .cloned()
            .collect())
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64, ChainError> {
        self.timestamp_calls.fetch_add(1, Ordering::Relaxed);
        if self.state().failing_timestamps.contains(&block) {
            return Err(ChainError::rpc("eth_getBlockByNumber", "injected failure"));
        }
        Ok(self.timestamp_for(block))
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let state = self.state();
        if state.fail_head {
            return Err(ChainError::rpc("eth_blockNumber", "injected failure"));
        }
        Ok(state.head)
    }

    async fn exchange_rate(&self, contract: Address, _block: u64) -> Result<U256, ChainError> {
        self.exchange_rate_calls.fetch_add(1, Ordering::Relaxed);
        self.state()
            .exchange_rates
            .get(&contract)
            .copied()
            .ok_or_else(|| ChainError::rpc("stEthPerToken", format!("no rate for {contract}")))
    }

    async fn feed_aggregator(&self, proxy: Address) -> Result<Address, ChainError> {
        Ok(self.state().aggregators.get(&proxy).copied().unwrap_or(proxy))
    }
}
