//! Block number to block time lookup with a retained window.

use std::collections::{BTreeMap, BTreeSet};

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use crate::error::ChainError;
use crate::events::RawEvent;
use crate::provider::ChainClient;

/// Remembers block timestamps so each block is fetched at most once while it
/// stays above the trim floor.
#[derive(Debug, Clone)]
pub struct BlockTimestampCache {
    entries: BTreeMap<u64, u64>,
    concurrency: usize,
}

impl Default for BlockTimestampCache {
    fn default() -> Self {
        Self::new(8)
    }
}

impl BlockTimestampCache {
    pub fn new(concurrency: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn get(&self, block: u64) -> Option<u64> {
        self.entries.get(&block).copied()
    }

    pub fn insert(&mut self, block: u64, timestamp: u64) {
        self.entries.insert(block, timestamp);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stamp every event with its block time.
    ///
    /// Missing blocks are fetched first; if any fetch fails nothing is stamped
    /// and nothing is cached.
    pub async fn attach<C: ChainClient + ?Sized>(
        &mut self,
        client: &C,
        events: &mut [RawEvent],
    ) -> Result<(), ChainError> {
        let missing: BTreeSet<u64> = events
            .iter()
            .map(|e| e.block_number)
            .filter(|block| !self.entries.contains_key(block))
            .collect();

        if !missing.is_empty() {
            let fetched: Vec<(u64, u64)> = stream::iter(missing)
                .map(|block| async move {
                    client
                        .block_timestamp(block)
                        .await
                        .map(|timestamp| (block, timestamp))
                })
                .buffer_unordered(self.concurrency)
                .try_collect()
                .await?;

            debug!(fetched = fetched.len(), cached = self.entries.len(), "Block timestamps fetched");
            self.entries.extend(fetched);
        }

        for event in events.iter_mut() {
            event.timestamp = self.entries.get(&event.block_number).copied();
        }
        Ok(())
    }

    /// Single block lookup through the cache.
    pub async fn timestamp_of<C: ChainClient + ?Sized>(
        &mut self,
        client: &C,
        block: u64,
    ) -> Result<u64, ChainError> {
        if let Some(timestamp) = self.get(block) {
            return Ok(timestamp);
        }
        let timestamp = client.block_timestamp(block).await?;
        self.entries.insert(block, timestamp);
        Ok(timestamp)
    }

    /// Evict entries below `floor`.
    pub fn trim(&mut self, floor: u64) {
        self.entries = self.entries.split_off(&floor);
    }
}
