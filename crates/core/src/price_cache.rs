//! Per-asset oracle price history.
//!
//! Each tracked asset keeps the `AnswerUpdated` samples of its feed for a
//! sliding block range `[floor, ceiling]`. A cycle either extends the cache
//! with the blocks it has not seen yet or, when the cached range no longer
//! overlaps the requested one, replaces it with a full refill.

use std::collections::HashMap;

use alloy::primitives::{I256, U256};
use monitor_chain::{ChainClient, ChainError, ChunkedLogFetcher, EventKind, ProtocolEvent, RawEvent};
use tracing::{debug, info, instrument};

use crate::assets::{AssetRegistry, TrackedAsset};

/// One oracle observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSample {
    pub block_number: u64,
    /// Feed `updatedAt`
    pub timestamp: u64,
    /// Raw answer in the feed's native decimals
    pub answer: I256,
    pub round_id: U256,
}

impl PriceSample {
    pub fn from_event(event: &RawEvent) -> Option<Self> {
        match &event.event {
            ProtocolEvent::AnswerUpdated(update) => Some(Self {
                block_number: event.block_number,
                timestamp: update.updated_at,
                answer: update.answer,
                round_id: update.round_id,
            }),
            _ => None,
        }
    }

    /// The answer when strictly positive.
    pub fn positive_answer(&self) -> Option<U256> {
        if self.answer.is_positive() {
            Some(self.answer.into_raw())
        } else {
            None
        }
    }
}

/// Block-sorted samples with at most one sample per block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceCache {
    samples: Vec<PriceSample>,
    floor: u64,
}

impl PriceCache {
    /// Build from samples in emission order; for a block with several
    /// updates the last one wins.
    pub fn from_samples(samples: Vec<PriceSample>, floor: u64) -> Self {
        let mut cache = Self {
            samples: Vec::with_capacity(samples.len()),
            floor,
        };
        cache.append(samples);
        cache.trim(floor);
        cache
    }

    pub fn samples(&self) -> &[PriceSample] {
        &self.samples
    }

    pub fn floor(&self) -> u64 {
        self.floor
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn newest(&self) -> Option<&PriceSample> {
        self.samples.last()
    }

    /// Latest sample strictly before `block`.
    pub fn nearest_prior(&self, block: u64) -> Option<&PriceSample> {
        let idx = self.samples.partition_point(|s| s.block_number < block);
        idx.checked_sub(1).map(|i| &self.samples[i])
    }

    /// Drop samples below `floor`.
    pub fn trim(&mut self, floor: u64) {
        let idx = self.samples.partition_point(|s| s.block_number < floor);
        self.samples.drain(..idx);
        self.floor = self.floor.max(floor);
    }

    /// Append samples given in emission order. Samples at or before an
    /// already cached block replace the cached sample for that block;
    /// older ones are ignored.
    fn append(&mut self, samples: Vec<PriceSample>) {
        for sample in samples {
            match self.samples.last_mut() {
                Some(last) if last.block_number == sample.block_number => *last = sample,
                Some(last) if last.block_number > sample.block_number => {}
                _ => self.samples.push(sample),
            }
        }
    }
}

/// What a refresh did to one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Cache replaced by samples over the whole range
    Refilled { samples: usize },
    /// Samples after the previous newest appended
    Extended { added: usize },
    /// Cache already covers the range up to its ceiling
    Unchanged,
}

/// Owns one [`PriceCache`] per tracked asset.
#[derive(Debug, Clone, Default)]
pub struct PriceCacheManager {
    caches: HashMap<String, PriceCache>,
    fetcher: ChunkedLogFetcher,
}

impl PriceCacheManager {
    pub fn new(fetcher: ChunkedLogFetcher) -> Self {
        Self {
            caches: HashMap::new(),
            fetcher,
        }
    }

    /// Seed a cache, replacing any existing one.
    pub fn insert(&mut self, label: impl Into<String>, cache: PriceCache) {
        self.caches.insert(label.into(), cache);
    }

    pub fn cache(&self, label: &str) -> Option<&PriceCache> {
        self.caches.get(label)
    }

    pub fn nearest_prior(&self, label: &str, block: u64) -> Option<&PriceSample> {
        self.caches.get(label)?.nearest_prior(block)
    }

    async fn fetch_samples<C: ChainClient + ?Sized>(
        &self,
        client: &C,
        asset: &TrackedAsset,
        from: u64,
        to: u64,
    ) -> Result<Vec<PriceSample>, ChainError> {
        let events = self
            .fetcher
            .fetch(client, asset.price_feed, EventKind::PRICE_FEED, from, to)
            .await?;
        Ok(events.iter().filter_map(PriceSample::from_event).collect())
    }

    /// Bring the asset's cache to cover `[floor, ceiling]`.
    ///
    /// On error the existing cache is left exactly as it was.
    #[instrument(skip(self, client, asset), fields(asset = %asset.label))]
    pub async fn refresh<C: ChainClient + ?Sized>(
        &mut self,
        client: &C,
        asset: &TrackedAsset,
        floor: u64,
        ceiling: u64,
    ) -> Result<RefreshOutcome, ChainError> {
        let newest = self
            .caches
            .get(&asset.label)
            .filter(|cache| cache.floor() <= floor)
            .and_then(|cache| cache.newest())
            .map(|sample| sample.block_number)
            .filter(|newest| (floor..=ceiling).contains(newest));

        match newest {
            Some(newest) if newest == ceiling => {
                if let Some(cache) = self.caches.get_mut(&asset.label) {
                    cache.trim(floor);
                }
                Ok(RefreshOutcome::Unchanged)
            }
            Some(newest) => {
                let fresh = self
                    .fetch_samples(client, asset, newest + 1, ceiling)
                    .await?;
                let added = fresh.len();
                let cache = self.caches.entry(asset.label.clone()).or_default();
                cache.append(fresh);
                cache.trim(floor);
                debug!(added, cached = cache.len(), floor, ceiling, "Price cache extended");
                Ok(RefreshOutcome::Extended { added })
            }
            None => {
                let fresh = self.fetch_samples(client, asset, floor, ceiling).await?;
                let cache = PriceCache::from_samples(fresh, floor);
                let samples = cache.len();
                self.caches.insert(asset.label.clone(), cache);
                info!(samples, floor, ceiling, "Price cache refilled");
                Ok(RefreshOutcome::Refilled { samples })
            }
        }
    }

    /// Refresh every asset for an event window `[from, to]`, each over its
    /// own horizon.
    pub async fn refresh_all<C: ChainClient + ?Sized>(
        &mut self,
        client: &C,
        registry: &AssetRegistry,
        from: u64,
        to: u64,
    ) -> Result<(), ChainError> {
        for asset in registry.iter() {
            self.refresh(client, asset, from.saturating_sub(asset.horizon_blocks), to)
                .await?;
        }
        Ok(())
    }
}
