//! Poll cycle: daily summary, event window, notifications, cursor.

use alloy::primitives::Address;
use monitor_api::Notifier;
use monitor_chain::{
    BlockTimestampCache, ChainClient, ChunkedLogFetcher, EventKind, TroveOperationKind,
};
use tracing::{debug, info, instrument};

use crate::aggregator::{DailyAggregator, DailyStats};
use crate::assets::AssetRegistry;
use crate::config::MonitorConfig;
use crate::correlator::{correlate, LogicalOperation};
use crate::error::MonitorError;
use crate::format;
use crate::ltv::PriceOracle;
use crate::price_cache::PriceCacheManager;
use crate::records::{extract_records, ProtocolRecord, RecordThresholds};
use crate::state::{PollState, StateStore};

/// Operation kinds reported one message per operation.
const NOTIFIED_OPERATIONS: [TroveOperationKind; 4] = [
    TroveOperationKind::OpenTrove,
    TroveOperationKind::CloseTrove,
    TroveOperationKind::AdjustTrove,
    TroveOperationKind::AdjustTroveInterestRate,
];

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub blocks_per_day: u64,
    pub log_chunk_size: u64,
    pub timestamp_concurrency: usize,
    pub timestamp_retain_blocks: u64,
    pub thresholds: RecordThresholds,
    pub bold_token: Address,
}

impl PollerSettings {
    pub fn from_config(config: &MonitorConfig) -> Result<Self, MonitorError> {
        Ok(Self {
            blocks_per_day: config.poll.blocks_per_day,
            log_chunk_size: config.poll.log_chunk_size,
            timestamp_concurrency: config.poll.timestamp_concurrency,
            timestamp_retain_blocks: config.poll.timestamp_retain_blocks,
            thresholds: RecordThresholds {
                min_redemption: config.thresholds.min_redemption()?,
                min_liquidation: config.thresholds.min_liquidation()?,
            },
            bold_token: config.bold_token()?,
        })
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub head: u64,
    /// Event window processed, `None` when already caught up
    pub window: Option<(u64, u64)>,
    pub operations: Vec<LogicalOperation>,
    pub records: Vec<ProtocolRecord>,
    pub daily: Option<DailyStats>,
    pub messages_sent: usize,
}

/// Drives poll cycles. Owns the price and timestamp caches across cycles.
pub struct Poller<C, N, S> {
    chain: C,
    notifier: N,
    store: S,
    registry: AssetRegistry,
    settings: PollerSettings,
    fetcher: ChunkedLogFetcher,
    prices: PriceCacheManager,
    timestamps: BlockTimestampCache,
}

impl<C, N, S> Poller<C, N, S>
where
    C: ChainClient,
    N: Notifier,
    S: StateStore,
{
    pub fn new(
        chain: C,
        notifier: N,
        store: S,
        registry: AssetRegistry,
        settings: PollerSettings,
    ) -> Self {
        let fetcher = ChunkedLogFetcher::new(settings.log_chunk_size);
        Self {
            chain,
            notifier,
            store,
            registry,
            prices: PriceCacheManager::new(fetcher),
            timestamps: BlockTimestampCache::new(settings.timestamp_concurrency),
            fetcher,
            settings,
        }
    }

    pub fn with_price_caches(mut self, prices: PriceCacheManager) -> Self {
        self.prices = prices;
        self
    }

    pub fn with_timestamp_cache(mut self, timestamps: BlockTimestampCache) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn price_caches(&self) -> &PriceCacheManager {
        &self.prices
    }

    pub fn timestamp_cache(&self) -> &BlockTimestampCache {
        &self.timestamps
    }

    /// Run one cycle. On error nothing past the last successful save is
    /// persisted, so the next cycle retries the same window.
    #[instrument(skip(self))]
    pub async fn run_cycle(&mut self) -> Result<CycleReport, MonitorError> {
        let mut state = self.store.load().await?;
        let head = self.chain.block_number().await?;
        let mut report = CycleReport {
            head,
            ..Default::default()
        };

        let blocks_per_day = self.settings.blocks_per_day;
        if head.saturating_sub(state.last_daily_block) > blocks_per_day {
            let stats = self.run_daily(&mut state, head).await?;
            report.messages_sent += 1;
            report.daily = Some(stats);
        }

        let from = state.last_polled_block + 1;
        let to = head.min(state.last_polled_block.saturating_add(blocks_per_day));
        if from > to {
            debug!(head, last_polled = state.last_polled_block, "No new blocks");
            return Ok(report);
        }
        report.window = Some((from, to));

        self.prices
            .refresh_all(&self.chain, &self.registry, from, to)
            .await?;

        let oracle = PriceOracle {
            registry: &self.registry,
            caches: &self.prices,
            exchange_rates: &state.last_exchange_rate_snapshot,
        };

        // Nothing is sent until every asset has been retrieved.
        let mut outbox: Vec<String> = Vec::new();
        for asset in self.registry.iter() {
            let mut events = self
                .fetcher
                .fetch(&self.chain, asset.trove_manager, EventKind::TROVE_MANAGER, from, to)
                .await?;
            self.timestamps.attach(&self.chain, &mut events).await?;

            let mut messages: Vec<((u64, u64), String)> = Vec::new();
            for kind in NOTIFIED_OPERATIONS {
                for op in correlate(&events, &asset.label, kind) {
                    let (debt, coll) = match op.kind {
                        TroveOperationKind::CloseTrove => (op.pre_debt, op.pre_coll),
                        _ => (op.post_debt, op.post_coll),
                    };
                    let ltv = oracle.ltv(asset, debt, coll, op.block_number);
                    messages.push((
                        (op.block_number, op.log_index),
                        format::operation_message(&op, ltv),
                    ));
                    report.operations.push(op);
                }
            }
            for record in extract_records(&events, &asset.label, &self.settings.thresholds) {
                messages.push((
                    (record.meta.block_number, record.meta.log_index),
                    format::record_message(&record),
                ));
                report.records.push(record);
            }
            messages.sort_by_key(|(position, _)| *position);

            debug!(asset = %asset.label, events = events.len(), messages = messages.len(), "Asset processed");
            outbox.extend(messages.into_iter().map(|(_, text)| text));
        }

        for text in &outbox {
            send(&self.notifier, text).await?;
            report.messages_sent += 1;
        }

        state.last_polled_block = to;
        self.store.save(&state).await?;

        let retain = self.settings.timestamp_retain_blocks;
        self.timestamps.trim((to + 1).saturating_sub(retain));

        info!(
            from,
            to,
            operations = report.operations.len(),
            records = report.records.len(),
            messages = report.messages_sent,
            "Cycle complete"
        );
        Ok(report)
    }

    /// Aggregate `[head - blocks_per_day, head]`, send the summary, and fold
    /// its totals into the persisted baseline.
    #[instrument(skip(self, state))]
    async fn run_daily(&mut self, state: &mut PollState, head: u64) -> Result<DailyStats, MonitorError> {
        let from = head.saturating_sub(self.settings.blocks_per_day);
        let mut aggregator = DailyAggregator::new(from, head);

        for asset in self.registry.iter() {
            let trove_events = self
                .fetcher
                .fetch(&self.chain, asset.trove_manager, EventKind::TROVE_MANAGER, from, head)
                .await?;
            aggregator.add_trove_events(&trove_events);

            let pool_events = self
                .fetcher
                .fetch(&self.chain, asset.stability_pool, EventKind::STABILITY_POOL, from, head)
                .await?;
            aggregator.add_pool_events(&asset.label, &pool_events);
        }

        let token_events = self
            .fetcher
            .fetch(&self.chain, self.settings.bold_token, EventKind::BOLD_TOKEN, from, head)
            .await?;
        aggregator.add_token_events(&token_events);

        for (label, provider) in self.registry.rate_providers() {
            let rate = self.chain.exchange_rate(provider, head).await?;
            aggregator.set_exchange_rate(label, rate);
        }

        let stats = aggregator.finish();
        let day_start = self.timestamps.timestamp_of(&self.chain, from).await?;
        send(&self.notifier, &format::daily_message(&stats, state, Some(day_start))).await?;

        stats.fold_into(state);
        self.store.save(state).await?;
        info!(from, to = head, net_minted = %stats.net_minted, "Daily summary sent");
        Ok(stats)
    }
}

async fn send<N: Notifier + ?Sized>(notifier: &N, text: &str) -> Result<(), MonitorError> {
    notifier.send(text).await.map_err(MonitorError::Notification)
}
