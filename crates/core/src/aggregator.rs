//! Daily flow statistics.

use std::collections::BTreeMap;

use alloy::primitives::{Address, B256, I256, U256};
use monitor_chain::{
    BatchOperationKind, DepositOperationKind, ProtocolEvent, RawEvent, TroveOperationKind,
};
use tracing::warn;

use crate::state::PollState;
use crate::u256_math::to_signed;

/// Stability pool flow of one asset.
///
/// Each transaction contributes its net movement to exactly one side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolFlow {
    pub deposits: U256,
    pub withdrawals: U256,
}

impl PoolFlow {
    pub fn net(&self) -> I256 {
        to_signed(self.deposits) - to_signed(self.withdrawals)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationCounts {
    pub opened: u64,
    pub adjusted: u64,
    pub closed: u64,
    pub rate_adjusted: u64,
    pub batch_rate_adjusted: u64,
    pub batch_fee_lowered: u64,
}

/// Aggregates over one daily window `[from_block, to_block]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyStats {
    pub from_block: u64,
    pub to_block: u64,
    pub minted: U256,
    pub burned: U256,
    pub net_minted: I256,
    pub repaid: U256,
    pub redeemed: U256,
    pub liquidated: U256,
    pub stability_pool: BTreeMap<String, PoolFlow>,
    pub counts: OperationCounts,
    /// Wrapped-token exchange rates at `to_block`
    pub exchange_rates: BTreeMap<String, U256>,
}

impl DailyStats {
    /// Sum of every asset's net stability pool flow.
    pub fn net_stability_pool(&self) -> I256 {
        self.stability_pool
            .values()
            .fold(I256::ZERO, |acc, flow| acc + flow.net())
    }

    /// Store this window's totals as the baseline for the next summary.
    pub fn fold_into(&self, state: &mut PollState) {
        state.last_daily_block = self.to_block;
        state.last_net_minted = self.net_minted;
        state.last_net_stability_pool_by_asset = self
            .stability_pool
            .iter()
            .map(|(label, flow)| (label.clone(), flow.net()))
            .collect();
        state
            .last_exchange_rate_snapshot
            .extend(self.exchange_rates.iter().map(|(k, v)| (k.clone(), *v)));
    }
}

/// Accumulates daily statistics from fetched events.
#[derive(Debug, Default)]
pub struct DailyAggregator {
    stats: DailyStats,
}

impl DailyAggregator {
    pub fn new(from_block: u64, to_block: u64) -> Self {
        Self {
            stats: DailyStats {
                from_block,
                to_block,
                ..Default::default()
            },
        }
    }

    /// BOLD token `Transfer`s: mints come from and burns go to the zero
    /// address.
    pub fn add_token_events(&mut self, events: &[RawEvent]) {
        for event in events {
            if let ProtocolEvent::Transfer(transfer) = &event.event {
                if transfer.from == Address::ZERO {
                    self.stats.minted += transfer.value;
                }
                if transfer.to == Address::ZERO {
                    self.stats.burned += transfer.value;
                }
            }
        }
    }

    /// Trove manager events of any asset.
    pub fn add_trove_events(&mut self, events: &[RawEvent]) {
        let stats = &mut self.stats;
        let mut closes_per_tx: BTreeMap<B256, u64> = BTreeMap::new();

        for event in events {
            match &event.event {
                ProtocolEvent::TroveOperation(op) => {
                    match op.operation {
                        TroveOperationKind::OpenTrove => stats.counts.opened += 1,
                        TroveOperationKind::AdjustTrove => stats.counts.adjusted += 1,
                        TroveOperationKind::CloseTrove => {
                            stats.counts.closed += 1;
                            *closes_per_tx.entry(event.transaction_hash).or_default() += 1;
                        }
                        TroveOperationKind::AdjustTroveInterestRate => {
                            stats.counts.rate_adjusted += 1
                        }
                        _ => {}
                    }
                    if matches!(
                        op.operation,
                        TroveOperationKind::AdjustTrove | TroveOperationKind::CloseTrove
                    ) && op.debt_change_from_operation.is_negative()
                    {
                        stats.repaid += op.debt_change_from_operation.unsigned_abs();
                    }
                }
                ProtocolEvent::Redemption(r) => stats.redeemed += r.actual_bold_amount,
                ProtocolEvent::Liquidation(l) => stats.liquidated += l.liquidated_debt(),
                ProtocolEvent::BatchUpdated(batch) => match batch.operation {
                    BatchOperationKind::SetBatchManagerAnnualInterestRate => {
                        stats.counts.batch_rate_adjusted += 1
                    }
                    BatchOperationKind::LowerBatchManagerAnnualFee => {
                        stats.counts.batch_fee_lowered += 1
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        for (tx, closes) in closes_per_tx {
            if closes > 1 {
                warn!(tx = %tx, closes, "Several troves closed in one transaction, each counted");
            }
        }
    }

    /// One asset's stability pool events.
    pub fn add_pool_events(&mut self, asset: &str, events: &[RawEvent]) {
        let mut net_per_tx: Vec<(B256, I256)> = Vec::new();
        for event in events {
            let ProtocolEvent::DepositOperation(op) = &event.event else {
                continue;
            };
            if !matches!(
                op.operation,
                DepositOperationKind::ProvideToSp | DepositOperationKind::WithdrawFromSp
            ) {
                continue;
            }
            match net_per_tx
                .iter_mut()
                .find(|(tx, _)| *tx == event.transaction_hash)
            {
                Some((_, net)) => *net += op.top_up_or_withdrawal,
                None => net_per_tx.push((event.transaction_hash, op.top_up_or_withdrawal)),
            }
        }

        let flow = self.stats.stability_pool.entry(asset.to_string()).or_default();
        for (_, net) in net_per_tx {
            if net.is_positive() {
                flow.deposits += net.unsigned_abs();
            } else if net.is_negative() {
                flow.withdrawals += net.unsigned_abs();
            }
        }
    }

    pub fn set_exchange_rate(&mut self, asset: &str, rate: U256) {
        self.stats.exchange_rates.insert(asset.to_string(), rate);
    }

    pub fn finish(mut self) -> DailyStats {
        self.stats.net_minted = to_signed(self.stats.minted) - to_signed(self.stats.burned);
        self.stats
    }
}
