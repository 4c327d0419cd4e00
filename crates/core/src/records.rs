//! Single-event records: liquidations, redemptions and batch manager changes.

use alloy::primitives::{Address, B256, U256};
use monitor_chain::{BatchOperationKind, ProtocolEvent, RawEvent};

use crate::u256_math::{checked_mul_div, WAD};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    pub asset: String,
    pub transaction_hash: B256,
    pub block_number: u64,
    pub log_index: u64,
    pub timestamp: Option<u64>,
}

impl RecordMeta {
    fn from_event(asset: &str, event: &RawEvent) -> Self {
        Self {
            asset: asset.to_string(),
            transaction_hash: event.transaction_hash,
            block_number: event.block_number,
            log_index: event.log_index,
            timestamp: event.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDetail {
    Liquidation {
        /// Debt offset by the stability pool plus debt redistributed
        liquidated_debt: U256,
        price: U256,
    },
    Redemption {
        actual_bold: U256,
        coll_sent: U256,
        coll_fee: U256,
        redemption_price: U256,
        /// `(coll_sent + coll_fee) * redemption_price / actual_bold`
        effective_bold_price: Option<U256>,
        /// `coll_fee * 1e18 / (coll_fee + coll_sent)`
        fee_rate: Option<U256>,
    },
    BatchRateChanged {
        manager: Address,
        annual_interest_rate: U256,
        debt: U256,
    },
    BatchFeeLowered {
        manager: Address,
        annual_management_fee: U256,
        debt: U256,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolRecord {
    pub meta: RecordMeta,
    pub detail: RecordDetail,
}

/// Reporting floors for single-event records. Only amounts strictly above
/// the floor are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordThresholds {
    pub min_redemption: U256,
    pub min_liquidation: U256,
}

/// Extract the single-event records of one asset's trove manager events, in
/// event order.
pub fn extract_records(
    events: &[RawEvent],
    asset: &str,
    thresholds: &RecordThresholds,
) -> Vec<ProtocolRecord> {
    events
        .iter()
        .filter_map(|event| {
            let detail = match &event.event {
                ProtocolEvent::Liquidation(liq) => {
                    let liquidated_debt = liq.liquidated_debt();
                    if liquidated_debt <= thresholds.min_liquidation {
                        return None;
                    }
                    RecordDetail::Liquidation {
                        liquidated_debt,
                        price: liq.price,
                    }
                }
                ProtocolEvent::Redemption(r) => {
                    if r.actual_bold_amount <= thresholds.min_redemption {
                        return None;
                    }
                    let total_coll = r.coll_sent.checked_add(r.coll_fee);
                    RecordDetail::Redemption {
                        actual_bold: r.actual_bold_amount,
                        coll_sent: r.coll_sent,
                        coll_fee: r.coll_fee,
                        redemption_price: r.redemption_price,
                        effective_bold_price: total_coll.and_then(|total| {
                            checked_mul_div(total, r.redemption_price, r.actual_bold_amount)
                        }),
                        fee_rate: total_coll
                            .and_then(|total| checked_mul_div(r.coll_fee, WAD, total)),
                    }
                }
                ProtocolEvent::BatchUpdated(batch) => match batch.operation {
                    BatchOperationKind::SetBatchManagerAnnualInterestRate => {
                        RecordDetail::BatchRateChanged {
                            manager: batch.batch_manager,
                            annual_interest_rate: batch.annual_interest_rate,
                            debt: batch.debt,
                        }
                    }
                    BatchOperationKind::LowerBatchManagerAnnualFee => {
                        RecordDetail::BatchFeeLowered {
                            manager: batch.batch_manager,
                            annual_management_fee: batch.annual_management_fee,
                            debt: batch.debt,
                        }
                    }
                    _ => return None,
                },
                _ => return None,
            };
            Some(ProtocolRecord {
                meta: RecordMeta::from_event(asset, event),
                detail,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_chain::{BatchUpdated, Liquidation, Redemption};

    fn wad(n: u64) -> U256 {
        U256::from(n) * WAD
    }

    fn raw(event: ProtocolEvent, log_index: u64) -> RawEvent {
        RawEvent {
            contract: Address::repeat_byte(0x10),
            event,
            block_number: 100,
            transaction_hash: B256::repeat_byte(1),
            log_index,
            timestamp: Some(1_700_000_000),
        }
    }

    fn redemption(actual: U256, sent: U256, fee: U256) -> ProtocolEvent {
        ProtocolEvent::Redemption(Redemption {
            attempted_bold_amount: actual,
            actual_bold_amount: actual,
            coll_sent: sent,
            coll_fee: fee,
            price: wad(2000),
            redemption_price: wad(2000),
        })
    }

    fn batch(operation: BatchOperationKind) -> ProtocolEvent {
        ProtocolEvent::BatchUpdated(BatchUpdated {
            batch_manager: Address::repeat_byte(0xbb),
            operation,
            debt: wad(10_000),
            coll: wad(10),
            annual_interest_rate: wad(5) / U256::from(100u64),
            annual_management_fee: wad(1) / U256::from(1000u64),
        })
    }

    #[test]
    fn test_redemption_enrichment() {
        // 1000 BOLD for 0.495 + 0.005 coll at $2000 -> effective $1.00, fee 1%
        let sent = wad(495) / U256::from(1000u64);
        let fee = wad(5) / U256::from(1000u64);
        let events = vec![raw(redemption(wad(1000), sent, fee), 0)];

        let records = extract_records(&events, "WETH", &RecordThresholds::default());
        assert_eq!(records.len(), 1);
        match &records[0].detail {
            RecordDetail::Redemption {
                effective_bold_price,
                fee_rate,
                ..
            } => {
                assert_eq!(*effective_bold_price, Some(WAD));
                assert_eq!(*fee_rate, Some(WAD / U256::from(100u64)));
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn test_redemption_zero_collateral_is_unavailable() {
        let events = vec![raw(redemption(wad(1), U256::ZERO, U256::ZERO), 0)];
        let records = extract_records(&events, "WETH", &RecordThresholds::default());
        match &records[0].detail {
            RecordDetail::Redemption {
                effective_bold_price,
                fee_rate,
                ..
            } => {
                assert_eq!(*effective_bold_price, Some(U256::ZERO));
                assert_eq!(*fee_rate, None);
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn test_thresholds_are_strict() {
        let thresholds = RecordThresholds {
            min_redemption: wad(50_000),
            min_liquidation: wad(50_000),
        };
        let liquidation = |offset: u64, redist: u64| {
            ProtocolEvent::Liquidation(Liquidation {
                debt_offset_by_sp: wad(offset),
                debt_redistributed: wad(redist),
                bold_gas_compensation: U256::ZERO,
                coll_gas_compensation: U256::ZERO,
                coll_sent_to_sp: U256::ZERO,
                coll_redistributed: U256::ZERO,
                coll_surplus: U256::ZERO,
                price: wad(2000),
            })
        };
        let events = vec![
            raw(redemption(wad(50_000), wad(25), U256::ZERO), 0),
            raw(redemption(wad(50_001), wad(25), U256::ZERO), 1),
            raw(liquidation(30_000, 20_000), 2),
            raw(liquidation(30_000, 20_001), 3),
        ];
        let records = extract_records(&events, "WETH", &thresholds);
        let indices: Vec<u64> = records.iter().map(|r| r.meta.log_index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(
            records[1].detail,
            RecordDetail::Liquidation {
                liquidated_debt: wad(50_001),
                price: wad(2000)
            }
        );
    }

    #[test]
    fn test_batch_changes() {
        let events = vec![
            raw(batch(BatchOperationKind::SetBatchManagerAnnualInterestRate), 0),
            raw(batch(BatchOperationKind::LowerBatchManagerAnnualFee), 1),
            raw(batch(BatchOperationKind::JoinBatch), 2),
        ];
        let records = extract_records(&events, "RETH", &RecordThresholds::default());
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0].detail, RecordDetail::BatchRateChanged { .. }));
        assert!(matches!(records[1].detail, RecordDetail::BatchFeeLowered { .. }));
        assert_eq!(records[1].meta.asset, "RETH");
    }
}
