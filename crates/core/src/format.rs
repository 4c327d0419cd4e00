//! Notification text.

use std::fmt::Write;

use alloy::primitives::{I256, U256};
use chrono::DateTime;
use monitor_chain::TroveOperationKind;

use crate::aggregator::DailyStats;
use crate::correlator::LogicalOperation;
use crate::ltv::Ltv;
use crate::records::{ProtocolRecord, RecordDetail};
use crate::state::PollState;
use crate::u256_math::{signed_wad_to_f64, wad_to_f64};

fn with_precision(value: f64) -> String {
    let magnitude = value.abs();
    let text = if magnitude < 1.0 {
        format!("{value:.2}")
    } else if magnitude < 100.0 {
        format!("{value:.1}")
    } else {
        format!("{value:.0}")
    };
    // no sign on values that round to zero
    match text.strip_prefix('-') {
        Some(rest) if rounds_to_zero(rest) => rest.to_string(),
        _ => text,
    }
}

fn rounds_to_zero(text: &str) -> bool {
    text.chars().all(|c| c == '0' || c == '.')
}

/// 18-decimal amount, fewer decimals as it grows.
pub fn amount(value: U256) -> String {
    with_precision(wad_to_f64(value))
}

pub fn signed_amount(value: I256) -> String {
    let text = with_precision(signed_wad_to_f64(value));
    if value.is_positive() && !rounds_to_zero(&text) {
        format!("+{text}")
    } else {
        text
    }
}

/// 18-decimal fraction as a percentage.
pub fn percent(value: U256) -> String {
    format!("{:.2}%", wad_to_f64(value) * 100.0)
}

pub fn optional_percent(value: Option<U256>) -> String {
    value.map(percent).unwrap_or_else(|| "n/a".to_string())
}

/// UTC `YYYY-MM-DD HH:MM:SS`.
pub fn date_time(timestamp: Option<u64>) -> String {
    timestamp
        .and_then(|ts| i64::try_from(ts).ok())
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown time".to_string())
}

fn rate(value: U256) -> String {
    format!("{:.4}", wad_to_f64(value))
}

/// Message for a correlated trove operation. `ltv` is the position's LTV
/// after the operation, or before it for a close.
pub fn operation_message(op: &LogicalOperation, ltv: Ltv) -> String {
    let asset = &op.asset;
    let when = date_time(op.timestamp);
    let mut text = String::new();

    match op.kind {
        TroveOperationKind::OpenTrove => {
            let _ = writeln!(text, "{asset} Trove opened - {when}");
            let _ = writeln!(text, "Loan: {} BOLD", signed_amount(op.opening_loan()).trim_start_matches('+'));
            let _ = writeln!(text, "Collateral: {} {asset}", amount(op.post_coll));
            let _ = writeln!(text, "Interest rate: {}", percent(op.annual_interest_rate));
            let _ = writeln!(text, "LTV: {ltv}");
        }
        TroveOperationKind::CloseTrove => {
            let _ = writeln!(text, "{asset} Trove closed - {when}");
            let _ = writeln!(text, "Collateral: {} {asset}", amount(op.pre_coll));
            let _ = writeln!(text, "Debt: {} BOLD", amount(op.pre_debt));
            let _ = writeln!(text, "LTV before close: {ltv}");
        }
        TroveOperationKind::AdjustTrove => {
            let _ = writeln!(text, "{asset} Trove adjusted - {when}");
            if op.debt_changed() {
                let _ = writeln!(
                    text,
                    "Debt change: {} -> {} BOLD",
                    amount(op.pre_debt),
                    amount(op.post_debt)
                );
            } else {
                let _ = writeln!(text, "No debt change");
            }
            if op.coll_changed() {
                let _ = writeln!(
                    text,
                    "Coll change: {} -> {} {asset}",
                    amount(op.pre_coll),
                    amount(op.post_coll)
                );
            } else {
                let _ = writeln!(text, "No coll change");
            }
            let _ = writeln!(text, "Interest rate: {}", percent(op.annual_interest_rate));
            let _ = writeln!(text, "LTV: {ltv}");
        }
        TroveOperationKind::AdjustTroveInterestRate => {
            let _ = writeln!(text, "{asset} Rate adjusted - {when}");
            let _ = writeln!(text, "Loan: {} BOLD", amount(op.post_debt));
            let _ = writeln!(text, "Collateral: {} {asset}", amount(op.post_coll));
            let _ = writeln!(text, "Rate: {}", percent(op.annual_interest_rate));
            let _ = writeln!(text, "LTV: {ltv}");
        }
        other => {
            let _ = writeln!(text, "{asset} Trove operation {other:?} - {when}");
            let _ = writeln!(text, "Debt: {} BOLD", amount(op.post_debt));
            let _ = writeln!(text, "Collateral: {} {asset}", amount(op.post_coll));
        }
    }

    let _ = writeln!(text, "Trove ID: {}", op.trove_id);
    let _ = write!(text, "Tx hash: {}", op.transaction_hash);
    text
}

/// Message for a single-event record.
pub fn record_message(record: &ProtocolRecord) -> String {
    let asset = &record.meta.asset;
    let when = date_time(record.meta.timestamp);
    let mut text = String::new();

    match &record.detail {
        RecordDetail::Liquidation {
            liquidated_debt,
            price,
        } => {
            let _ = writeln!(text, "{asset} Liquidation - {when}");
            let _ = writeln!(text, "BOLD amount liquidated: {}", amount(*liquidated_debt));
            let _ = writeln!(text, "{asset} price: {}", amount(*price));
        }
        RecordDetail::Redemption {
            actual_bold,
            redemption_price,
            effective_bold_price,
            fee_rate,
            ..
        } => {
            let _ = writeln!(text, "{asset} Redemption - {when}");
            let _ = writeln!(text, "BOLD amount: {}", amount(*actual_bold));
            let _ = writeln!(text, "Fee rate: {}", optional_percent(*fee_rate));
            let _ = writeln!(
                text,
                "BOLD price: {}",
                effective_bold_price
                    .map(|p| format!("{:.4}", wad_to_f64(p)))
                    .unwrap_or_else(|| "n/a".to_string())
            );
            let _ = writeln!(text, "{asset} price: {}", amount(*redemption_price));
        }
        RecordDetail::BatchRateChanged {
            manager,
            annual_interest_rate,
            debt,
        } => {
            let _ = writeln!(text, "{asset} Batch rate adjusted - {when}");
            let _ = writeln!(text, "Batch manager: {manager}");
            let _ = writeln!(text, "Interest rate: {}", percent(*annual_interest_rate));
            let _ = writeln!(text, "Batch debt: {} BOLD", amount(*debt));
        }
        RecordDetail::BatchFeeLowered {
            manager,
            annual_management_fee,
            debt,
        } => {
            let _ = writeln!(text, "{asset} Batch fee lowered - {when}");
            let _ = writeln!(text, "Batch manager: {manager}");
            let _ = writeln!(text, "New fee: {}", percent(*annual_management_fee));
            let _ = writeln!(text, "Batch debt: {} BOLD", amount(*debt));
        }
    }

    let _ = write!(text, "Tx hash: {}", record.meta.transaction_hash);
    text
}

/// Daily summary, compared against the totals of the previous summary.
pub fn daily_message(stats: &DailyStats, previous: &PollState, day_start: Option<u64>) -> String {
    let mut text = String::new();
    let _ = writeln!(
        text,
        "Daily stats - {} (blocks {}-{})",
        date_time(day_start),
        stats.from_block,
        stats.to_block
    );
    let _ = writeln!(text, "BOLD minted: {}", amount(stats.minted));
    let _ = writeln!(text, "BOLD burned: {}", amount(stats.burned));
    let _ = writeln!(
        text,
        "Net BOLD minted: {} (previous {})",
        signed_amount(stats.net_minted),
        signed_amount(previous.last_net_minted)
    );
    let _ = writeln!(text, "BOLD repaid: {}", amount(stats.repaid));
    let _ = writeln!(text, "BOLD redeemed: {}", amount(stats.redeemed));
    let _ = writeln!(text, "BOLD liquidated: {}", amount(stats.liquidated));
    let _ = writeln!(text);

    let counts = &stats.counts;
    let _ = writeln!(text, "Troves opened: {}", counts.opened);
    let _ = writeln!(text, "Troves adjusted: {}", counts.adjusted);
    let _ = writeln!(text, "Troves closed: {}", counts.closed);
    let _ = writeln!(text, "Interest rate adjustments: {}", counts.rate_adjusted);
    let _ = writeln!(text, "Batch interest rate adjustments: {}", counts.batch_rate_adjusted);
    let _ = writeln!(text, "Batch fee reductions: {}", counts.batch_fee_lowered);
    let _ = writeln!(text);

    for (label, flow) in &stats.stability_pool {
        let previous_net = previous
            .last_net_stability_pool_by_asset
            .get(label)
            .copied()
            .unwrap_or(I256::ZERO);
        let _ = writeln!(
            text,
            "{label} SP deposits: {} / withdrawals: {} / net: {} (previous {})",
            amount(flow.deposits),
            amount(flow.withdrawals),
            signed_amount(flow.net()),
            signed_amount(previous_net)
        );
    }
    let _ = writeln!(text, "SP net total: {}", signed_amount(stats.net_stability_pool()));

    for (label, current) in &stats.exchange_rates {
        match previous.last_exchange_rate_snapshot.get(label) {
            Some(prior) => {
                let _ = writeln!(text, "{label} exchange rate: {} (previous {})", rate(*current), rate(*prior));
            }
            None => {
                let _ = writeln!(text, "{label} exchange rate: {}", rate(*current));
            }
        }
    }

    text.trim_end().to_string()
}
