//! Pairs intent and result events of one transaction into a single trove
//! operation.
//!
//! A trove change emits a `TroveOperation` (the requested change, itemised)
//! and a `TroveUpdated` (the resulting absolute state) in the same
//! transaction. The state before the change is reconstructed from the two:
//!
//! ```text
//! pre_debt = post_debt - debt_from_redist - upfront_fee - debt_change
//! pre_coll = post_coll - coll_from_redist - coll_change
//! ```

use alloy::primitives::{B256, I256, U256};
use monitor_chain::{ProtocolEvent, RawEvent, TroveOperation, TroveOperationKind, TroveUpdated};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::u256_math::{to_signed, to_unsigned};

/// Events of one transaction, in emission order.
#[derive(Debug, Clone)]
pub struct TxGroup<'a> {
    pub transaction_hash: B256,
    pub events: SmallVec<[&'a RawEvent; 4]>,
}

impl TxGroup<'_> {
    fn sort_key(&self) -> (Option<u64>, u64, u64) {
        let first = self.events[0];
        (first.timestamp, first.block_number, first.log_index)
    }
}

/// Group events by transaction hash. Groups are ordered by the
/// (timestamp, block, log index) of their first event.
pub fn group_by_transaction(events: &[RawEvent]) -> Vec<TxGroup<'_>> {
    let mut groups: Vec<TxGroup<'_>> = Vec::new();
    for event in events {
        match groups
            .iter_mut()
            .rev()
            .find(|g| g.transaction_hash == event.transaction_hash)
        {
            Some(group) => group.events.push(event),
            None => groups.push(TxGroup {
                transaction_hash: event.transaction_hash,
                events: SmallVec::from_elem(event, 1),
            }),
        }
    }
    for group in &mut groups {
        group.events.sort_by_key(|e| e.position());
    }
    groups.sort_by_key(TxGroup::sort_key);
    groups
}

/// A correlated trove change with its reconstructed pre-state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalOperation {
    pub kind: TroveOperationKind,
    pub asset: String,
    pub trove_id: U256,
    pub transaction_hash: B256,
    pub block_number: u64,
    /// Log index of the intent event
    pub log_index: u64,
    pub timestamp: Option<u64>,
    pub annual_interest_rate: U256,
    pub debt_increase_from_redist: U256,
    pub debt_increase_from_upfront_fee: U256,
    pub debt_change_from_operation: I256,
    pub coll_increase_from_redist: U256,
    pub coll_change_from_operation: I256,
    pub pre_debt: U256,
    pub pre_coll: U256,
    pub post_debt: U256,
    pub post_coll: U256,
}

impl LogicalOperation {
    /// `None` when the reconstructed pre-state is negative.
    fn pair(
        asset: &str,
        event: &RawEvent,
        intent: &TroveOperation,
        result: &TroveUpdated,
    ) -> Option<Self> {
        let pre_debt = to_signed(result.debt)
            - to_signed(intent.debt_increase_from_redist)
            - to_signed(intent.debt_increase_from_upfront_fee)
            - intent.debt_change_from_operation;
        let pre_coll = to_signed(result.coll)
            - to_signed(intent.coll_increase_from_redist)
            - intent.coll_change_from_operation;

        Some(Self {
            kind: intent.operation,
            asset: asset.to_string(),
            trove_id: intent.trove_id,
            transaction_hash: event.transaction_hash,
            block_number: event.block_number,
            log_index: event.log_index,
            timestamp: event.timestamp,
            annual_interest_rate: intent.annual_interest_rate,
            debt_increase_from_redist: intent.debt_increase_from_redist,
            debt_increase_from_upfront_fee: intent.debt_increase_from_upfront_fee,
            debt_change_from_operation: intent.debt_change_from_operation,
            coll_increase_from_redist: intent.coll_increase_from_redist,
            coll_change_from_operation: intent.coll_change_from_operation,
            pre_debt: to_unsigned(pre_debt)?,
            pre_coll: to_unsigned(pre_coll)?,
            post_debt: result.debt,
            post_coll: result.coll,
        })
    }

    pub fn debt_changed(&self) -> bool {
        self.pre_debt != self.post_debt
    }

    pub fn coll_changed(&self) -> bool {
        self.pre_coll != self.post_coll
    }

    /// Debt requested by an opening: drawn amount plus upfront fee.
    pub fn opening_loan(&self) -> I256 {
        self.debt_change_from_operation + to_signed(self.debt_increase_from_upfront_fee)
    }
}

/// Correlate the operations of `kind` in one asset's trove manager events.
pub fn correlate(events: &[RawEvent], asset: &str, kind: TroveOperationKind) -> Vec<LogicalOperation> {
    let mut operations = Vec::new();

    for group in group_by_transaction(events) {
        let mut intents = group.events.iter().filter_map(|e| match &e.event {
            ProtocolEvent::TroveOperation(op) if op.operation == kind => Some((*e, op)),
            _ => None,
        });

        let Some((intent_event, intent)) = intents.next() else {
            continue;
        };
        let extra = intents.count();
        if extra > 0 {
            warn!(
                tx = %group.transaction_hash,
                asset,
                kind = ?kind,
                extra,
                "Several intents of the same kind in one transaction, pairing the first"
            );
        }

        let result = group.events.iter().find_map(|e| match &e.event {
            ProtocolEvent::TroveUpdated(update) if update.trove_id == intent.trove_id => Some(update),
            _ => None,
        });
        let Some(result) = result else {
            debug!(
                tx = %group.transaction_hash,
                trove_id = %intent.trove_id,
                "No matching TroveUpdated, dropping intent"
            );
            continue;
        };

        match LogicalOperation::pair(asset, intent_event, intent, result) {
            Some(operation) => operations.push(operation),
            None => warn!(
                tx = %group.transaction_hash,
                trove_id = %intent.trove_id,
                "Reconstructed pre-state is negative, dropping malformed pair"
            ),
        }
    }

    operations
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use alloy::primitives::Address;

    pub fn tx(n: u64) -> B256 {
        B256::from(U256::from(n).to_be_bytes::<32>())
    }

    pub fn signed(v: i128) -> I256 {
        I256::try_from(v).unwrap()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn intent(
        contract: Address,
        tx_id: u64,
        block: u64,
        log_index: u64,
        trove_id: u64,
        operation: TroveOperationKind,
        debt_change: i128,
        coll_change: i128,
        upfront_fee: u128,
    ) -> RawEvent {
        RawEvent {
            contract,
            event: ProtocolEvent::TroveOperation(TroveOperation {
                trove_id: U256::from(trove_id),
                operation,
                annual_interest_rate: U256::from(50_000_000_000_000_000u64),
                debt_increase_from_redist: U256::ZERO,
                debt_increase_from_upfront_fee: U256::from(upfront_fee),
                debt_change_from_operation: signed(debt_change),
                coll_increase_from_redist: U256::ZERO,
                coll_change_from_operation: signed(coll_change),
            }),
            block_number: block,
            transaction_hash: tx(tx_id),
            log_index,
            timestamp: None,
        }
    }

    pub fn updated(
        contract: Address,
        tx_id: u64,
        block: u64,
        log_index: u64,
        trove_id: u64,
        debt: u128,
        coll: u128,
    ) -> RawEvent {
        RawEvent {
            contract,
            event: ProtocolEvent::TroveUpdated(TroveUpdated {
                trove_id: U256::from(trove_id),
                debt: U256::from(debt),
                coll: U256::from(coll),
                stake: U256::from(coll),
                annual_interest_rate: U256::from(50_000_000_000_000_000u64),
            }),
            block_number: block,
            transaction_hash: tx(tx_id),
            log_index,
            timestamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use alloy::primitives::Address;

    const TM: Address = Address::repeat_byte(0x10);

    fn with_redist(mut event: RawEvent, debt_redist: u64, coll_redist: u64) -> RawEvent {
        if let ProtocolEvent::TroveOperation(op) = &mut event.event {
            op.debt_increase_from_redist = U256::from(debt_redist);
            op.coll_increase_from_redist = U256::from(coll_redist);
        }
        event
    }

    #[test]
    fn test_groups_ordered_by_first_event() {
        let mut late = intent(TM, 1, 20, 0, 1, TroveOperationKind::OpenTrove, 10, 10, 0);
        late.timestamp = Some(200);
        let mut early = intent(TM, 2, 10, 5, 2, TroveOperationKind::OpenTrove, 10, 10, 0);
        early.timestamp = Some(100);
        let mut early_result = updated(TM, 2, 10, 6, 2, 10, 10);
        early_result.timestamp = Some(100);

        let events = vec![late, early_result, early];
        let groups = group_by_transaction(&events);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].transaction_hash, tx(2));
        assert_eq!(groups[0].events.len(), 2);
        assert_eq!(groups[0].events[0].log_index, 5);
        assert_eq!(groups[1].transaction_hash, tx(1));
    }

    #[test]
    fn test_pre_state_round_trip() {
        let events = vec![
            with_redist(
                intent(TM, 1, 10, 0, 7, TroveOperationKind::AdjustTrove, -300, 2_000, 5),
                11,
                13,
            ),
            updated(TM, 1, 10, 1, 7, 1_000, 9_000),
        ];
        let ops = correlate(&events, "WETH", TroveOperationKind::AdjustTrove);
        assert_eq!(ops.len(), 1);
        let op = &ops[0];

        assert_eq!(op.pre_debt, U256::from(1_000u64 - 11 - 5 + 300));
        assert_eq!(op.pre_coll, U256::from(9_000u64 - 13 - 2_000));

        let debt_sum = to_signed(op.pre_debt)
            + to_signed(op.debt_increase_from_redist)
            + to_signed(op.debt_increase_from_upfront_fee)
            + op.debt_change_from_operation;
        let coll_sum = to_signed(op.pre_coll)
            + to_signed(op.coll_increase_from_redist)
            + op.coll_change_from_operation;
        assert_eq!(debt_sum, to_signed(op.post_debt));
        assert_eq!(coll_sum, to_signed(op.post_coll));
        assert!(op.debt_changed());
        assert!(op.coll_changed());
    }

    #[test]
    fn test_requires_both_events_and_matching_trove() {
        let events = vec![
            // intent only
            intent(TM, 1, 10, 0, 1, TroveOperationKind::OpenTrove, 100, 100, 1),
            // result only
            updated(TM, 2, 11, 0, 2, 100, 100),
            // different trove ids
            intent(TM, 3, 12, 0, 3, TroveOperationKind::OpenTrove, 100, 100, 1),
            updated(TM, 3, 12, 1, 4, 101, 100),
            // other kind
            intent(TM, 4, 13, 0, 5, TroveOperationKind::CloseTrove, -100, -100, 0),
            updated(TM, 4, 13, 1, 5, 0, 0),
        ];
        assert!(correlate(&events, "WETH", TroveOperationKind::OpenTrove).is_empty());
        assert_eq!(correlate(&events, "WETH", TroveOperationKind::CloseTrove).len(), 1);
    }

    #[test]
    fn test_first_intent_pairs_with_first_matching_result() {
        let events = vec![
            intent(TM, 1, 10, 0, 1, TroveOperationKind::AdjustTroveInterestRate, 0, 0, 0),
            updated(TM, 1, 10, 1, 2, 50, 50),
            updated(TM, 1, 10, 2, 1, 100, 100),
            intent(TM, 1, 10, 3, 2, TroveOperationKind::AdjustTroveInterestRate, 0, 0, 0),
            updated(TM, 1, 10, 4, 1, 999, 999),
        ];
        let ops = correlate(&events, "WETH", TroveOperationKind::AdjustTroveInterestRate);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].trove_id, U256::from(1u64));
        assert_eq!(ops[0].post_debt, U256::from(100u64));
        assert_eq!(ops[0].log_index, 0);
    }

    #[test]
    fn test_negative_pre_state_is_dropped() {
        let events = vec![
            intent(TM, 1, 10, 0, 1, TroveOperationKind::AdjustTrove, 500, 0, 0),
            updated(TM, 1, 10, 1, 1, 100, 100),
        ];
        assert!(correlate(&events, "WETH", TroveOperationKind::AdjustTrove).is_empty());
    }

    #[test]
    fn test_open_and_close_reconstruction() {
        let events = vec![
            intent(TM, 1, 10, 0, 1, TroveOperationKind::OpenTrove, 2_000, 1_000, 7),
            updated(TM, 1, 10, 1, 1, 2_007, 1_000),
            intent(TM, 2, 20, 0, 1, TroveOperationKind::CloseTrove, -2_010, -1_000, 0),
            updated(TM, 2, 20, 1, 1, 0, 0),
        ];
        let open = correlate(&events, "WETH", TroveOperationKind::OpenTrove);
        assert_eq!(open[0].pre_debt, U256::ZERO);
        assert_eq!(open[0].pre_coll, U256::ZERO);
        assert_eq!(open[0].opening_loan(), signed(2_007));

        let close = correlate(&events, "WETH", TroveOperationKind::CloseTrove);
        assert_eq!(close[0].pre_debt, U256::from(2_010u64));
        assert_eq!(close[0].post_debt, U256::ZERO);
    }
}
