//! Typed protocol events.
//!
//! Every log the monitor consumes is decoded into one [`ProtocolEvent`]
//! variant carrying its own field set, so arithmetic downstream never looks a
//! field up by name.

use alloy::primitives::{Address, B256, I256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use tracing::trace;

use crate::contracts::{IAggregator, IBoldToken, IStabilityPool, ITroveManager};
use crate::error::ChainError;

/// Operation code carried by `TroveOperation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TroveOperationKind {
    OpenTrove,
    CloseTrove,
    AdjustTrove,
    AdjustTroveInterestRate,
    ApplyPendingDebt,
    Liquidate,
    RedeemCollateral,
    OpenTroveAndJoinBatch,
    SetInterestBatchManager,
    RemoveFromBatch,
    Unknown(u8),
}

impl From<u8> for TroveOperationKind {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::OpenTrove,
            1 => Self::CloseTrove,
            2 => Self::AdjustTrove,
            3 => Self::AdjustTroveInterestRate,
            4 => Self::ApplyPendingDebt,
            5 => Self::Liquidate,
            6 => Self::RedeemCollateral,
            7 => Self::OpenTroveAndJoinBatch,
            8 => Self::SetInterestBatchManager,
            9 => Self::RemoveFromBatch,
            other => Self::Unknown(other),
        }
    }
}

/// Operation code carried by `BatchUpdated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchOperationKind {
    RegisterBatchManager,
    LowerBatchManagerAnnualFee,
    SetBatchManagerAnnualInterestRate,
    ApplyBatchInterestAndFee,
    JoinBatch,
    ExitBatch,
    TroveChange,
    Unknown(u8),
}

impl From<u8> for BatchOperationKind {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::RegisterBatchManager,
            1 => Self::LowerBatchManagerAnnualFee,
            2 => Self::SetBatchManagerAnnualInterestRate,
            3 => Self::ApplyBatchInterestAndFee,
            4 => Self::JoinBatch,
            5 => Self::ExitBatch,
            6 => Self::TroveChange,
            other => Self::Unknown(other),
        }
    }
}

/// Operation code carried by `DepositOperation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepositOperationKind {
    ProvideToSp,
    WithdrawFromSp,
    ClaimAllCollGains,
    Unknown(u8),
}

impl From<u8> for DepositOperationKind {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::ProvideToSp,
            1 => Self::WithdrawFromSp,
            2 => Self::ClaimAllCollGains,
            other => Self::Unknown(other),
        }
    }
}

/// Requested change to a trove, itemised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TroveOperation {
    pub trove_id: U256,
    pub operation: TroveOperationKind,
    pub annual_interest_rate: U256,
    pub debt_increase_from_redist: U256,
    pub debt_increase_from_upfront_fee: U256,
    pub debt_change_from_operation: I256,
    pub coll_increase_from_redist: U256,
    pub coll_change_from_operation: I256,
}

/// Absolute trove state after a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TroveUpdated {
    pub trove_id: U256,
    pub debt: U256,
    pub coll: U256,
    pub stake: U256,
    pub annual_interest_rate: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Liquidation {
    pub debt_offset_by_sp: U256,
    pub debt_redistributed: U256,
    pub bold_gas_compensation: U256,
    pub coll_gas_compensation: U256,
    pub coll_sent_to_sp: U256,
    pub coll_redistributed: U256,
    pub coll_surplus: U256,
    pub price: U256,
}

impl Liquidation {
    /// Debt removed from the system by this liquidation.
    pub fn liquidated_debt(&self) -> U256 {
        self.debt_offset_by_sp + self.debt_redistributed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    pub attempted_bold_amount: U256,
    pub actual_bold_amount: U256,
    pub coll_sent: U256,
    pub coll_fee: U256,
    pub price: U256,
    pub redemption_price: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchUpdated {
    pub batch_manager: Address,
    pub operation: BatchOperationKind,
    pub debt: U256,
    pub coll: U256,
    pub annual_interest_rate: U256,
    pub annual_management_fee: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositOperation {
    pub depositor: Address,
    pub operation: DepositOperationKind,
    pub top_up_or_withdrawal: I256,
    pub yield_gain_claimed: U256,
    pub coll_gain_claimed: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositUpdated {
    pub depositor: Address,
    pub new_deposit: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

/// Chainlink round update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerUpdated {
    pub answer: I256,
    pub round_id: U256,
    pub updated_at: u64,
}

/// Event kinds the monitor subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TroveOperation,
    TroveUpdated,
    Liquidation,
    Redemption,
    BatchUpdated,
    DepositOperation,
    DepositUpdated,
    Transfer,
    AnswerUpdated,
}

impl EventKind {
    /// Events emitted by a trove manager.
    pub const TROVE_MANAGER: &'static [EventKind] = &[
        EventKind::TroveOperation,
        EventKind::TroveUpdated,
        EventKind::Liquidation,
        EventKind::Redemption,
        EventKind::BatchUpdated,
    ];

    /// Events emitted by a stability pool.
    pub const STABILITY_POOL: &'static [EventKind] =
        &[EventKind::DepositOperation, EventKind::DepositUpdated];

    pub const BOLD_TOKEN: &'static [EventKind] = &[EventKind::Transfer];

    pub const PRICE_FEED: &'static [EventKind] = &[EventKind::AnswerUpdated];

    /// Topic0 of the event.
    pub fn signature(&self) -> B256 {
        match self {
            Self::TroveOperation => ITroveManager::TroveOperation::SIGNATURE_HASH,
            Self::TroveUpdated => ITroveManager::TroveUpdated::SIGNATURE_HASH,
            Self::Liquidation => ITroveManager::Liquidation::SIGNATURE_HASH,
            Self::Redemption => ITroveManager::Redemption::SIGNATURE_HASH,
            Self::BatchUpdated => ITroveManager::BatchUpdated::SIGNATURE_HASH,
            Self::DepositOperation => IStabilityPool::DepositOperation::SIGNATURE_HASH,
            Self::DepositUpdated => IStabilityPool::DepositUpdated::SIGNATURE_HASH,
            Self::Transfer => IBoldToken::Transfer::SIGNATURE_HASH,
            Self::AnswerUpdated => IAggregator::AnswerUpdated::SIGNATURE_HASH,
        }
    }

    /// Reverse lookup from topic0.
    pub fn from_signature(topic: &B256) -> Option<Self> {
        const ALL: [EventKind; 9] = [
            EventKind::TroveOperation,
            EventKind::TroveUpdated,
            EventKind::Liquidation,
            EventKind::Redemption,
            EventKind::BatchUpdated,
            EventKind::DepositOperation,
            EventKind::DepositUpdated,
            EventKind::Transfer,
            EventKind::AnswerUpdated,
        ];
        ALL.into_iter().find(|kind| kind.signature() == *topic)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TroveOperation => "TroveOperation",
            Self::TroveUpdated => "TroveUpdated",
            Self::Liquidation => "Liquidation",
            Self::Redemption => "Redemption",
            Self::BatchUpdated => "BatchUpdated",
            Self::DepositOperation => "DepositOperation",
            Self::DepositUpdated => "DepositUpdated",
            Self::Transfer => "Transfer",
            Self::AnswerUpdated => "AnswerUpdated",
        }
    }
}

/// Decoded event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    TroveOperation(TroveOperation),
    TroveUpdated(TroveUpdated),
    Liquidation(Liquidation),
    Redemption(Redemption),
    BatchUpdated(BatchUpdated),
    DepositOperation(DepositOperation),
    DepositUpdated(DepositUpdated),
    Transfer(Transfer),
    AnswerUpdated(AnswerUpdated),
}

impl ProtocolEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::TroveOperation(_) => EventKind::TroveOperation,
            Self::TroveUpdated(_) => EventKind::TroveUpdated,
            Self::Liquidation(_) => EventKind::Liquidation,
            Self::Redemption(_) => EventKind::Redemption,
            Self::BatchUpdated(_) => EventKind::BatchUpdated,
            Self::DepositOperation(_) => EventKind::DepositOperation,
            Self::DepositUpdated(_) => EventKind::DepositUpdated,
            Self::Transfer(_) => EventKind::Transfer,
            Self::AnswerUpdated(_) => EventKind::AnswerUpdated,
        }
    }
}

/// A fetched log with its decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Emitting contract
    pub contract: Address,
    pub event: ProtocolEvent,
    pub block_number: u64,
    pub transaction_hash: B256,
    /// Position of the log within its block
    pub log_index: u64,
    /// Block time in seconds, attached after fetch
    pub timestamp: Option<u64>,
}

impl RawEvent {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    /// Sort key: block, then emission order.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// Decode an RPC log.
///
/// Returns `Ok(None)` for logs whose topic0 is not one we track.
pub fn decode_log(log: &Log) -> Result<Option<RawEvent>, ChainError> {
    let Some(topic) = log.topics().first() else {
        return Ok(None);
    };
    let Some(kind) = EventKind::from_signature(topic) else {
        trace!(topic = %topic, "Skipping untracked log");
        return Ok(None);
    };

    let block_number = log.block_number.ok_or(ChainError::MissingField("block_number"))?;
    let transaction_hash = log
        .transaction_hash
        .ok_or(ChainError::MissingField("transaction_hash"))?;
    let log_index = log.log_index.ok_or(ChainError::MissingField("log_index"))?;

    let decode_err = |e: alloy::sol_types::Error| ChainError::Decode {
        event: kind.name(),
        tx_hash: transaction_hash,
        message: e.to_string(),
    };

    let event = match kind {
        EventKind::TroveOperation => {
            let e = ITroveManager::TroveOperation::decode_log(&log.inner, true)
                .map_err(decode_err)?
                .data;
            ProtocolEvent::TroveOperation(TroveOperation {
                trove_id: e._troveId,
                operation: e._operation.into(),
                annual_interest_rate: e._annualInterestRate,
                debt_increase_from_redist: e._debtIncreaseFromRedist,
                debt_increase_from_upfront_fee: e._debtIncreaseFromUpfrontFee,
                debt_change_from_operation: e._debtChangeFromOperation,
                coll_increase_from_redist: e._collIncreaseFromRedist,
                coll_change_from_operation: e._collChangeFromOperation,
            })
        }
        EventKind::TroveUpdated => {
            let e = ITroveManager::TroveUpdated::decode_log(&log.inner, true)
                .map_err(decode_err)?
                .data;
            ProtocolEvent::TroveUpdated(TroveUpdated {
                trove_id: e._troveId,
                debt: e._debt,
                coll: e._coll,
                stake: e._stake,
                annual_interest_rate: e._annualInterestRate,
            })
        }
        EventKind::Liquidation => {
            let e = ITroveManager::Liquidation::decode_log(&log.inner, true)
                .map_err(decode_err)?
                .data;
            ProtocolEvent::Liquidation(Liquidation {
                debt_offset_by_sp: e._debtOffsetBySP,
                debt_redistributed: e._debtRedistributed,
                bold_gas_compensation: e._boldGasCompensation,
                coll_gas_compensation: e._collGasCompensation,
                coll_sent_to_sp: e._collSentToSP,
                coll_redistributed: e._collRedistributed,
                coll_surplus: e._collSurplus,
                price: e._price,
            })
        }
        EventKind::Redemption => {
            let e = ITroveManager::Redemption::decode_log(&log.inner, true)
                .map_err(decode_err)?
                .data;
            ProtocolEvent::Redemption(Redemption {
                attempted_bold_amount: e._attemptedBoldAmount,
                actual_bold_amount: e._actualBoldAmount,
                coll_sent: e._ETHSent,
                coll_fee: e._ETHFee,
                price: e._price,
                redemption_price: e._redemptionPrice,
            })
        }
        EventKind::BatchUpdated => {
            let e = ITroveManager::BatchUpdated::decode_log(&log.inner, true)
                .map_err(decode_err)?
                .data;
            ProtocolEvent::BatchUpdated(BatchUpdated {
                batch_manager: e._interestBatchManager,
                operation: e._operation.into(),
                debt: e._debt,
                coll: e._coll,
                annual_interest_rate: e._annualInterestRate,
                annual_management_fee: e._annualManagementFee,
            })
        }
        EventKind::DepositOperation => {
            let e = IStabilityPool::DepositOperation::decode_log(&log.inner, true)
                .map_err(decode_err)?
                .data;
            ProtocolEvent::DepositOperation(DepositOperation {
                depositor: e._depositor,
                operation: e._operation.into(),
                top_up_or_withdrawal: e._topUpOrWithdrawal,
                yield_gain_claimed: e._yieldGainClaimed,
                coll_gain_claimed: e._ethGainClaimed,
            })
        }
        EventKind::DepositUpdated => {
            let e = IStabilityPool::DepositUpdated::decode_log(&log.inner, true)
                .map_err(decode_err)?
                .data;
            ProtocolEvent::DepositUpdated(DepositUpdated {
                depositor: e._depositor,
                new_deposit: e._newDeposit,
            })
        }
        EventKind::Transfer => {
            let e = IBoldToken::Transfer::decode_log(&log.inner, true)
                .map_err(decode_err)?
                .data;
            ProtocolEvent::Transfer(Transfer {
                from: e.from,
                to: e.to,
                value: e.value,
            })
        }
        EventKind::AnswerUpdated => {
            let e = IAggregator::AnswerUpdated::decode_log(&log.inner, true)
                .map_err(decode_err)?
                .data;
            ProtocolEvent::AnswerUpdated(AnswerUpdated {
                answer: e.current,
                round_id: e.roundId,
                updated_at: e.updatedAt.saturating_to::<u64>(),
            })
        }
    };

    Ok(Some(RawEvent {
        contract: log.address(),
        event,
        block_number,
        transaction_hash,
        log_index,
        timestamp: None,
    }))
}
