//! Contract bindings for the BOLD protocol and its price feeds.
//!
//! Only the events and view functions the monitor reads are declared.

use alloy::sol;

sol! {
    /// Per-collateral trove manager
    interface ITroveManager {
        event Liquidation(uint256 _debtOffsetBySP, uint256 _debtRedistributed, uint256 _boldGasCompensation, uint256 _collGasCompensation, uint256 _collSentToSP, uint256 _collRedistributed, uint256 _collSurplus, uint256 _L_ETH, uint256 _L_boldDebt, uint256 _price);
        event Redemption(uint256 _attemptedBoldAmount, uint256 _actualBoldAmount, uint256 _ETHSent, uint256 _ETHFee, uint256 _price, uint256 _redemptionPrice);
        event TroveUpdated(uint256 indexed _troveId, uint256 _debt, uint256 _coll, uint256 _stake, uint256 _annualInterestRate, uint256 _snapshotOfTotalCollRedist, uint256 _snapshotOfTotalDebtRedist);
        event TroveOperation(uint256 indexed _troveId, uint8 _operation, uint256 _annualInterestRate, uint256 _debtIncreaseFromRedist, uint256 _debtIncreaseFromUpfrontFee, int256 _debtChangeFromOperation, uint256 _collIncreaseFromRedist, int256 _collChangeFromOperation);
        event BatchUpdated(address indexed _interestBatchManager, uint8 _operation, uint256 _debt, uint256 _coll, uint256 _annualInterestRate, uint256 _annualManagementFee, uint256 _totalDebtShares, uint256 _debtIncreaseFromUpfrontFee);
    }

    /// Per-collateral stability pool
    interface IStabilityPool {
        event DepositUpdated(address indexed _depositor, uint256 _newDeposit, uint256 _stashedColl, uint256 _snapshotP, uint256 _snapshotS, uint256 _snapshotB, uint256 _snapshotScale);
        event DepositOperation(address indexed _depositor, uint8 _operation, uint256 _depositLossSinceLastOperation, int256 _topUpOrWithdrawal, uint256 _yieldGainSinceLastOperation, uint256 _yieldGainClaimed, uint256 _ethGainSinceLastOperation, uint256 _ethGainClaimed);
    }

    /// BOLD debt token
    interface IBoldToken {
        event Transfer(address indexed from, address indexed to, uint256 value);
    }

    /// Chainlink aggregator (the contract behind a feed proxy)
    interface IAggregator {
        event AnswerUpdated(int256 indexed current, uint256 indexed roundId, uint256 updatedAt);
    }

    /// Chainlink feed proxy
    #[sol(rpc)]
    interface IAggregatorProxy {
        function aggregator() external view returns (address);
    }

    /// Wrapped staking token exposing its underlying exchange rate
    #[sol(rpc)]
    interface IWstEth {
        function stEthPerToken() external view returns (uint256);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;
    use alloy::sol_types::SolEvent;

    #[test]
    fn test_answer_updated_signature() {
        assert_eq!(
            IAggregator::AnswerUpdated::SIGNATURE_HASH,
            keccak256("AnswerUpdated(int256,uint256,uint256)")
        );
    }

    #[test]
    fn test_trove_operation_signature() {
        assert_eq!(
            ITroveManager::TroveOperation::SIGNATURE_HASH,
            keccak256(
                "TroveOperation(uint256,uint8,uint256,uint256,uint256,int256,uint256,int256)"
            )
        );
    }
}
