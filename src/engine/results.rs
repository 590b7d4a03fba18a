// 8.0.2: result types and errors for vault operations.

use crate::allocation::AllocationPlan;
use crate::ledger::LedgerError;
use crate::strategy::StrategyError;
use crate::types::{AccountId, Amount, Shares, StrategyId};

#[derive(Debug, Clone)]
pub struct DepositReceipt {
    pub account_id: AccountId,
    pub amount: Amount,
    pub shares_minted: Shares,
}

#[derive(Debug, Clone)]
pub struct WithdrawalOutcome {
    pub account_id: AccountId,
    pub requested: Amount,
    pub paid_out: Amount,
    pub loss: Amount,
    pub shares_burned: Shares,
}

impl WithdrawalOutcome {
    pub(super) fn noop(account_id: AccountId) -> Self {
        Self {
            account_id,
            requested: Amount::zero(),
            paid_out: Amount::zero(),
            loss: Amount::zero(),
            shares_burned: Shares::zero(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub strategy: StrategyId,
    pub gain: Amount,
    pub loss: Amount,
    pub debt_payment: Amount,
    pub performance_fee: Amount,
    pub new_debt: Amount,
}

#[derive(Debug, Clone)]
pub struct RebalanceOutcome {
    pub targets: AllocationPlan,
    pub moved_out: Amount,
    pub moved_in: Amount,
    pub loss: Amount,
    pub wound_down: Vec<StrategyId>,
}

// shouldRebalance verdict: whether a rebalance looks worthwhile and the
// projected blended-yield improvement backing that call, in bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceSignal {
    pub beneficial: bool,
    pub improvement_bps: i64,
}

impl RebalanceSignal {
    pub(super) fn negative() -> Self {
        Self {
            beneficial: false,
            improvement_bps: 0,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum VaultError {
    #[error("caller not authorized: requires {required}")]
    Unauthorized { required: &'static str },

    #[error("another operation is already in progress")]
    OperationInProgress,

    #[error("vault is in emergency shutdown")]
    Shutdown,

    #[error("zero amount")]
    ZeroAmount,

    #[error("deposit limit exceeded: holding {assets}, amount {amount}, limit {limit}")]
    DepositLimitExceeded {
        assets: Amount,
        amount: Amount,
        limit: Amount,
    },

    #[error("account {0:?} not found")]
    AccountNotFound(AccountId),

    #[error("insufficient shares: needed {needed}, held {held}")]
    InsufficientShares { needed: Shares, held: Shares },

    #[error("no fair exchange rate: shares outstanding but no free funds")]
    NoExchangeRate,

    #[error("insufficient liquidity: requested {requested}, freed {freed}")]
    InsufficientLiquidity { requested: Amount, freed: Amount },

    #[error("realized loss {loss} exceeds gate {limit}")]
    LossLimitExceeded { loss: Amount, limit: Amount },

    #[error("rebalance loss {loss} exceeds budget {budget}")]
    RebalanceLossExceeded { loss: Amount, budget: Amount },

    #[error("rebalance rate-limited for another {remaining_secs}s")]
    RateLimited { remaining_secs: i64 },

    #[error("no viable rebalance targets")]
    NoViableTargets,

    #[error("strategy {strategy:?} call failed: {source}")]
    StrategyFailure {
        strategy: StrategyId,
        #[source]
        source: StrategyError,
    },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}
