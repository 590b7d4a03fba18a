// 10.0: every state change produces an event. used for audit trails, state
// reconstruction, and notifying external systems. the EventPayload enum lists
// all event types.

use crate::advisory::QuoteRejection;
use crate::types::{AccountId, Amount, Bps, Shares, StrategyId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Holder events
    Deposit(DepositEvent),
    Withdrawal(WithdrawalEvent),
    WithdrawalRejected(WithdrawalRejectedEvent),

    // Strategy lifecycle events
    StrategyRegistered(StrategyRegisteredEvent),
    StrategyRevoked(StrategyRevokedEvent),
    DebtRatioUpdated(DebtRatioUpdatedEvent),
    QueueReordered(QueueReorderedEvent),

    // Accounting events
    StrategyReported(StrategyReportedEvent),
    FeesAccrued(FeesAccruedEvent),

    // Rebalance events
    RebalanceExecuted(RebalanceExecutedEvent),
    QuoteRejected(QuoteRejectedEvent),

    // Emergency events
    EmergencyShutdown(EmergencyShutdownEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositEvent {
    pub account_id: AccountId,
    pub amount: Amount,
    pub shares_minted: Shares,
    pub new_idle: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalEvent {
    pub account_id: AccountId,
    pub requested: Amount,
    pub paid_out: Amount,
    pub loss: Amount,
    pub shares_burned: Shares,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRejectedEvent {
    pub account_id: AccountId,
    pub amount: Amount,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRegisteredEvent {
    pub strategy: StrategyId,
    pub debt_ratio: Bps,
    pub fee_override: Option<Bps>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRevokedEvent {
    pub strategy: StrategyId,
    pub released_ratio: Bps,
    pub remaining_debt: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtRatioUpdatedEvent {
    pub strategy: StrategyId,
    pub old_ratio: Bps,
    pub new_ratio: Bps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueReorderedEvent {
    pub order: Vec<StrategyId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyReportedEvent {
    pub strategy: StrategyId,
    pub gain: Amount,
    pub loss: Amount,
    pub debt_payment: Amount,
    pub performance_fee: Amount,
    pub new_debt: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeesAccruedEvent {
    pub management_fee: Amount,
    pub shares_minted: Shares,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceExecutedEvent {
    pub moved_out: Amount,
    pub moved_in: Amount,
    pub loss: Amount,
    pub target_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRejectedEvent {
    pub strategy: StrategyId,
    pub reason: QuoteRejection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyShutdownEvent {
    pub active: bool,
}
