// 2.0 ledger.rs: the vault ledger. single source of truth for idle funds,
// per-strategy debt and aggregate ratios. every debt mutation in the crate goes
// through increase_debt / decrease_debt (recognize_loss is built on top of
// them); nothing else touches the debt fields.

use crate::queue::{QueueError, WithdrawalQueue};
use crate::types::{Amount, AssetId, Bps, Shares, StrategyId, Timestamp, MAX_BPS};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// 2.1: one row of the strategy table. created on registration, soft-deleted on
// revocation (ratio zeroed, debt persists until liquidated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyEntry {
    pub id: StrategyId,
    pub activation: Timestamp,
    pub debt_ratio: Bps,
    pub min_debt_per_op: Amount,
    // per-operation ceiling on debt moves. zero = uncapped.
    pub max_debt_per_op: Amount,
    pub debt: Amount,
    pub cumulative_gain: Amount,
    pub cumulative_loss: Amount,
    pub last_report: Timestamp,
    // fields below were added after the first snapshot format shipped; they
    // default so older snapshots keep deserializing.
    #[serde(default)]
    pub cached_apy: Option<Decimal>,
    #[serde(default)]
    pub cached_risk_score: Option<Decimal>,
    #[serde(default)]
    pub fee_override: Option<Bps>,
}

impl StrategyEntry {
    fn new(
        id: StrategyId,
        debt_ratio: Bps,
        min_debt_per_op: Amount,
        max_debt_per_op: Amount,
        fee_override: Option<Bps>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            activation: now,
            debt_ratio,
            min_debt_per_op,
            max_debt_per_op,
            debt: Amount::zero(),
            cumulative_gain: Amount::zero(),
            cumulative_loss: Amount::zero(),
            last_report: now,
            cached_apy: None,
            cached_risk_score: None,
            fee_override,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("strategy {0:?} already registered")]
    AlreadyRegistered(StrategyId),

    #[error("strategy {0:?} not registered")]
    NotRegistered(StrategyId),

    #[error("asset mismatch: vault holds {expected:?}, strategy declared {declared:?}")]
    AssetMismatch { expected: AssetId, declared: AssetId },

    #[error("aggregate ratio overflow: requested {requested}, headroom {headroom}")]
    RatioOverflow { requested: Bps, headroom: Bps },

    #[error("invalid debt limits: min {min} exceeds max {max}")]
    InvalidDebtLimits { min: Amount, max: Amount },

    #[error("fee override {requested} exceeds cap {cap}")]
    FeeOverrideTooHigh { requested: Bps, cap: Bps },

    #[error("strategy {0:?} not allocatable")]
    NotAllocatable(StrategyId),

    // would-be underflow on debt. fatal invariant violation, never clamped.
    #[error("debt underflow on {strategy:?}: debt {debt}, decrease {requested}")]
    DebtUnderflow {
        strategy: StrategyId,
        debt: Amount,
        requested: Amount,
    },

    #[error("strategy {strategy:?} still holds {debt} of debt")]
    DebtPersists { strategy: StrategyId, debt: Amount },

    #[error(transparent)]
    Queue(#[from] QueueError),
}

// 2.2: the ledger aggregate. policy fields (fees, limits, clocks) are plain
// data the orchestrator manages; the strategy table and debt totals are private
// so mutation is forced through the primitives below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultLedger {
    pub asset: AssetId,
    pub idle_funds: Amount,
    pub locked_profit: Amount,
    // fraction of locked profit unlocked per second
    pub locked_profit_degradation: Decimal,
    pub last_report: Timestamp,
    pub last_fee_accrual: Timestamp,
    pub last_rebalance: Timestamp,
    pub deposit_limit: Amount,
    pub emergency_shutdown: bool,
    pub performance_fee: Bps,
    pub management_fee: Bps,
    pub total_shares: Shares,
    total_debt: Amount,
    total_debt_ratio: Bps,
    entries: HashMap<StrategyId, StrategyEntry>,
    queue: WithdrawalQueue,
}

impl VaultLedger {
    pub fn new(asset: AssetId, now: Timestamp) -> Self {
        Self {
            asset,
            idle_funds: Amount::zero(),
            locked_profit: Amount::zero(),
            locked_profit_degradation: Decimal::ZERO,
            last_report: now,
            last_fee_accrual: now,
            last_rebalance: now,
            deposit_limit: Amount::zero(),
            emergency_shutdown: false,
            performance_fee: Bps::zero(),
            management_fee: Bps::zero(),
            total_shares: Shares::zero(),
            total_debt: Amount::zero(),
            total_debt_ratio: Bps::zero(),
            entries: HashMap::new(),
            queue: WithdrawalQueue::new(),
        }
    }

    pub fn total_assets(&self) -> Amount {
        self.idle_funds.add(self.total_debt)
    }

    pub fn total_debt(&self) -> Amount {
        self.total_debt
    }

    pub fn total_debt_ratio(&self) -> Bps {
        self.total_debt_ratio
    }

    pub fn queue(&self) -> &WithdrawalQueue {
        &self.queue
    }

    pub fn is_registered(&self, id: StrategyId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn strategy(&self, id: StrategyId) -> Option<&StrategyEntry> {
        self.entries.get(&id)
    }

    pub fn strategies(&self) -> impl Iterator<Item = &StrategyEntry> {
        self.entries.values()
    }

    pub(crate) fn strategy_mut(&mut self, id: StrategyId) -> Option<&mut StrategyEntry> {
        self.entries.get_mut(&id)
    }

    // 2.3: registration and ratio governance.

    pub fn register(
        &mut self,
        id: StrategyId,
        debt_ratio: Bps,
        min_debt_per_op: Amount,
        max_debt_per_op: Amount,
        fee_override: Option<Bps>,
        declared_asset: AssetId,
        fee_cap: Bps,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        if self.is_registered(id) {
            return Err(LedgerError::AlreadyRegistered(id));
        }
        if declared_asset != self.asset {
            return Err(LedgerError::AssetMismatch {
                expected: self.asset,
                declared: declared_asset,
            });
        }
        if self.queue.is_full() {
            return Err(LedgerError::Queue(QueueError::Full {
                capacity: crate::queue::MAX_QUEUE_LEN,
            }));
        }
        let headroom = self.total_debt_ratio.headroom();
        if debt_ratio > headroom {
            return Err(LedgerError::RatioOverflow {
                requested: debt_ratio,
                headroom,
            });
        }
        if !max_debt_per_op.is_zero() && min_debt_per_op > max_debt_per_op {
            return Err(LedgerError::InvalidDebtLimits {
                min: min_debt_per_op,
                max: max_debt_per_op,
            });
        }
        if let Some(fee) = fee_override {
            if fee > fee_cap {
                return Err(LedgerError::FeeOverrideTooHigh {
                    requested: fee,
                    cap: fee_cap,
                });
            }
        }

        self.queue.push(id)?;
        self.entries.insert(
            id,
            StrategyEntry::new(id, debt_ratio, min_debt_per_op, max_debt_per_op, fee_override, now),
        );
        self.total_debt_ratio = self.total_debt_ratio.add(debt_ratio);
        Ok(())
    }

    pub fn update_ratio(&mut self, id: StrategyId, new_ratio: Bps) -> Result<(), LedgerError> {
        let entry = self.entries.get(&id).ok_or(LedgerError::NotRegistered(id))?;
        let without = self
            .total_debt_ratio
            .checked_sub(entry.debt_ratio)
            .expect("aggregate ratio covers every entry ratio");
        if new_ratio > without.headroom() {
            return Err(LedgerError::RatioOverflow {
                requested: new_ratio,
                headroom: without.headroom(),
            });
        }
        self.total_debt_ratio = without.add(new_ratio);
        self.entries
            .get_mut(&id)
            .expect("checked above")
            .debt_ratio = new_ratio;
        Ok(())
    }

    // zeroes the ratio and releases the aggregate headroom. debt is untouched
    // and the strategy stays queued so a later withdrawal can liquidate it.
    pub fn revoke(&mut self, id: StrategyId) -> Result<(), LedgerError> {
        self.update_ratio(id, Bps::zero())
    }

    // hard removal, only once the strategy holds no debt.
    pub fn remove(&mut self, id: StrategyId) -> Result<(), LedgerError> {
        let entry = self.entries.get(&id).ok_or(LedgerError::NotRegistered(id))?;
        if !entry.debt.is_zero() {
            return Err(LedgerError::DebtPersists {
                strategy: id,
                debt: entry.debt,
            });
        }
        self.revoke(id)?;
        self.entries.remove(&id);
        if self.queue.contains(id) {
            self.queue.remove(id)?;
        }
        Ok(())
    }

    pub fn set_queue_order(&mut self, order: Vec<StrategyId>) -> Result<(), LedgerError> {
        for id in &order {
            if !self.is_registered(*id) {
                return Err(LedgerError::NotRegistered(*id));
            }
        }
        self.queue.set_order(order)?;
        Ok(())
    }

    pub fn remove_from_queue(&mut self, id: StrategyId) -> Result<(), LedgerError> {
        self.queue.remove(id)?;
        Ok(())
    }

    // 2.4: credit and outstanding-debt views.

    // how much new debt the strategy may take on right now:
    // min(strategy headroom, aggregate headroom, idle funds), floored to zero
    // below min_debt_per_op and capped at max_debt_per_op.
    pub fn credit_available(&self, id: StrategyId) -> Amount {
        if self.emergency_shutdown {
            return Amount::zero();
        }
        let Some(entry) = self.entries.get(&id) else {
            return Amount::zero();
        };
        if entry.debt_ratio.is_zero() {
            return Amount::zero();
        }

        let total_assets = self.total_assets();
        let strategy_cap = total_assets.mul_bps(entry.debt_ratio);
        let aggregate_cap = total_assets.mul_bps(self.total_debt_ratio);

        let Some(strategy_headroom) = strategy_cap.checked_sub(entry.debt) else {
            return Amount::zero();
        };
        let Some(aggregate_headroom) = aggregate_cap.checked_sub(self.total_debt) else {
            return Amount::zero();
        };

        let mut available = strategy_headroom
            .min(aggregate_headroom)
            .min(self.idle_funds);

        if available < entry.min_debt_per_op {
            return Amount::zero();
        }
        if !entry.max_debt_per_op.is_zero() {
            available = available.min(entry.max_debt_per_op);
        }
        available
    }

    // excess of current debt over the strategy's cap. full debt once the ratio
    // is zero or the vault is shut down.
    pub fn debt_outstanding(&self, id: StrategyId) -> Amount {
        let Some(entry) = self.entries.get(&id) else {
            return Amount::zero();
        };
        if self.emergency_shutdown || entry.debt_ratio.is_zero() {
            return entry.debt;
        }
        let cap = self.total_assets().mul_bps(entry.debt_ratio);
        entry.debt.saturating_sub(cap)
    }

    // 2.5: the two debt primitives. sole mutators of debt fields.

    // increase only on allocatable strategies: registered, nonzero ratio, no
    // shutdown. funds transfer is the orchestrator's job; this is bookkeeping.
    pub fn increase_debt(&mut self, id: StrategyId, amount: Amount) -> Result<(), LedgerError> {
        if self.emergency_shutdown {
            return Err(LedgerError::NotAllocatable(id));
        }
        let entry = self.entries.get_mut(&id).ok_or(LedgerError::NotRegistered(id))?;
        if entry.debt_ratio.is_zero() {
            return Err(LedgerError::NotAllocatable(id));
        }
        entry.debt = entry.debt.add(amount);
        self.total_debt = self.total_debt.add(amount);
        Ok(())
    }

    // decrease must never exceed current debt. an underflow here means the
    // caller's accounting is wrong; surfacing it beats clamping it away.
    pub fn decrease_debt(&mut self, id: StrategyId, amount: Amount) -> Result<(), LedgerError> {
        let entry = self.entries.get_mut(&id).ok_or(LedgerError::NotRegistered(id))?;
        let new_debt = entry.debt.checked_sub(amount).ok_or(LedgerError::DebtUnderflow {
            strategy: id,
            debt: entry.debt,
            requested: amount,
        })?;
        let new_total = self
            .total_debt
            .checked_sub(amount)
            .ok_or(LedgerError::DebtUnderflow {
                strategy: id,
                debt: self.total_debt,
                requested: amount,
            })?;
        entry.debt = new_debt;
        self.total_debt = new_total;
        Ok(())
    }

    // 2.6: loss hook shared by report() and the liquidation traversal. writes
    // the loss off the strategy's debt and tightens its ratio proportionally so
    // a lossy strategy cannot immediately re-lever back to its old cap.
    pub fn recognize_loss(&mut self, id: StrategyId, loss: Amount) -> Result<(), LedgerError> {
        if loss.is_zero() {
            return Ok(());
        }
        if !self.is_registered(id) {
            return Err(LedgerError::NotRegistered(id));
        }

        let ratio_cut = if self.total_debt.is_zero() {
            Bps::zero()
        } else {
            let share = loss.value() / self.total_debt.value();
            let cut = (share * Decimal::from(self.total_debt_ratio.value()))
                .floor()
                .to_u32()
                .unwrap_or(u32::MAX);
            Bps::new(cut)
        };

        self.decrease_debt(id, loss)?;

        let entry = self.entries.get_mut(&id).expect("registered above");
        entry.cumulative_loss = entry.cumulative_loss.add(loss);
        let cut = if ratio_cut > entry.debt_ratio {
            entry.debt_ratio
        } else {
            ratio_cut
        };
        entry.debt_ratio = entry
            .debt_ratio
            .checked_sub(cut)
            .expect("cut capped at entry ratio");
        self.total_debt_ratio = self
            .total_debt_ratio
            .checked_sub(cut)
            .expect("aggregate ratio covers every entry ratio");
        Ok(())
    }

    // reconciliation check used across the test suites: totals must always
    // equal the entry sums.
    pub fn assert_reconciled(&self) {
        let debt_sum: Amount = self.entries.values().map(|e| e.debt).sum();
        assert_eq!(debt_sum, self.total_debt, "total debt out of sync");
        let ratio_sum: u32 = self.entries.values().map(|e| e.debt_ratio.value()).sum();
        assert_eq!(ratio_sum, self.total_debt_ratio.value(), "ratio out of sync");
        assert!(self.total_debt_ratio <= MAX_BPS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const USDC: AssetId = AssetId(1);

    fn ledger() -> VaultLedger {
        let mut ledger = VaultLedger::new(USDC, Timestamp::from_secs(0));
        ledger.deposit_limit = Amount::new(dec!(1_000_000));
        ledger
    }

    fn register(ledger: &mut VaultLedger, id: u32, ratio: u32) {
        ledger
            .register(
                StrategyId(id),
                Bps::new(ratio),
                Amount::zero(),
                Amount::zero(),
                None,
                USDC,
                Bps::new(5000),
                Timestamp::from_secs(0),
            )
            .unwrap();
    }

    #[test]
    fn registration_appends_to_queue() {
        let mut ledger = ledger();
        register(&mut ledger, 1, 4000);
        register(&mut ledger, 2, 3000);

        assert_eq!(ledger.total_debt_ratio(), Bps::new(7000));
        assert_eq!(
            ledger.queue().as_slice(),
            &[StrategyId(1), StrategyId(2)]
        );
        ledger.assert_reconciled();
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut ledger = ledger();
        register(&mut ledger, 1, 4000);

        let err = ledger
            .register(
                StrategyId(1),
                Bps::new(100),
                Amount::zero(),
                Amount::zero(),
                None,
                USDC,
                Bps::new(5000),
                Timestamp::from_secs(0),
            )
            .unwrap_err();
        assert_eq!(err, LedgerError::AlreadyRegistered(StrategyId(1)));
    }

    #[test]
    fn asset_mismatch_rejected() {
        let mut ledger = ledger();
        let err = ledger
            .register(
                StrategyId(1),
                Bps::new(100),
                Amount::zero(),
                Amount::zero(),
                None,
                AssetId(9),
                Bps::new(5000),
                Timestamp::from_secs(0),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::AssetMismatch { .. }));
    }

    #[test]
    fn ratio_headroom_boundary() {
        let mut ledger = ledger();
        register(&mut ledger, 1, 9000);

        // exactly the remaining headroom succeeds
        register(&mut ledger, 2, 1000);
        assert_eq!(ledger.total_debt_ratio(), MAX_BPS);

        // one basis point over fails
        let err = ledger
            .register(
                StrategyId(3),
                Bps::new(1),
                Amount::zero(),
                Amount::zero(),
                None,
                USDC,
                Bps::new(5000),
                Timestamp::from_secs(0),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::RatioOverflow { .. }));
    }

    #[test]
    fn credit_available_respects_caps() {
        let mut ledger = ledger();
        register(&mut ledger, 1, 9000);
        ledger.idle_funds = Amount::new(dec!(100_000));

        // strategy cap 90k, aggregate cap 90k, idle 100k
        assert_eq!(
            ledger.credit_available(StrategyId(1)).value(),
            dec!(90_000)
        );

        ledger.increase_debt(StrategyId(1), Amount::new(dec!(90_000))).unwrap();
        ledger.idle_funds = Amount::new(dec!(10_000));
        assert_eq!(ledger.credit_available(StrategyId(1)), Amount::zero());
    }

    #[test]
    fn credit_available_min_max_ops() {
        let mut ledger = ledger();
        ledger
            .register(
                StrategyId(1),
                Bps::new(9000),
                Amount::new(dec!(1000)),
                Amount::new(dec!(5000)),
                None,
                USDC,
                Bps::new(5000),
                Timestamp::from_secs(0),
            )
            .unwrap();

        // below min floors to zero
        ledger.idle_funds = Amount::new(dec!(500));
        assert_eq!(ledger.credit_available(StrategyId(1)), Amount::zero());

        // above min caps at max
        ledger.idle_funds = Amount::new(dec!(100_000));
        assert_eq!(ledger.credit_available(StrategyId(1)).value(), dec!(5000));
    }

    #[test]
    fn credit_zero_during_shutdown() {
        let mut ledger = ledger();
        register(&mut ledger, 1, 9000);
        ledger.idle_funds = Amount::new(dec!(100_000));
        ledger.emergency_shutdown = true;

        assert_eq!(ledger.credit_available(StrategyId(1)), Amount::zero());
        // no debt deployed yet, so nothing is outstanding either
        assert_eq!(ledger.debt_outstanding(StrategyId(1)), Amount::zero());
    }

    #[test]
    fn debt_outstanding_on_revoked_strategy() {
        let mut ledger = ledger();
        register(&mut ledger, 1, 9000);
        ledger.idle_funds = Amount::new(dec!(100_000));
        ledger.increase_debt(StrategyId(1), Amount::new(dec!(90_000))).unwrap();
        ledger.idle_funds = Amount::new(dec!(10_000));

        assert_eq!(ledger.debt_outstanding(StrategyId(1)), Amount::zero());

        ledger.revoke(StrategyId(1)).unwrap();
        assert_eq!(ledger.total_debt_ratio(), Bps::zero());
        // debt persists until liquidated, and all of it is outstanding
        assert_eq!(ledger.total_debt().value(), dec!(90_000));
        assert_eq!(
            ledger.debt_outstanding(StrategyId(1)).value(),
            dec!(90_000)
        );
        ledger.assert_reconciled();
    }

    #[test]
    fn decrease_beyond_debt_is_fatal() {
        let mut ledger = ledger();
        register(&mut ledger, 1, 9000);
        ledger.idle_funds = Amount::new(dec!(100_000));
        ledger.increase_debt(StrategyId(1), Amount::new(dec!(1000))).unwrap();

        let err = ledger
            .decrease_debt(StrategyId(1), Amount::new(dec!(1001)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::DebtUnderflow { .. }));
        // nothing was clamped
        assert_eq!(ledger.strategy(StrategyId(1)).unwrap().debt.value(), dec!(1000));
        ledger.assert_reconciled();
    }

    #[test]
    fn increase_requires_allocatable() {
        let mut ledger = ledger();
        register(&mut ledger, 1, 9000);
        ledger.revoke(StrategyId(1)).unwrap();

        let err = ledger
            .increase_debt(StrategyId(1), Amount::new(dec!(1)))
            .unwrap_err();
        assert_eq!(err, LedgerError::NotAllocatable(StrategyId(1)));
    }

    #[test]
    fn recognize_loss_tightens_ratio() {
        let mut ledger = ledger();
        register(&mut ledger, 1, 5000);
        register(&mut ledger, 2, 5000);
        ledger.idle_funds = Amount::new(dec!(100_000));
        ledger.increase_debt(StrategyId(1), Amount::new(dec!(50_000))).unwrap();
        ledger.increase_debt(StrategyId(2), Amount::new(dec!(50_000))).unwrap();

        // 10k loss out of 100k total debt cuts 10% of the 10000 aggregate
        ledger.recognize_loss(StrategyId(1), Amount::new(dec!(10_000))).unwrap();

        let entry = ledger.strategy(StrategyId(1)).unwrap();
        assert_eq!(entry.debt.value(), dec!(40_000));
        assert_eq!(entry.cumulative_loss.value(), dec!(10_000));
        assert_eq!(entry.debt_ratio, Bps::new(4000));
        assert_eq!(ledger.total_debt_ratio(), Bps::new(9000));
        ledger.assert_reconciled();
    }

    #[test]
    fn remove_requires_zero_debt() {
        let mut ledger = ledger();
        register(&mut ledger, 1, 5000);
        ledger.idle_funds = Amount::new(dec!(10_000));
        ledger.increase_debt(StrategyId(1), Amount::new(dec!(1000))).unwrap();

        assert!(matches!(
            ledger.remove(StrategyId(1)),
            Err(LedgerError::DebtPersists { .. })
        ));

        ledger.decrease_debt(StrategyId(1), Amount::new(dec!(1000))).unwrap();
        ledger.remove(StrategyId(1)).unwrap();
        assert!(!ledger.is_registered(StrategyId(1)));
        assert!(!ledger.queue().contains(StrategyId(1)));
    }
}
