// 8.3 engine/reports.rs: strategy reporting, harvest triggering and
// management-fee accrual. the management fee runs on last_fee_accrual, the
// profit lock on last_report; the two clocks never share state.

use super::core::{Vault, FEE_RECIPIENT};
use super::results::{ReportOutcome, VaultError};
use crate::events::{EventPayload, FeesAccruedEvent, StrategyReportedEvent};
use crate::profit;
use crate::types::{Amount, Caller, StrategyId};

impl Vault {
    // 8.3.1: management-fee tick. callable by anyone; the clock advances even
    // when the accrued fee rounds to zero.
    pub fn accrue_fees(&mut self) -> Result<Amount, VaultError> {
        self.with_guard(|v| Ok(v.accrue_management_fee()))
    }

    pub(super) fn accrue_management_fee(&mut self) -> Amount {
        let now = self.current_time;
        let fee = profit::management_fee_due(&self.ledger, now);
        let shares = profit::fee_shares_for(&self.ledger, fee, now);
        self.mint_shares(FEE_RECIPIENT, shares);
        self.ledger.last_fee_accrual = now;

        if !fee.is_zero() {
            self.emit_event(EventPayload::FeesAccrued(FeesAccruedEvent {
                management_fee: fee,
                shares_minted: shares,
            }));
        }
        fee
    }

    // 8.3.2: report. only the strategy itself may report its own numbers.
    pub fn report(
        &mut self,
        caller: Caller,
        gain: Amount,
        loss: Amount,
        debt_payment: Amount,
    ) -> Result<ReportOutcome, VaultError> {
        self.with_guard(|v| {
            let Caller::Strategy(id) = caller else {
                return Err(VaultError::Unauthorized {
                    required: "reporting strategy",
                });
            };
            v.report_inner(id, gain, loss, debt_payment)
        })
    }

    // 8.3.3: harvest. management pokes the strategy, which hands back its
    // numbers; a connector failure here aborts before any ledger mutation.
    pub fn harvest(&mut self, caller: Caller, id: StrategyId) -> Result<ReportOutcome, VaultError> {
        self.with_guard(|v| {
            v.require_privileged(caller)?;
            if !v.ledger.is_registered(id) {
                return Err(VaultError::Ledger(crate::ledger::LedgerError::NotRegistered(id)));
            }
            let connector = v
                .connectors
                .get_mut(&id)
                .ok_or(VaultError::Ledger(crate::ledger::LedgerError::NotRegistered(id)))?;
            let harvested = connector
                .harvest()
                .map_err(|source| VaultError::StrategyFailure { strategy: id, source })?;
            v.report_inner(id, harvested.gain, harvested.loss, harvested.debt_repayment)
        })
    }

    // the report state machine. order matters: fee clock ticks first on its
    // own schedule, then debt payment, then loss, then gain/fee/lock, then the
    // report clocks advance.
    fn report_inner(
        &mut self,
        id: StrategyId,
        gain: Amount,
        loss: Amount,
        debt_payment: Amount,
    ) -> Result<ReportOutcome, VaultError> {
        if !self.ledger.is_registered(id) {
            return Err(VaultError::Ledger(crate::ledger::LedgerError::NotRegistered(id)));
        }
        let now = self.current_time;

        self.accrue_management_fee();

        // debt payment is clamped to what is actually outstanding; the clamp
        // is specified behavior, unlike a decrease below zero which is not.
        let payment = debt_payment.min(self.ledger.debt_outstanding(id));
        if !payment.is_zero() {
            self.ledger.decrease_debt(id, payment)?;
            self.ledger.idle_funds = self.ledger.idle_funds.add(payment);
        }

        if !loss.is_zero() {
            self.ledger.recognize_loss(id, loss)?;
        }

        // performance fee on the gain, per-strategy override first
        let fee_bps = self
            .ledger
            .strategy(id)
            .and_then(|e| e.fee_override)
            .unwrap_or(self.ledger.performance_fee);
        let performance_fee = profit::performance_fee_on(gain, fee_bps);
        let net_gain = gain
            .checked_sub(performance_fee)
            .expect("fee rate is at most 100%");

        if !gain.is_zero() {
            // gain funds arrive alongside the report
            self.ledger.idle_funds = self.ledger.idle_funds.add(gain);
        }
        // rebase the decayed remainder even on a zero-gain report; advancing
        // the decay anchor without rebasing would re-inflate locked profit
        profit::lock_gain(&mut self.ledger, net_gain, now);

        // clocks advance before the fee claim is priced so the fresh lock is
        // fully counted against free funds
        self.ledger.last_report = now;
        if let Some(entry) = self.ledger.strategy_mut(id) {
            entry.last_report = now;
            entry.cumulative_gain = entry.cumulative_gain.add(gain);
        }

        let fee_shares = profit::fee_shares_for(&self.ledger, performance_fee, now);
        self.mint_shares(FEE_RECIPIENT, fee_shares);

        let new_debt = self
            .ledger
            .strategy(id)
            .map(|e| e.debt)
            .unwrap_or(Amount::zero());

        self.emit_event(EventPayload::StrategyReported(StrategyReportedEvent {
            strategy: id,
            gain,
            loss,
            debt_payment: payment,
            performance_fee,
            new_debt,
        }));

        Ok(ReportOutcome {
            strategy: id,
            gain,
            loss,
            debt_payment: payment,
            performance_fee,
            new_debt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;
    use crate::engine::EngineConfig;
    use crate::profit::SECONDS_PER_YEAR;
    use crate::strategy::{SimStrategy, Strategy};
    use crate::types::{AccountId, AssetId, Bps, Timestamp};
    use rust_decimal_macros::dec;

    const USDC: AssetId = AssetId(1);
    const S1: StrategyId = StrategyId(1);

    fn vault_with_strategy(debt: rust_decimal::Decimal) -> Vault {
        let mut vault = Vault::new(USDC, VaultConfig::default(), EngineConfig::default());
        vault.deposit(AccountId(1), Amount::new(dec!(100_000))).unwrap();

        let mut sim = SimStrategy::new(S1, USDC);
        sim.deposit(Amount::new(debt)).unwrap();
        vault
            .register_strategy(
                Caller::Governance,
                Box::new(sim) as Box<dyn Strategy>,
                S1,
                Bps::new(9000),
                Amount::zero(),
                Amount::zero(),
                None,
            )
            .unwrap();
        vault.ledger.increase_debt(S1, Amount::new(debt)).unwrap();
        vault.ledger.idle_funds = vault
            .ledger
            .idle_funds
            .saturating_sub(Amount::new(debt));
        vault
    }

    #[test]
    fn report_requires_strategy_caller() {
        let mut vault = vault_with_strategy(dec!(90_000));
        let err = vault
            .report(Caller::Governance, Amount::zero(), Amount::zero(), Amount::zero())
            .unwrap_err();
        assert!(matches!(err, VaultError::Unauthorized { .. }));

        let err = vault
            .report(
                Caller::Strategy(StrategyId(99)),
                Amount::zero(),
                Amount::zero(),
                Amount::zero(),
            )
            .unwrap_err();
        assert!(matches!(err, VaultError::Ledger(_)));
    }

    #[test]
    fn gain_report_locks_net_and_mints_fee() {
        let mut vault = vault_with_strategy(dec!(90_000));

        // 10% performance fee on a 5000 gain
        let outcome = vault
            .report(Caller::Strategy(S1), Amount::new(dec!(5000)), Amount::zero(), Amount::zero())
            .unwrap();

        assert_eq!(outcome.performance_fee.value(), dec!(500));
        assert_eq!(vault.ledger().locked_profit.value(), dec!(4500));
        // debt unaffected by a pure gain
        assert_eq!(outcome.new_debt.value(), dec!(90_000));
        // gain landed in idle
        assert_eq!(vault.ledger().idle_funds.value(), dec!(15_000));

        // the fee recipient's claim redeems to the fee amount
        let fee_shares = vault.fee_recipient_shares();
        let claim = profit::amount_for_shares(vault.ledger(), fee_shares, vault.time());
        assert!((claim.value() - dec!(500)).abs() < dec!(0.01), "claim {claim}");
        vault.ledger().assert_reconciled();
    }

    #[test]
    fn loss_report_writes_down_debt() {
        let mut vault = vault_with_strategy(dec!(90_000));

        let outcome = vault
            .report(Caller::Strategy(S1), Amount::zero(), Amount::new(dec!(9000)), Amount::zero())
            .unwrap();

        assert_eq!(outcome.new_debt.value(), dec!(81_000));
        let entry = vault.strategy_entry(S1).unwrap();
        assert_eq!(entry.cumulative_loss.value(), dec!(9000));
        // ratio tightened by the loss share
        assert!(entry.debt_ratio < Bps::new(9000));
        vault.ledger().assert_reconciled();
    }

    #[test]
    fn debt_payment_clamped_to_outstanding() {
        let mut vault = vault_with_strategy(dec!(90_000));
        // nothing outstanding while the ratio covers the debt
        let outcome = vault
            .report(Caller::Strategy(S1), Amount::zero(), Amount::zero(), Amount::new(dec!(50_000)))
            .unwrap();
        assert_eq!(outcome.debt_payment, Amount::zero());
        assert_eq!(outcome.new_debt.value(), dec!(90_000));

        // revoke: all debt outstanding, payment goes through
        vault.revoke_strategy(Caller::Governance, S1).unwrap();
        let outcome = vault
            .report(Caller::Strategy(S1), Amount::zero(), Amount::zero(), Amount::new(dec!(50_000)))
            .unwrap();
        assert_eq!(outcome.debt_payment.value(), dec!(50_000));
        assert_eq!(outcome.new_debt.value(), dec!(40_000));
        vault.ledger().assert_reconciled();
    }

    #[test]
    fn loss_beyond_debt_is_fatal() {
        let mut vault = vault_with_strategy(dec!(1000));
        let err = vault
            .report(Caller::Strategy(S1), Amount::zero(), Amount::new(dec!(1001)), Amount::zero())
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Ledger(crate::ledger::LedgerError::DebtUnderflow { .. })
        ));
    }

    #[test]
    fn fee_clock_separate_from_profit_clock() {
        let mut vault = vault_with_strategy(dec!(90_000));
        vault.set_time(Timestamp::from_secs(SECONDS_PER_YEAR / 2));

        // fee tick advances only the fee clock
        vault.accrue_fees().unwrap();
        assert_eq!(
            vault.ledger().last_fee_accrual,
            Timestamp::from_secs(SECONDS_PER_YEAR / 2)
        );
        assert_eq!(vault.ledger().last_report, Timestamp::from_secs(0));

        // 2% per year on 100k over half a year
        let minted = vault.fee_recipient_shares();
        assert!(!minted.is_zero());
        let claim = profit::amount_for_shares(vault.ledger(), minted, vault.time());
        assert!((claim.value() - dec!(1000)).abs() < dec!(1), "claim {claim}");

        // an immediate second tick accrues nothing but still advances
        let fee = vault.accrue_fees().unwrap();
        assert_eq!(fee, Amount::zero());
    }

    #[test]
    fn zero_fee_tick_still_advances_clock() {
        let mut vault = Vault::new(USDC, VaultConfig::default(), EngineConfig::default());
        // empty vault: no assets, no fee
        vault.set_time(Timestamp::from_secs(1000));
        let fee = vault.accrue_fees().unwrap();
        assert_eq!(fee, Amount::zero());
        assert_eq!(vault.ledger().last_fee_accrual, Timestamp::from_secs(1000));
    }

    #[test]
    fn harvest_feeds_report() {
        let mut vault = Vault::new(USDC, VaultConfig::default(), EngineConfig::default());
        vault.deposit(AccountId(1), Amount::new(dec!(100_000))).unwrap();

        let mut sim = SimStrategy::new(S1, USDC);
        sim.deposit(Amount::new(dec!(90_000))).unwrap();
        sim.accrue_gain(Amount::new(dec!(5000)));
        vault
            .register_strategy(
                Caller::Governance,
                Box::new(sim) as Box<dyn Strategy>,
                S1,
                Bps::new(9000),
                Amount::zero(),
                Amount::zero(),
                None,
            )
            .unwrap();
        vault.ledger.increase_debt(S1, Amount::new(dec!(90_000))).unwrap();
        vault.ledger.idle_funds = Amount::new(dec!(10_000));

        let err = vault.harvest(Caller::Account(AccountId(1)), S1).unwrap_err();
        assert!(matches!(err, VaultError::Unauthorized { .. }));

        let outcome = vault.harvest(Caller::Management, S1).unwrap();
        assert_eq!(outcome.gain.value(), dec!(5000));
        assert_eq!(outcome.performance_fee.value(), dec!(500));
        assert_eq!(vault.ledger().locked_profit.value(), dec!(4500));
    }
}
