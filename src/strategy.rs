// 9.0 strategy.rs: the external strategy capability. the orchestrator treats
// strategies as adversarial and fallible, reachable only through this narrow
// trait. SimStrategy is the deterministic in-tree implementation used by the
// simulation binary and the test suites.

use crate::types::{Amount, AssetId, Bps, StrategyId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// connector table owned by the orchestrator, keyed by strategy identity
pub type ConnectorMap = HashMap<StrategyId, Box<dyn Strategy>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrategyError {
    #[error("strategy is halted")]
    Halted,

    #[error("withdrawal failed: {0}")]
    WithdrawFailed(String),

    #[error("harvest failed: {0}")]
    HarvestFailed(String),
}

// what a harvest reports back into the vault: realized gain, realized loss,
// and how much outstanding debt the strategy is returning alongside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarvestReport {
    pub gain: Amount,
    pub loss: Amount,
    pub debt_repayment: Amount,
}

// 9.1: the consumed capability surface. withdraw returns the realized loss;
// the freed amount is the requested amount minus that loss. preview_withdraw
// must be deterministic, side-effect free, and agree with withdraw (including
// failing when withdraw would fail) so vault previews can replay the exact
// liquidation traversal.
pub trait Strategy: fmt::Debug {
    fn underlying_asset(&self) -> AssetId;

    fn estimated_total_assets(&self) -> Amount;

    fn withdraw(&mut self, amount: Amount) -> Result<Amount, StrategyError>;

    fn preview_withdraw(&self, amount: Amount) -> Result<Amount, StrategyError>;

    fn deposit(&mut self, amount: Amount) -> Result<(), StrategyError>;

    fn harvest(&mut self) -> Result<HarvestReport, StrategyError>;

    // best-effort ceiling on how much can be liquidated in one call.
    // None = the strategy offers no hint.
    fn max_liquidatable(&self) -> Option<Amount> {
        None
    }

    // best-effort status flags. failures to answer default to "active".
    fn is_active(&self) -> bool {
        true
    }

    fn emergency_exit(&self) -> bool {
        false
    }
}

// 9.2: deterministic simulated strategy. realized withdrawal loss is a fixed
// bps slippage so previews and live calls always agree; yield is injected by
// the scenario driver via accrue_gain / incur_loss.
#[derive(Debug, Clone)]
pub struct SimStrategy {
    pub id: StrategyId,
    asset: AssetId,
    balance: Amount,
    withdrawal_loss: Bps,
    liquidity_cap: Option<Amount>,
    pending_gain: Amount,
    pending_loss: Amount,
    active: bool,
    fail_withdrawals: bool,
}

impl SimStrategy {
    pub fn new(id: StrategyId, asset: AssetId) -> Self {
        Self {
            id,
            asset,
            balance: Amount::zero(),
            withdrawal_loss: Bps::zero(),
            liquidity_cap: None,
            pending_gain: Amount::zero(),
            pending_loss: Amount::zero(),
            active: true,
            fail_withdrawals: false,
        }
    }

    pub fn with_withdrawal_loss(mut self, loss: Bps) -> Self {
        self.withdrawal_loss = loss;
        self
    }

    pub fn with_liquidity_cap(mut self, cap: Amount) -> Self {
        self.liquidity_cap = Some(cap);
        self
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    // scenario hooks
    pub fn accrue_gain(&mut self, gain: Amount) {
        self.pending_gain = self.pending_gain.add(gain);
        self.balance = self.balance.add(gain);
    }

    pub fn incur_loss(&mut self, loss: Amount) {
        self.pending_loss = self.pending_loss.add(loss);
        self.balance = self.balance.saturating_sub(loss);
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn set_fail_withdrawals(&mut self, fail: bool) {
        self.fail_withdrawals = fail;
    }

    pub fn set_liquidity_cap(&mut self, cap: Option<Amount>) {
        self.liquidity_cap = cap;
    }
}

impl Strategy for SimStrategy {
    fn underlying_asset(&self) -> AssetId {
        self.asset
    }

    fn estimated_total_assets(&self) -> Amount {
        self.balance
    }

    fn withdraw(&mut self, amount: Amount) -> Result<Amount, StrategyError> {
        if self.fail_withdrawals {
            return Err(StrategyError::WithdrawFailed("simulated failure".to_string()));
        }
        let loss = amount.mul_bps(self.withdrawal_loss);
        self.balance = self.balance.saturating_sub(amount);
        Ok(loss)
    }

    fn preview_withdraw(&self, amount: Amount) -> Result<Amount, StrategyError> {
        if self.fail_withdrawals {
            return Err(StrategyError::WithdrawFailed("simulated failure".to_string()));
        }
        Ok(amount.mul_bps(self.withdrawal_loss))
    }

    fn deposit(&mut self, amount: Amount) -> Result<(), StrategyError> {
        self.balance = self.balance.add(amount);
        Ok(())
    }

    fn harvest(&mut self) -> Result<HarvestReport, StrategyError> {
        let report = HarvestReport {
            gain: self.pending_gain,
            loss: self.pending_loss,
            debt_repayment: Amount::zero(),
        };
        // harvested gain is transferred out to the vault
        self.balance = self.balance.saturating_sub(self.pending_gain);
        self.pending_gain = Amount::zero();
        self.pending_loss = Amount::zero();
        Ok(report)
    }

    fn max_liquidatable(&self) -> Option<Amount> {
        self.liquidity_cap
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn preview_matches_withdraw() {
        let mut strategy = SimStrategy::new(StrategyId(1), AssetId(1))
            .with_withdrawal_loss(Bps::new(50)); // 0.5% slippage
        strategy.deposit(Amount::new(dec!(10_000))).unwrap();

        let amount = Amount::new(dec!(4000));
        let previewed = strategy.preview_withdraw(amount).unwrap();
        let realized = strategy.withdraw(amount).unwrap();

        assert_eq!(previewed, realized);
        assert_eq!(realized.value(), dec!(20));
        assert_eq!(strategy.balance().value(), dec!(6000));
    }

    #[test]
    fn harvest_clears_pending() {
        let mut strategy = SimStrategy::new(StrategyId(1), AssetId(1));
        strategy.deposit(Amount::new(dec!(10_000))).unwrap();
        strategy.accrue_gain(Amount::new(dec!(500)));
        strategy.incur_loss(Amount::new(dec!(100)));

        let report = strategy.harvest().unwrap();
        assert_eq!(report.gain.value(), dec!(500));
        assert_eq!(report.loss.value(), dec!(100));

        // gain left with the harvest, loss already burned off the balance
        assert_eq!(strategy.balance().value(), dec!(9900));

        let second = strategy.harvest().unwrap();
        assert_eq!(second.gain, Amount::zero());
        assert_eq!(second.loss, Amount::zero());
    }

    #[test]
    fn failed_withdrawal_surfaces() {
        let mut strategy = SimStrategy::new(StrategyId(1), AssetId(1));
        strategy.deposit(Amount::new(dec!(1000))).unwrap();
        strategy.set_fail_withdrawals(true);

        assert!(strategy.withdraw(Amount::new(dec!(100))).is_err());
        // previews fail the same way the live call would
        assert!(strategy.preview_withdraw(Amount::new(dec!(100))).is_err());
    }
}
