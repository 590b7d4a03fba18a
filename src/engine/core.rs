// 8.1 engine/core.rs: the vault orchestrator. owns the ledger, the strategy
// connectors, the holder share accounts and the event log. every entry point
// runs to completion under the single-operation guard.

use super::config::EngineConfig;
use super::results::VaultError;
use crate::advisory::AdvisorySource;
use crate::config::{RebalanceParams, VaultConfig, VaultParams};
use crate::events::{
    DebtRatioUpdatedEvent, EmergencyShutdownEvent, Event, EventId, EventPayload,
    QueueReorderedEvent, StrategyRegisteredEvent, StrategyRevokedEvent,
};
use crate::ledger::{LedgerError, StrategyEntry, VaultLedger};
use crate::profit;
use crate::strategy::{ConnectorMap, Strategy};
use crate::types::{AccountId, Amount, AssetId, Bps, Caller, Shares, StrategyId, Timestamp};
use rust_decimal::Decimal;
use std::collections::HashMap;

// the account the management fee claim is minted to
pub(super) const FEE_RECIPIENT: AccountId = AccountId(0);

/** 8.1.1: main orchestrator struct. all state lives here */
#[derive(Debug)]
pub struct Vault {
    pub(super) config: EngineConfig,
    pub(super) params: VaultParams,
    pub(super) rebalance_params: RebalanceParams,
    pub(super) ledger: VaultLedger,
    pub(super) connectors: ConnectorMap,
    pub(super) advisor: Option<Box<dyn AdvisorySource>>,
    pub(super) accounts: HashMap<AccountId, Shares>,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
    pub(super) op_in_progress: bool,
}

impl Vault {
    pub fn new(asset: AssetId, config: VaultConfig, engine: EngineConfig) -> Self {
        let start = Timestamp::from_secs(0);
        let mut ledger = VaultLedger::new(asset, start);
        ledger.deposit_limit = config.vault.deposit_limit;
        ledger.performance_fee = config.vault.performance_fee;
        ledger.management_fee = config.vault.management_fee;
        ledger.locked_profit_degradation = config.vault.locked_profit_degradation;

        Self {
            config: engine,
            params: config.vault,
            rebalance_params: config.rebalance,
            ledger,
            connectors: ConnectorMap::new(),
            advisor: None,
            accounts: HashMap::new(),
            events: Vec::new(),
            next_event_id: 1,
            current_time: start,
            op_in_progress: false,
        }
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, secs: i64) {
        self.current_time = Timestamp::from_secs(self.current_time.as_secs() + secs);
    }

    pub fn set_advisor(&mut self, advisor: Box<dyn AdvisorySource>) {
        self.advisor = Some(advisor);
    }

    // 8.1.2: read access.

    pub fn ledger(&self) -> &VaultLedger {
        &self.ledger
    }

    pub fn total_assets(&self) -> Amount {
        self.ledger.total_assets()
    }

    pub fn free_funds(&self) -> Amount {
        profit::free_funds(&self.ledger, self.current_time)
    }

    pub fn account_shares(&self, account_id: AccountId) -> Shares {
        self.accounts.get(&account_id).copied().unwrap_or(Shares::zero())
    }

    pub fn fee_recipient_shares(&self) -> Shares {
        self.account_shares(FEE_RECIPIENT)
    }

    pub fn strategy_entry(&self, id: StrategyId) -> Option<&StrategyEntry> {
        self.ledger.strategy(id)
    }

    pub fn connector(&self, id: StrategyId) -> Option<&dyn Strategy> {
        self.connectors.get(&id).map(|b| b.as_ref())
    }

    pub fn credit_available(&self, id: StrategyId) -> Amount {
        self.ledger.credit_available(id)
    }

    pub fn debt_outstanding(&self, id: StrategyId) -> Amount {
        self.ledger.debt_outstanding(id)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    // 8.1.3: strategy lifecycle (governance only).

    pub fn register_strategy(
        &mut self,
        caller: Caller,
        connector: Box<dyn Strategy>,
        id: StrategyId,
        debt_ratio: Bps,
        min_debt_per_op: Amount,
        max_debt_per_op: Amount,
        fee_override: Option<Bps>,
    ) -> Result<(), VaultError> {
        self.require_governance(caller)?;
        self.ledger.register(
            id,
            debt_ratio,
            min_debt_per_op,
            max_debt_per_op,
            fee_override,
            connector.underlying_asset(),
            self.params.max_fee_override,
            self.current_time,
        )?;
        self.connectors.insert(id, connector);
        self.emit_event(EventPayload::StrategyRegistered(StrategyRegisteredEvent {
            strategy: id,
            debt_ratio,
            fee_override,
        }));
        Ok(())
    }

    pub fn update_debt_ratio(
        &mut self,
        caller: Caller,
        id: StrategyId,
        new_ratio: Bps,
    ) -> Result<(), VaultError> {
        self.require_governance(caller)?;
        let old_ratio = self
            .ledger
            .strategy(id)
            .map(|e| e.debt_ratio)
            .unwrap_or(Bps::zero());
        self.ledger.update_ratio(id, new_ratio)?;
        self.emit_event(EventPayload::DebtRatioUpdated(DebtRatioUpdatedEvent {
            strategy: id,
            old_ratio,
            new_ratio,
        }));
        Ok(())
    }

    // zeroes the ratio; debt stays on the books until liquidated.
    pub fn revoke_strategy(&mut self, caller: Caller, id: StrategyId) -> Result<(), VaultError> {
        self.require_governance(caller)?;
        let released = self
            .ledger
            .strategy(id)
            .map(|e| e.debt_ratio)
            .unwrap_or(Bps::zero());
        self.ledger.revoke(id)?;
        let remaining_debt = self
            .ledger
            .strategy(id)
            .map(|e| e.debt)
            .unwrap_or(Amount::zero());
        self.emit_event(EventPayload::StrategyRevoked(StrategyRevokedEvent {
            strategy: id,
            released_ratio: released,
            remaining_debt,
        }));
        Ok(())
    }

    // hard removal once the debt is fully liquidated.
    pub fn remove_strategy(&mut self, caller: Caller, id: StrategyId) -> Result<(), VaultError> {
        self.require_governance(caller)?;
        self.ledger.remove(id)?;
        self.connectors.remove(&id);
        Ok(())
    }

    pub fn set_withdrawal_queue(
        &mut self,
        caller: Caller,
        order: Vec<StrategyId>,
    ) -> Result<(), VaultError> {
        self.require_governance(caller)?;
        self.ledger.set_queue_order(order.clone())?;
        self.emit_event(EventPayload::QueueReordered(QueueReorderedEvent { order }));
        Ok(())
    }

    pub fn remove_from_queue(&mut self, caller: Caller, id: StrategyId) -> Result<(), VaultError> {
        self.require_governance(caller)?;
        self.ledger.remove_from_queue(id)?;
        Ok(())
    }

    // 8.1.4: vault policy (governance only).

    pub fn set_deposit_limit(&mut self, caller: Caller, limit: Amount) -> Result<(), VaultError> {
        self.require_governance(caller)?;
        self.ledger.deposit_limit = limit;
        self.params.deposit_limit = limit;
        Ok(())
    }

    pub fn set_fees(
        &mut self,
        caller: Caller,
        performance_fee: Bps,
        management_fee: Bps,
    ) -> Result<(), VaultError> {
        self.require_governance(caller)?;
        self.ledger.performance_fee = performance_fee;
        self.ledger.management_fee = management_fee;
        self.params.performance_fee = performance_fee;
        self.params.management_fee = management_fee;
        Ok(())
    }

    pub fn set_locked_profit_degradation(
        &mut self,
        caller: Caller,
        rate: Decimal,
    ) -> Result<(), VaultError> {
        self.require_governance(caller)?;
        self.ledger.locked_profit_degradation = rate;
        self.params.locked_profit_degradation = rate;
        Ok(())
    }

    pub fn set_fee_override(
        &mut self,
        caller: Caller,
        id: StrategyId,
        fee_override: Option<Bps>,
    ) -> Result<(), VaultError> {
        self.require_governance(caller)?;
        if let Some(fee) = fee_override {
            if fee > self.params.max_fee_override {
                return Err(VaultError::Ledger(LedgerError::FeeOverrideTooHigh {
                    requested: fee,
                    cap: self.params.max_fee_override,
                }));
            }
        }
        let entry = self
            .ledger
            .strategy_mut(id)
            .ok_or(VaultError::Ledger(LedgerError::NotRegistered(id)))?;
        entry.fee_override = fee_override;
        Ok(())
    }

    pub fn set_emergency_shutdown(&mut self, caller: Caller, active: bool) -> Result<(), VaultError> {
        self.require_governance(caller)?;
        self.ledger.emergency_shutdown = active;
        self.emit_event(EventPayload::EmergencyShutdown(EmergencyShutdownEvent {
            active,
        }));
        Ok(())
    }

    // 8.1.5: shared plumbing.

    pub(super) fn require_governance(&self, caller: Caller) -> Result<(), VaultError> {
        match caller {
            Caller::Governance => Ok(()),
            _ => Err(VaultError::Unauthorized {
                required: "governance",
            }),
        }
    }

    pub(super) fn require_privileged(&self, caller: Caller) -> Result<(), VaultError> {
        if caller.is_privileged() {
            Ok(())
        } else {
            Err(VaultError::Unauthorized {
                required: "management",
            })
        }
    }

    // single-operation guard. every mutating entry point runs inside this so a
    // collaborator calling back into the vault mid-operation is rejected
    // instead of observing half-updated ledger values.
    pub(super) fn with_guard<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        if self.op_in_progress {
            return Err(VaultError::OperationInProgress);
        }
        self.op_in_progress = true;
        let result = f(self);
        self.op_in_progress = false;
        result
    }

    pub(super) fn mint_shares(&mut self, account_id: AccountId, shares: Shares) {
        if shares.is_zero() {
            return;
        }
        let balance = self.accounts.entry(account_id).or_insert(Shares::zero());
        *balance = balance.add(shares);
        self.ledger.total_shares = self.ledger.total_shares.add(shares);
    }

    pub(super) fn burn_shares(
        &mut self,
        account_id: AccountId,
        shares: Shares,
    ) -> Result<(), VaultError> {
        let held = self.account_shares(account_id);
        let remaining = held
            .checked_sub(shares)
            .ok_or(VaultError::InsufficientShares {
                needed: shares,
                held,
            })?;
        self.accounts.insert(account_id, remaining);
        self.ledger.total_shares = self
            .ledger
            .total_shares
            .checked_sub(shares)
            .expect("total supply covers every balance");
        Ok(())
    }

    // deterministic strategy iteration order: queue order first, then any
    // registered strategy that fell out of the queue, by id.
    pub(super) fn ordered_strategies(&self) -> Vec<StrategyId> {
        let mut out: Vec<StrategyId> = self.ledger.queue().iter().collect();
        let mut stragglers: Vec<StrategyId> = self
            .ledger
            .strategies()
            .map(|e| e.id)
            .filter(|id| !out.contains(id))
            .collect();
        stragglers.sort_by_key(|id| id.0);
        out.extend(stragglers);
        out
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            println!("[Event {}] {:?}", event.id.0, event.payload);
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
