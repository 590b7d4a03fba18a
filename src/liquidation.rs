// 5.0 liquidation.rs: greedy multi-strategy withdrawal. drains idle funds
// first, then strategies in strict queue order until the request is satisfied
// or the queue is exhausted. debt decreases only by what actually came back;
// realized loss is written off separately through the ledger's loss hook.
//
// plan_withdrawal is the side-effect-free twin of execute_withdrawal: same
// traversal, same caps, connector previews instead of live calls. shortfall is
// a structured result, never an error — the orchestrator decides what is fatal.

use crate::ledger::{LedgerError, VaultLedger};
use crate::strategy::ConnectorMap;
use crate::types::{Amount, StrategyId};

// one strategy's contribution to a withdrawal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyDrain {
    pub strategy: StrategyId,
    pub requested: Amount,
    pub repaid: Amount,
    pub loss: Amount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalPlan {
    pub requested: Amount,
    // min(total freed, requested)
    pub freed: Amount,
    pub loss: Amount,
    // requested minus freed once the queue is exhausted
    pub shortfall: Amount,
    pub idle_used: Amount,
    pub drains: Vec<StrategyDrain>,
    // strategies whose connector refused; traversal continued past them
    pub skipped: Vec<StrategyId>,
}

impl WithdrawalPlan {
    pub fn is_satisfied(&self) -> bool {
        self.shortfall.is_zero()
    }

    fn empty(requested: Amount) -> Self {
        Self {
            requested,
            freed: Amount::zero(),
            loss: Amount::zero(),
            shortfall: Amount::zero(),
            idle_used: Amount::zero(),
            drains: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

// ceiling for one drain: what is still needed, what the strategy owes, and the
// strategy's own liquidity hint if it offers one.
fn drain_cap(remaining: Amount, debt: Amount, liquidatable: Option<Amount>) -> Amount {
    let mut cap = remaining.min(debt);
    if let Some(liquid) = liquidatable {
        cap = cap.min(liquid);
    }
    cap
}

// 5.1: read-only traversal over connector previews.
pub fn plan_withdrawal(
    ledger: &VaultLedger,
    connectors: &ConnectorMap,
    requested: Amount,
) -> WithdrawalPlan {
    let mut plan = WithdrawalPlan::empty(requested);
    if requested.is_zero() {
        return plan;
    }

    plan.idle_used = ledger.idle_funds.min(requested);
    let mut remaining = requested.saturating_sub(plan.idle_used);

    for id in ledger.queue().iter() {
        if remaining.is_zero() {
            break;
        }
        let Some(entry) = ledger.strategy(id) else {
            continue;
        };
        if entry.debt.is_zero() {
            continue;
        }
        let Some(connector) = connectors.get(&id) else {
            plan.skipped.push(id);
            continue;
        };

        let to_withdraw = drain_cap(remaining, entry.debt, connector.max_liquidatable());
        if to_withdraw.is_zero() {
            continue;
        }

        let loss = match connector.preview_withdraw(to_withdraw) {
            Ok(loss) => loss.min(to_withdraw),
            Err(_) => {
                plan.skipped.push(id);
                continue;
            }
        };
        let repaid = to_withdraw
            .checked_sub(loss)
            .expect("loss clamped to the withdrawn amount");

        plan.drains.push(StrategyDrain {
            strategy: id,
            requested: to_withdraw,
            repaid,
            loss,
        });
        plan.loss = plan.loss.add(loss);
        remaining = remaining.saturating_sub(repaid);
    }

    plan.shortfall = remaining;
    plan.freed = requested.saturating_sub(remaining);
    plan
}

// 5.2: live traversal. identical shape, but repaid funds land in idle, debt is
// decreased by the repaid amount only, and the loss hook writes off the rest.
// a connector failure is skip-and-continue; ledger errors are accounting bugs
// and propagate.
pub fn execute_withdrawal(
    ledger: &mut VaultLedger,
    connectors: &mut ConnectorMap,
    requested: Amount,
) -> Result<WithdrawalPlan, LedgerError> {
    let mut outcome = WithdrawalPlan::empty(requested);
    if requested.is_zero() {
        return Ok(outcome);
    }

    outcome.idle_used = ledger.idle_funds.min(requested);
    let mut remaining = requested.saturating_sub(outcome.idle_used);

    let queue: Vec<StrategyId> = ledger.queue().iter().collect();
    for id in queue {
        if remaining.is_zero() {
            break;
        }
        let Some(entry) = ledger.strategy(id) else {
            continue;
        };
        if entry.debt.is_zero() {
            continue;
        }
        let debt = entry.debt;
        let Some(connector) = connectors.get_mut(&id) else {
            outcome.skipped.push(id);
            continue;
        };

        let to_withdraw = drain_cap(remaining, debt, connector.max_liquidatable());
        if to_withdraw.is_zero() {
            continue;
        }

        let loss = match connector.withdraw(to_withdraw) {
            Ok(loss) => loss.min(to_withdraw),
            Err(_) => {
                outcome.skipped.push(id);
                continue;
            }
        };
        let repaid = to_withdraw
            .checked_sub(loss)
            .expect("loss clamped to the withdrawn amount");

        // the repaid portion returns to idle; the loss never comes back and is
        // written off the strategy's debt through the loss hook.
        ledger.decrease_debt(id, repaid)?;
        ledger.idle_funds = ledger.idle_funds.add(repaid);
        ledger.recognize_loss(id, loss)?;

        outcome.drains.push(StrategyDrain {
            strategy: id,
            requested: to_withdraw,
            repaid,
            loss,
        });
        outcome.loss = outcome.loss.add(loss);
        remaining = remaining.saturating_sub(repaid);
    }

    outcome.shortfall = remaining;
    outcome.freed = requested.saturating_sub(remaining);
    Ok(outcome)
}
