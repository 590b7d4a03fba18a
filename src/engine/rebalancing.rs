// 8.4 engine/rebalancing.rs: advisory-driven rebalancing. target computation
// goes through the pure allocation pipeline; execution runs shrink first, then
// winds down strategies outside the target set, then grows into the targets
// within governance caps. the realized-loss budget is enforced twice: a
// preview dry run aborts before any side effect, and a live overshoot (a
// connector deviating from its own preview) restores the ledger snapshot and
// compensates the moved funds.

use super::core::Vault;
use super::results::{RebalanceOutcome, RebalanceSignal, VaultError};
use crate::advisory::{filter_quotes, FilteredQuotes, YieldQuote};
use crate::allocation::{compute_plan, weighted_apy, AllocationPlan, ScoreInput};
use crate::events::{EventPayload, QuoteRejectedEvent, RebalanceExecutedEvent};
use crate::ledger::VaultLedger;
use crate::types::{Amount, Bps, Caller, StrategyId};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

// external moves already executed, for compensation on abort
enum JournalEntry {
    Withdrew { strategy: StrategyId, repaid: Amount },
    Deposited { strategy: StrategyId, amount: Amount },
}

impl Vault {
    // 8.4.1: trigger heuristic. purely advisory: failures and thin data
    // default to "no", never to an error.
    pub fn should_rebalance(&self) -> RebalanceSignal {
        if self.ledger.emergency_shutdown {
            return RebalanceSignal::negative();
        }
        let elapsed = self.ledger.last_rebalance.elapsed_secs(self.current_time);
        if elapsed < self.rebalance_params.min_interval_secs {
            return RebalanceSignal::negative();
        }
        let Some(filtered) = self.fresh_quotes() else {
            return RebalanceSignal::negative();
        };
        if filtered.accepted.is_empty() {
            return RebalanceSignal::negative();
        }

        // coverage gate: enough of the deployed debt must be quote-covered
        // before the improvement number means anything
        let total_debt = self.ledger.total_debt();
        if !total_debt.is_zero() {
            let covered: Amount = filtered
                .accepted
                .iter()
                .filter_map(|(id, _)| self.ledger.strategy(*id))
                .map(|e| e.debt)
                .sum();
            let coverage = covered.value() / total_debt.value();
            if coverage < self.rebalance_params.min_coverage.as_fraction() {
                return RebalanceSignal::negative();
            }
        }

        let plan = self.plan_from(&filtered);
        if plan.is_empty() {
            return RebalanceSignal::negative();
        }

        let improvement_bps = self.projected_improvement_bps(&filtered, &plan);
        RebalanceSignal {
            beneficial: improvement_bps >= self.rebalance_params.min_improvement.value() as i64,
            improvement_bps,
        }
    }

    // 8.4.2: execution.
    pub fn execute_rebalance(&mut self, caller: Caller) -> Result<RebalanceOutcome, VaultError> {
        self.with_guard(|v| {
            v.require_privileged(caller)?;

            let now = v.current_time;
            let elapsed = v.ledger.last_rebalance.elapsed_secs(now);
            if elapsed < v.rebalance_params.min_interval_secs {
                return Err(VaultError::RateLimited {
                    remaining_secs: v.rebalance_params.min_interval_secs - elapsed,
                });
            }

            let filtered = v.fresh_quotes().ok_or(VaultError::NoViableTargets)?;
            for (strategy, reason) in &filtered.rejected {
                v.emit_event(EventPayload::QuoteRejected(QuoteRejectedEvent {
                    strategy: *strategy,
                    reason: *reason,
                }));
            }
            if filtered.accepted.is_empty() {
                return Err(VaultError::NoViableTargets);
            }

            let plan = v.plan_from(&filtered);
            if plan.is_empty() {
                return Err(VaultError::NoViableTargets);
            }

            let total_assets = v.ledger.total_assets();
            let budget = total_assets.mul_bps(v.rebalance_params.max_loss);

            // phase 1 worklist: every strategy above its capped desired debt,
            // in deterministic order. strategies outside the plan wind to zero.
            let mut shrinks: Vec<(StrategyId, Amount)> = Vec::new();
            let mut wound_down: Vec<StrategyId> = Vec::new();
            for id in v.ordered_strategies() {
                let Some(entry) = v.ledger.strategy(id) else {
                    continue;
                };
                let desired = desired_debt(&plan, total_assets, id, entry.debt_ratio);
                if entry.debt > desired {
                    let delta = entry
                        .debt
                        .checked_sub(desired)
                        .expect("debt above desired");
                    shrinks.push((id, delta));
                    if !plan.contains(id) {
                        wound_down.push(id);
                    }
                }
            }

            // dry run: projected losses against the budget, no side effects
            let mut projected_loss = Amount::zero();
            for (id, delta) in &shrinks {
                let Some(connector) = v.connectors.get(id) else {
                    continue;
                };
                let amount = shrink_amount(*delta, connector.max_liquidatable());
                if amount.is_zero() {
                    continue;
                }
                let loss = connector
                    .preview_withdraw(amount)
                    .map_err(|source| VaultError::StrategyFailure {
                        strategy: *id,
                        source,
                    })?;
                projected_loss = projected_loss.add(loss.min(amount));
            }
            if projected_loss > budget {
                return Err(VaultError::RebalanceLossExceeded {
                    loss: projected_loss,
                    budget,
                });
            }

            // live shrink + wind-down
            let snapshot = v.ledger.clone();
            let mut journal: Vec<JournalEntry> = Vec::new();
            let mut total_loss = Amount::zero();
            let mut moved_out = Amount::zero();

            for (id, delta) in &shrinks {
                let Some(connector) = v.connectors.get_mut(id) else {
                    continue;
                };
                let amount = shrink_amount(*delta, connector.max_liquidatable());
                if amount.is_zero() {
                    continue;
                }
                let loss = match connector.withdraw(amount) {
                    Ok(loss) => loss.min(amount),
                    Err(source) => {
                        v.rollback_rebalance(&snapshot, &journal);
                        return Err(VaultError::StrategyFailure {
                            strategy: *id,
                            source,
                        });
                    }
                };
                let repaid = amount
                    .checked_sub(loss)
                    .expect("loss clamped to the withdrawn amount");
                v.ledger.decrease_debt(*id, repaid)?;
                v.ledger.idle_funds = v.ledger.idle_funds.add(repaid);
                v.ledger.recognize_loss(*id, loss)?;
                journal.push(JournalEntry::Withdrew {
                    strategy: *id,
                    repaid,
                });
                moved_out = moved_out.add(repaid);
                total_loss = total_loss.add(loss);

                if total_loss > budget {
                    v.rollback_rebalance(&snapshot, &journal);
                    return Err(VaultError::RebalanceLossExceeded {
                        loss: total_loss,
                        budget,
                    });
                }
            }

            // phase 2: grow into targets within credit limits
            let mut moved_in = Amount::zero();
            let targets: Vec<(StrategyId, Bps)> = plan.iter().collect();
            for (id, _) in targets {
                let Some(entry) = v.ledger.strategy(id) else {
                    continue;
                };
                let desired = desired_debt(&plan, total_assets, id, entry.debt_ratio);
                if desired <= entry.debt {
                    continue;
                }
                let delta = desired
                    .checked_sub(entry.debt)
                    .expect("desired above debt");
                let amount = delta.min(v.ledger.credit_available(id));
                if amount.is_zero() {
                    continue;
                }
                let Some(connector) = v.connectors.get_mut(&id) else {
                    continue;
                };
                // best-effort status flags: an inactive or exiting strategy
                // is skipped, never grown
                if !connector.is_active() || connector.emergency_exit() {
                    continue;
                }
                if let Err(source) = connector.deposit(amount) {
                    v.rollback_rebalance(&snapshot, &journal);
                    return Err(VaultError::StrategyFailure {
                        strategy: id,
                        source,
                    });
                }
                v.ledger.increase_debt(id, amount)?;
                v.ledger.idle_funds = v
                    .ledger
                    .idle_funds
                    .checked_sub(amount)
                    .expect("credit available is bounded by idle");
                journal.push(JournalEntry::Deposited {
                    strategy: id,
                    amount,
                });
                moved_in = moved_in.add(amount);
            }

            // the rebalance is committed: refresh the cached advisory view
            for (id, quote) in &filtered.accepted {
                if let Some(entry) = v.ledger.strategy_mut(*id) {
                    entry.cached_apy = Some(quote.apy);
                    entry.cached_risk_score = Some(quote.risk_score);
                }
            }

            v.ledger.last_rebalance = now;
            v.emit_event(EventPayload::RebalanceExecuted(RebalanceExecutedEvent {
                moved_out,
                moved_in,
                loss: total_loss,
                target_count: plan.len(),
            }));

            Ok(RebalanceOutcome {
                targets: plan,
                moved_out,
                moved_in,
                loss: total_loss,
                wound_down,
            })
        })
    }

    // 8.4.3: shared helpers.

    // fetch and filter the advisory view. None when the source is missing,
    // unreachable or empty.
    fn fresh_quotes(&self) -> Option<FilteredQuotes> {
        let advisor = self.advisor.as_ref()?;
        let asset = self.ledger.asset;
        let candidates = advisor.candidates(asset).ok()?;
        let max_age = advisor.max_quote_age(asset);
        Some(filter_quotes(
            &candidates,
            self.current_time,
            max_age,
            self.rebalance_params.min_confidence,
            |id| self.ledger.is_registered(id),
        ))
    }

    fn plan_from(&self, filtered: &FilteredQuotes) -> AllocationPlan {
        let inputs: Vec<ScoreInput> = filtered
            .accepted
            .iter()
            .map(|(id, q)| ScoreInput {
                strategy: *id,
                apy: q.apy,
                risk_score: q.risk_score,
                confidence: q.confidence,
            })
            .collect();
        compute_plan(
            &inputs,
            self.rebalance_params.score_power,
            self.rebalance_params.max_allocation,
            self.rebalance_params.dust_threshold,
        )
    }

    // projected blended yield of the plan minus the blended yield of the
    // current deployment, in bps. idle funds count as zero-yield weight on
    // both sides.
    fn projected_improvement_bps(&self, filtered: &FilteredQuotes, plan: &AllocationPlan) -> i64 {
        let total_assets = self.ledger.total_assets();
        if total_assets.is_zero() {
            return 0;
        }
        let quoted: HashMap<StrategyId, YieldQuote> =
            filtered.accepted.iter().map(|(id, q)| (*id, *q)).collect();

        let apy_of = |id: StrategyId| -> Decimal {
            quoted
                .get(&id)
                .map(|q| q.apy)
                .or_else(|| self.ledger.strategy(id).and_then(|e| e.cached_apy))
                .unwrap_or(Decimal::ZERO)
        };

        let current = weighted_apy(
            self.ledger
                .strategies()
                .map(|e| (e.debt.value(), apy_of(e.id)))
                .chain(std::iter::once((
                    self.ledger.idle_funds.value(),
                    Decimal::ZERO,
                ))),
        );

        let projected = weighted_apy(plan.iter().map(|(id, target)| {
            let capped = self
                .ledger
                .strategy(id)
                .map(|e| if target > e.debt_ratio { e.debt_ratio } else { target })
                .unwrap_or(Bps::zero());
            (
                total_assets.mul_bps(capped).value(),
                apy_of(id),
            )
        }).chain(std::iter::once((
            // whatever the plan leaves undeployed stays idle at zero yield
            total_assets
                .saturating_sub(self.planned_deployment(plan, total_assets))
                .value(),
            Decimal::ZERO,
        ))));

        ((projected - current) * Decimal::from(10_000))
            .floor()
            .to_i64()
            .unwrap_or(0)
    }

    fn planned_deployment(&self, plan: &AllocationPlan, total_assets: Amount) -> Amount {
        plan.iter()
            .map(|(id, target)| {
                let capped = self
                    .ledger
                    .strategy(id)
                    .map(|e| if target > e.debt_ratio { e.debt_ratio } else { target })
                    .unwrap_or(Bps::zero());
                total_assets.mul_bps(capped)
            })
            .sum()
    }

    // restore the pre-rebalance ledger and compensate the external moves that
    // already happened. compensation is best effort: the funds exist (they
    // were just moved), and a connector refusing them cannot be helped here.
    fn rollback_rebalance(&mut self, snapshot: &VaultLedger, journal: &[JournalEntry]) {
        self.ledger = snapshot.clone();
        for entry in journal {
            match entry {
                JournalEntry::Withdrew { strategy, repaid } => {
                    if let Some(connector) = self.connectors.get_mut(strategy) {
                        let _ = connector.deposit(*repaid);
                    }
                }
                JournalEntry::Deposited { strategy, amount } => {
                    if let Some(connector) = self.connectors.get_mut(strategy) {
                        let _ = connector.withdraw(*amount);
                    }
                }
            }
        }
    }
}

// capped desired debt: totalAssets * min(target, governance ratio) / 10_000.
// the engine never plans a strategy past its governance cap.
fn desired_debt(
    plan: &AllocationPlan,
    total_assets: Amount,
    id: StrategyId,
    governance_ratio: Bps,
) -> Amount {
    match plan.target(id) {
        Some(target) => {
            let capped = if target > governance_ratio {
                governance_ratio
            } else {
                target
            };
            total_assets.mul_bps(capped)
        }
        None => Amount::zero(),
    }
}

fn shrink_amount(delta: Amount, liquidatable: Option<Amount>) -> Amount {
    match liquidatable {
        Some(cap) => delta.min(cap),
        None => delta,
    }
}
