// 8.2 engine/holders.rs: deposit and withdrawal entry points, plus the
// side-effect-free withdrawal previews.

use super::core::Vault;
use super::results::{DepositReceipt, VaultError, WithdrawalOutcome};
use crate::events::{DepositEvent, EventPayload, WithdrawalEvent, WithdrawalRejectedEvent};
use crate::liquidation::{execute_withdrawal, plan_withdrawal, WithdrawalPlan};
use crate::profit;
use crate::types::{AccountId, Amount, Bps};

impl Vault {
    // 8.2.1: deposit. mints shares at the free-funds exchange rate so the
    // depositor cannot capture locked profit.
    pub fn deposit(
        &mut self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<DepositReceipt, VaultError> {
        self.with_guard(|v| {
            if amount.is_zero() {
                return Err(VaultError::ZeroAmount);
            }
            if v.ledger.emergency_shutdown {
                return Err(VaultError::Shutdown);
            }
            let assets = v.ledger.total_assets();
            if assets.add(amount) > v.ledger.deposit_limit {
                return Err(VaultError::DepositLimitExceeded {
                    assets,
                    amount,
                    limit: v.ledger.deposit_limit,
                });
            }

            let shares = profit::shares_for_amount(&v.ledger, amount, v.current_time)
                .ok_or(VaultError::NoExchangeRate)?;

            v.ledger.idle_funds = v.ledger.idle_funds.add(amount);
            v.mint_shares(account_id, shares);

            v.emit_event(EventPayload::Deposit(DepositEvent {
                account_id,
                amount,
                shares_minted: shares,
                new_idle: v.ledger.idle_funds,
            }));

            Ok(DepositReceipt {
                account_id,
                amount,
                shares_minted: shares,
            })
        })
    }

    // 8.2.2: withdrawal. all-or-nothing for the holder: either the full
    // request is freed within the loss gate, or nothing is paid out and no
    // shares burn. the withdrawer bears realized loss (payout = requested -
    // loss); the drained remainder stays in idle, offsetting the debt written
    // off, so remaining holders are unaffected.
    pub fn withdraw(
        &mut self,
        account_id: AccountId,
        amount: Amount,
        max_loss: Option<Bps>,
    ) -> Result<WithdrawalOutcome, VaultError> {
        self.with_guard(|v| {
            if amount.is_zero() {
                // specified no-op
                return Ok(WithdrawalOutcome::noop(account_id));
            }

            // shares priced before liquidation, at the pre-loss rate
            let shares_needed = profit::shares_for_amount(&v.ledger, amount, v.current_time)
                .ok_or(VaultError::NoExchangeRate)?;
            let held = v.account_shares(account_id);
            if held < shares_needed {
                return Err(VaultError::InsufficientShares {
                    needed: shares_needed,
                    held,
                });
            }

            // gate capped at 100%: a loss beyond the full request is never
            // acceptable and would break the payout arithmetic
            let gate = max_loss
                .unwrap_or(v.params.withdrawal_max_loss)
                .min(crate::types::MAX_BPS);
            let loss_limit = amount.mul_bps(gate);

            // deterministic dry run: shortfall or excessive loss aborts before
            // any side effect
            let plan = plan_withdrawal(&v.ledger, &v.connectors, amount);
            if !plan.is_satisfied() {
                v.reject_withdrawal(account_id, amount, "insufficient liquidity");
                return Err(VaultError::InsufficientLiquidity {
                    requested: amount,
                    freed: plan.freed,
                });
            }
            if plan.loss > loss_limit {
                v.reject_withdrawal(account_id, amount, "loss above gate");
                return Err(VaultError::LossLimitExceeded {
                    loss: plan.loss,
                    limit: loss_limit,
                });
            }

            let outcome = execute_withdrawal(&mut v.ledger, &mut v.connectors, amount)?;

            // a connector deviating from its own preview can still leave us
            // short or lossy; the repaid funds already sit in idle and the
            // written-off debt is real, but the holder is not paid and keeps
            // their shares.
            if !outcome.is_satisfied() {
                v.reject_withdrawal(account_id, amount, "insufficient liquidity");
                return Err(VaultError::InsufficientLiquidity {
                    requested: amount,
                    freed: outcome.freed,
                });
            }
            if outcome.loss > loss_limit {
                v.reject_withdrawal(account_id, amount, "loss above gate");
                return Err(VaultError::LossLimitExceeded {
                    loss: outcome.loss,
                    limit: loss_limit,
                });
            }

            let paid_out = outcome
                .freed
                .checked_sub(outcome.loss)
                .expect("loss bounded by freed via the gate");
            v.ledger.idle_funds = v
                .ledger
                .idle_funds
                .checked_sub(paid_out)
                .expect("liquidation freed the payout into idle");
            v.burn_shares(account_id, shares_needed)?;

            v.emit_event(EventPayload::Withdrawal(WithdrawalEvent {
                account_id,
                requested: amount,
                paid_out,
                loss: outcome.loss,
                shares_burned: shares_needed,
            }));

            Ok(WithdrawalOutcome {
                account_id,
                requested: amount,
                paid_out,
                loss: outcome.loss,
                shares_burned: shares_needed,
            })
        })
    }

    // 8.2.3: previews. read-only replays of the exact liquidation traversal;
    // shortfall is data, not an error.
    pub fn preview_withdraw(&self, amount: Amount) -> WithdrawalPlan {
        plan_withdrawal(&self.ledger, &self.connectors, amount)
    }

    pub fn estimate_withdraw_loss(&self, amount: Amount) -> Amount {
        self.preview_withdraw(amount).loss
    }

    fn reject_withdrawal(&mut self, account_id: AccountId, amount: Amount, reason: &str) {
        self.emit_event(EventPayload::WithdrawalRejected(WithdrawalRejectedEvent {
            account_id,
            amount,
            reason: reason.to_string(),
        }));
    }
}
