// 6.0 profit.rs: locked-profit decay, free funds and share exchange math.
// reported gain is locked and unlocks linearly over the degradation window, so
// a deposit landing right after a fat report cannot capture the gain, and a
// withdrawal right before it cannot dodge dilution. all exchange-rate math
// runs on free funds, never raw total assets.

use crate::ledger::VaultLedger;
use crate::types::{Amount, Bps, Shares, Timestamp};
use rust_decimal::Decimal;

// 365.2425 days
pub const SECONDS_PER_YEAR: i64 = 31_556_952;

// 6.1: remaining locked profit after linear decay since the last report.
// remaining = locked * max(0, 1 - elapsed * rate); fully unlocked once
// elapsed * rate reaches 1.
pub fn locked_profit_remaining(ledger: &VaultLedger, now: Timestamp) -> Amount {
    if ledger.locked_profit.is_zero() {
        return Amount::zero();
    }
    let unlocked = ledger.last_report.elapsed_decimal(now) * ledger.locked_profit_degradation;
    if unlocked >= Decimal::ONE {
        return Amount::zero();
    }
    ledger.locked_profit.mul(Decimal::ONE - unlocked)
}

// total assets minus whatever is still locked. the basis for every share
// conversion.
pub fn free_funds(ledger: &VaultLedger, now: Timestamp) -> Amount {
    ledger
        .total_assets()
        .saturating_sub(locked_profit_remaining(ledger, now))
}

// 6.2: share conversions.

// shares minted for a deposit. 1:1 on an empty vault; None when shares exist
// but free funds are zero (the vault is worthless and no fair rate exists).
pub fn shares_for_amount(ledger: &VaultLedger, amount: Amount, now: Timestamp) -> Option<Shares> {
    if ledger.total_shares.is_zero() {
        return Some(Shares::new(amount.value()));
    }
    let free = free_funds(ledger, now);
    if free.is_zero() {
        return None;
    }
    Some(Shares::new(
        amount.value() * ledger.total_shares.value() / free.value(),
    ))
}

pub fn amount_for_shares(ledger: &VaultLedger, shares: Shares, now: Timestamp) -> Amount {
    if ledger.total_shares.is_zero() {
        return Amount::zero();
    }
    let free = free_funds(ledger, now);
    Amount::new(shares.value() * free.value() / ledger.total_shares.value())
}

// shares minted for a fee claim, sized so the recipient's claim equals the fee
// amount at the post-mint exchange rate: shares = fee * supply / (free - fee).
// falls back to 1:1 when the vault is empty or the fee swallows all free funds.
pub fn fee_shares_for(ledger: &VaultLedger, fee: Amount, now: Timestamp) -> Shares {
    if fee.is_zero() {
        return Shares::zero();
    }
    let free = free_funds(ledger, now);
    if ledger.total_shares.is_zero() || free <= fee {
        return Shares::new(fee.value());
    }
    let basis = free
        .checked_sub(fee)
        .expect("fee strictly below free funds");
    Shares::new(fee.value() * ledger.total_shares.value() / basis.value())
}

// 6.3: fee math. the management fee runs on its own clock
// (last_fee_accrual), distinct from the profit-lock clock (last_report).
pub fn management_fee_due(ledger: &VaultLedger, now: Timestamp) -> Amount {
    if ledger.management_fee.is_zero() {
        return Amount::zero();
    }
    let elapsed = ledger.last_fee_accrual.elapsed_decimal(now);
    if elapsed.is_zero() {
        return Amount::zero();
    }
    ledger
        .total_assets()
        .mul_bps(ledger.management_fee)
        .mul(elapsed / Decimal::from(SECONDS_PER_YEAR))
}

pub fn performance_fee_on(gain: Amount, fee: Bps) -> Amount {
    gain.mul_bps(fee)
}

// 6.4: lock a net gain: re-base the decayed remainder first, then add. the
// caller advances last_report afterwards, restarting the decay window.
pub fn lock_gain(ledger: &mut VaultLedger, net_gain: Amount, now: Timestamp) {
    let remaining = locked_profit_remaining(ledger, now);
    ledger.locked_profit = remaining.add(net_gain);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetId;
    use rust_decimal_macros::dec;

    fn ledger_at(t: i64) -> VaultLedger {
        let mut ledger = VaultLedger::new(AssetId(1), Timestamp::from_secs(t));
        // full unlock over 1000 seconds
        ledger.locked_profit_degradation = dec!(0.001);
        ledger
    }

    #[test]
    fn locked_profit_decays_linearly() {
        let mut ledger = ledger_at(0);
        ledger.locked_profit = Amount::new(dec!(1000));

        assert_eq!(
            locked_profit_remaining(&ledger, Timestamp::from_secs(0)).value(),
            dec!(1000)
        );
        assert_eq!(
            locked_profit_remaining(&ledger, Timestamp::from_secs(500)).value(),
            dec!(500)
        );
        assert_eq!(
            locked_profit_remaining(&ledger, Timestamp::from_secs(1000)),
            Amount::zero()
        );
        // past the window stays at zero
        assert_eq!(
            locked_profit_remaining(&ledger, Timestamp::from_secs(5000)),
            Amount::zero()
        );
    }

    #[test]
    fn free_funds_excludes_locked() {
        let mut ledger = ledger_at(0);
        ledger.idle_funds = Amount::new(dec!(10_000));
        ledger.locked_profit = Amount::new(dec!(1000));

        assert_eq!(free_funds(&ledger, Timestamp::from_secs(0)).value(), dec!(9000));
        assert_eq!(
            free_funds(&ledger, Timestamp::from_secs(500)).value(),
            dec!(9500)
        );
        assert_eq!(
            free_funds(&ledger, Timestamp::from_secs(1000)).value(),
            dec!(10_000)
        );
    }

    #[test]
    fn first_deposit_mints_one_to_one() {
        let ledger = ledger_at(0);
        let shares =
            shares_for_amount(&ledger, Amount::new(dec!(5000)), Timestamp::from_secs(0)).unwrap();
        assert_eq!(shares.value(), dec!(5000));
    }

    #[test]
    fn second_deposit_prices_against_free_funds() {
        let mut ledger = ledger_at(0);
        ledger.idle_funds = Amount::new(dec!(10_000));
        ledger.total_shares = Shares::new(dec!(10_000));
        ledger.locked_profit = Amount::new(dec!(2000));

        // free funds = 8000, so 4000 buys half the outstanding supply
        let shares =
            shares_for_amount(&ledger, Amount::new(dec!(4000)), Timestamp::from_secs(0)).unwrap();
        assert_eq!(shares.value(), dec!(5000));

        // and redeeming those shares at the same instant returns the deposit
        let mut after = ledger.clone();
        after.total_shares = after.total_shares.add(shares);
        after.idle_funds = after.idle_funds.add(Amount::new(dec!(4000)));
        let amount = amount_for_shares(&after, shares, Timestamp::from_secs(0));
        assert_eq!(amount.value(), dec!(4000));
    }

    #[test]
    fn no_rate_when_vault_is_worthless() {
        let mut ledger = ledger_at(0);
        ledger.total_shares = Shares::new(dec!(10_000));
        // shares exist but no assets back them
        assert!(shares_for_amount(&ledger, Amount::new(dec!(1)), Timestamp::from_secs(0)).is_none());
    }

    #[test]
    fn fee_shares_claim_equals_fee() {
        let mut ledger = ledger_at(0);
        ledger.idle_funds = Amount::new(dec!(100_000));
        ledger.total_shares = Shares::new(dec!(100_000));

        let fee = Amount::new(dec!(500));
        let minted = fee_shares_for(&ledger, fee, Timestamp::from_secs(0));

        // after minting, the recipient's claim should redeem to the fee amount
        let mut after = ledger.clone();
        after.total_shares = after.total_shares.add(minted);
        let claim = amount_for_shares(&after, minted, Timestamp::from_secs(0));
        assert!((claim.value() - fee.value()).abs() < dec!(0.01), "claim {claim}");
    }

    #[test]
    fn management_fee_pro_rata_over_time() {
        let mut ledger = ledger_at(0);
        ledger.idle_funds = Amount::new(dec!(1_000_000));
        ledger.management_fee = Bps::new(200); // 2% per year

        let full_year = Timestamp::from_secs(SECONDS_PER_YEAR);
        let fee = management_fee_due(&ledger, full_year);
        assert_eq!(fee.value(), dec!(20_000));

        let half_year = Timestamp::from_secs(SECONDS_PER_YEAR / 2);
        let fee = management_fee_due(&ledger, half_year);
        assert!((fee.value() - dec!(10_000)).abs() < dec!(0.01));

        // zero elapsed, zero fee
        assert_eq!(
            management_fee_due(&ledger, Timestamp::from_secs(0)),
            Amount::zero()
        );
    }

    #[test]
    fn lock_gain_rebases_decayed_remainder() {
        let mut ledger = ledger_at(0);
        ledger.locked_profit = Amount::new(dec!(1000));

        // halfway through the window, 500 is still locked; a fresh 2000 gain
        // locks on top of that remainder, not the stale 1000
        lock_gain(&mut ledger, Amount::new(dec!(2000)), Timestamp::from_secs(500));
        assert_eq!(ledger.locked_profit.value(), dec!(2500));
    }
}
