// 1.0: all the primitives live here. nothing in the engine works without these types.
// IDs, amounts, basis points, shares, timestamps. each is a newtype so the compiler
// catches unit mixups (debt vs shares vs bps).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

// underlying asset identity. a vault accepts exactly one asset and every
// registered strategy must declare the same one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u32);

// 1.1: non-negative amount of the underlying asset. idle funds, debt, gains,
// losses, fees all use this. subtraction is explicit: checked_sub for paths
// where underflow is a caller bug, saturating_sub where flooring at zero is
// the defined behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Self {
        debug_assert!(value >= Decimal::ZERO);
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn add(&self, other: Amount) -> Self {
        Self(self.0 + other.0)
    }

    pub fn checked_sub(&self, other: Amount) -> Option<Self> {
        if other.0 > self.0 {
            None
        } else {
            Some(Self(self.0 - other.0))
        }
    }

    pub fn saturating_sub(&self, other: Amount) -> Self {
        if other.0 > self.0 {
            Self::zero()
        } else {
            Self(self.0 - other.0)
        }
    }

    pub fn min(&self, other: Amount) -> Self {
        Self(self.0.min(other.0))
    }

    // amount scaled by a basis-point fraction, e.g. 9000 bps of 100k = 90k
    pub fn mul_bps(&self, bps: Bps) -> Self {
        Self(self.0 * bps.as_fraction())
    }

    pub fn mul(&self, factor: Decimal) -> Self {
        debug_assert!(factor >= Decimal::ZERO);
        Self(self.0 * factor)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, a| acc.add(a))
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, a| acc.add(*a))
    }
}

// 1.2: receipt-share count. minted on deposit, burned on withdrawal, minted to
// the fee recipient on accrual. transfer mechanics live outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shares(Decimal);

impl Shares {
    pub fn new(value: Decimal) -> Self {
        debug_assert!(value >= Decimal::ZERO);
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn add(&self, other: Shares) -> Self {
        Self(self.0 + other.0)
    }

    pub fn checked_sub(&self, other: Shares) -> Option<Self> {
        if other.0 > self.0 {
            None
        } else {
            Some(Self(self.0 - other.0))
        }
    }
}

impl fmt::Display for Shares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Shares {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Shares {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Shares {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, s| acc.add(s))
    }
}

// 1.3: basis points. 100 bps = 1%. 10_000 bps = the whole.
// debt ratios, fee rates and loss gates are all expressed in bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Bps(u32);

pub const MAX_BPS: Bps = Bps(10_000);

impl Bps {
    pub fn new(bps: u32) -> Self {
        Self(bps)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn as_fraction(&self) -> Decimal {
        Decimal::new(self.0 as i64, 4)
    }

    pub fn add(&self, other: Bps) -> Self {
        Self(self.0 + other.0)
    }

    pub fn checked_sub(&self, other: Bps) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(&self, other: Bps) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    // headroom left under the 10_000 cap
    pub fn headroom(&self) -> Bps {
        MAX_BPS.saturating_sub(*self)
    }
}

impl fmt::Display for Bps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

// 1.4: second-resolution timestamp. the engine is driven by explicit
// set_time/advance_time so everything stays deterministic; now() exists for
// callers embedding the engine behind a real clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp())
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    // seconds elapsed since `self`, floored at zero for clock skew
    pub fn elapsed_secs(&self, later: Timestamp) -> i64 {
        (later.0 - self.0).max(0)
    }

    pub fn elapsed_decimal(&self, later: Timestamp) -> Decimal {
        Decimal::from(self.elapsed_secs(later))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}

// 1.5: who is calling. the engine enforces "who may call what" with this and
// nothing else; key management and signature checks live outside the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Caller {
    Governance,
    Management,
    Strategy(StrategyId),
    Account(AccountId),
}

impl Caller {
    pub fn is_privileged(&self) -> bool {
        matches!(self, Caller::Governance | Caller::Management)
    }
}
