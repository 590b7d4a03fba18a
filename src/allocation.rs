// 3.0 allocation.rs: pure target-allocation math. scoring, normalization,
// per-strategy caps and dust removal. no ledger access, no side effects; the
// rebalance engine feeds filtered advisory data in and gets a plan back.

use crate::types::{Bps, StrategyId, MAX_BPS};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;

// 3.1: one scoring input. quotes have already been filtered by the advisory
// layer, so apy > 0 and risk_score > 0 hold here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInput {
    pub strategy: StrategyId,
    pub apy: Decimal,
    pub risk_score: Decimal,
    pub confidence: Decimal,
}

impl ScoreInput {
    // score = (apy * confidence / risk)^power. higher powers skew harder
    // toward the best candidate, damping churn from small apy differences.
    pub fn score(&self, power: u32) -> Decimal {
        debug_assert!(power >= 1);
        debug_assert!(self.risk_score > Decimal::ZERO);
        let base = self.apy * self.confidence / self.risk_score;
        base.powi(power as i64)
    }
}

// 3.2: the plan. (strategy, target bps) pairs, sum never above 10_000.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationPlan {
    targets: Vec<(StrategyId, Bps)>,
}

impl AllocationPlan {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn target(&self, id: StrategyId) -> Option<Bps> {
        self.targets.iter().find(|(s, _)| *s == id).map(|(_, b)| *b)
    }

    pub fn contains(&self, id: StrategyId) -> bool {
        self.targets.iter().any(|(s, _)| *s == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (StrategyId, Bps)> + '_ {
        self.targets.iter().copied()
    }

    pub fn total_bps(&self) -> Bps {
        self.targets
            .iter()
            .fold(Bps::zero(), |acc, (_, b)| acc.add(*b))
    }
}

// 3.3: the full pipeline: score -> normalize -> cap+renormalize -> dust+renormalize.
pub fn compute_plan(
    inputs: &[ScoreInput],
    power: u32,
    max_allocation: Bps,
    dust_threshold: Bps,
) -> AllocationPlan {
    let scores: Vec<(StrategyId, Decimal)> = inputs
        .iter()
        .filter(|i| i.apy > Decimal::ZERO && i.risk_score > Decimal::ZERO)
        .map(|i| (i.strategy, i.score(power)))
        .filter(|(_, s)| *s > Decimal::ZERO)
        .collect();

    let mut targets = normalize(&scores);
    clamp(&mut targets, max_allocation);
    renormalize(&mut targets, max_allocation);

    // dust pass: tiny allocations are not worth the debt churn
    targets.retain(|(_, b)| *b >= dust_threshold);
    renormalize(&mut targets, max_allocation);

    AllocationPlan { targets }
}

// proportional split of 10_000 bps, floored per entry so the sum never
// overshoots.
fn normalize(scores: &[(StrategyId, Decimal)]) -> Vec<(StrategyId, Bps)> {
    let total: Decimal = scores.iter().map(|(_, s)| *s).sum();
    if total <= Decimal::ZERO {
        return Vec::new();
    }
    scores
        .iter()
        .map(|(id, score)| {
            let bps = (score / total * Decimal::from(MAX_BPS.value()))
                .floor()
                .to_u32()
                .unwrap_or(0);
            (*id, Bps::new(bps))
        })
        .filter(|(_, b)| !b.is_zero())
        .collect()
}

fn clamp(targets: &mut [(StrategyId, Bps)], cap: Bps) {
    for (_, b) in targets.iter_mut() {
        if *b > cap {
            *b = cap;
        }
    }
}

// rescale to sum 10_000 again, keeping every entry under the cap. a single
// pass: capped entries absorb no extra weight, so the sum may land below
// 10_000, which is fine (plans sum *at most* 10_000).
fn renormalize(targets: &mut Vec<(StrategyId, Bps)>, cap: Bps) {
    let sum: u32 = targets.iter().map(|(_, b)| b.value()).sum();
    if sum == 0 || sum == MAX_BPS.value() {
        return;
    }
    for (_, b) in targets.iter_mut() {
        let scaled = (Decimal::from(b.value()) * Decimal::from(MAX_BPS.value())
            / Decimal::from(sum))
        .floor()
        .to_u32()
        .unwrap_or(0);
        *b = Bps::new(scaled.min(cap.value()));
    }
    targets.retain(|(_, b)| !b.is_zero());
}

// 3.4: debt-weighted average apy, used by the rebalance trigger heuristics.
pub fn weighted_apy(items: impl Iterator<Item = (Decimal, Decimal)>) -> Decimal {
    let mut weight_sum = Decimal::ZERO;
    let mut weighted = Decimal::ZERO;
    for (weight, apy) in items {
        weight_sum += weight;
        weighted += weight * apy;
    }
    if weight_sum.is_zero() {
        Decimal::ZERO
    } else {
        weighted / weight_sum
    }
}
