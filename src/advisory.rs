// 4.0 advisory.rs: yield advisory integration. the engine is agnostic to where
// quotes come from (an on-chain oracle, an indexer, a research desk feed); it
// consumes an AdvisorySource trait and filters each quote individually. a bad quote
// never aborts the whole computation, it is dropped with a typed reason.

use crate::types::{AssetId, StrategyId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// 4.1: a single yield quote for one strategy. round identifiers follow oracle
// conventions: answered_in_round must have caught up to round_id, otherwise
// the answer is carried over from an older round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldQuote {
    pub apy: Decimal,
    pub risk_score: Decimal,
    // 0..=1, how much the source trusts its own number
    pub confidence: Decimal,
    pub timestamp: Timestamp,
    pub round_id: u64,
    pub answered_in_round: u64,
}

impl YieldQuote {
    // boundary rule: age == max_age is fresh, strictly older is stale.
    pub fn is_stale(&self, now: Timestamp, max_age_secs: i64) -> bool {
        self.timestamp.elapsed_secs(now) > max_age_secs
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdvisoryError {
    #[error("advisory source unavailable: {0}")]
    Unavailable(String),

    #[error("no advisory data for asset {0:?}")]
    NoData(AssetId),
}

// 4.2: the consumed capability. synchronous and fallible; callers decide
// whether a failure is fatal (rebalance execution) or defaulted (triggers).
pub trait AdvisorySource: std::fmt::Debug {
    fn candidates(
        &self,
        asset: AssetId,
    ) -> Result<Vec<(StrategyId, YieldQuote)>, AdvisoryError>;

    fn max_quote_age(&self, asset: AssetId) -> i64;
}

// 4.3: why a quote was dropped. emitted as an event per rejection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum QuoteRejection {
    Unregistered,
    Stale { age_secs: i64, max_age_secs: i64 },
    NonMonotonicRounds { round_id: u64, answered_in_round: u64 },
    LowConfidence { confidence: Decimal, minimum: Decimal },
    ZeroApy,
    InvalidRiskScore,
}

#[derive(Debug, Default)]
pub struct FilteredQuotes {
    pub accepted: Vec<(StrategyId, YieldQuote)>,
    pub rejected: Vec<(StrategyId, QuoteRejection)>,
}

// 4.4: per-quote filtering. order of checks matters only for which reason gets
// reported; every quote is judged on its own.
pub fn filter_quotes(
    quotes: &[(StrategyId, YieldQuote)],
    now: Timestamp,
    max_age_secs: i64,
    min_confidence: Decimal,
    mut is_registered: impl FnMut(StrategyId) -> bool,
) -> FilteredQuotes {
    let mut out = FilteredQuotes::default();

    for (strategy, quote) in quotes {
        let rejection = if !is_registered(*strategy) {
            Some(QuoteRejection::Unregistered)
        } else if quote.is_stale(now, max_age_secs) {
            Some(QuoteRejection::Stale {
                age_secs: quote.timestamp.elapsed_secs(now),
                max_age_secs,
            })
        } else if quote.answered_in_round < quote.round_id {
            Some(QuoteRejection::NonMonotonicRounds {
                round_id: quote.round_id,
                answered_in_round: quote.answered_in_round,
            })
        } else if quote.confidence < min_confidence {
            Some(QuoteRejection::LowConfidence {
                confidence: quote.confidence,
                minimum: min_confidence,
            })
        } else if quote.apy <= Decimal::ZERO {
            Some(QuoteRejection::ZeroApy)
        } else if quote.risk_score <= Decimal::ZERO {
            Some(QuoteRejection::InvalidRiskScore)
        } else {
            None
        };

        match rejection {
            Some(reason) => out.rejected.push((*strategy, reason)),
            None => out.accepted.push((*strategy, *quote)),
        }
    }

    out
}

// 4.5: deterministic in-memory advisory source for simulations and tests.
#[derive(Debug, Default)]
pub struct StaticAdvisor {
    quotes: HashMap<AssetId, Vec<(StrategyId, YieldQuote)>>,
    max_age_secs: i64,
    unavailable: bool,
}

impl StaticAdvisor {
    pub fn new(max_age_secs: i64) -> Self {
        Self {
            quotes: HashMap::new(),
            max_age_secs,
            unavailable: false,
        }
    }

    pub fn set_quote(&mut self, asset: AssetId, strategy: StrategyId, quote: YieldQuote) {
        let entries = self.quotes.entry(asset).or_default();
        if let Some(existing) = entries.iter_mut().find(|(s, _)| *s == strategy) {
            existing.1 = quote;
        } else {
            entries.push((strategy, quote));
        }
    }

    pub fn clear(&mut self, asset: AssetId) {
        self.quotes.remove(&asset);
    }

    // simulate an outage
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }
}

impl AdvisorySource for StaticAdvisor {
    fn candidates(
        &self,
        asset: AssetId,
    ) -> Result<Vec<(StrategyId, YieldQuote)>, AdvisoryError> {
        if self.unavailable {
            return Err(AdvisoryError::Unavailable("simulated outage".to_string()));
        }
        match self.quotes.get(&asset) {
            Some(quotes) if !quotes.is_empty() => Ok(quotes.clone()),
            _ => Err(AdvisoryError::NoData(asset)),
        }
    }

    fn max_quote_age(&self, _asset: AssetId) -> i64 {
        self.max_age_secs
    }
}
