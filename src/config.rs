// 7.0 config.rs: all settings in one place. vault policy, rebalance tuning,
// environment presets.

use crate::types::{Amount, Bps, MAX_BPS};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// 7.1: vault-level policy knobs, applied to the ledger at construction and
// adjustable by governance afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultParams {
    // hard ceiling on total assets; deposits pushing past it are rejected
    pub deposit_limit: Amount,
    // performance fee on reported gain, in bps
    pub performance_fee: Bps,
    // annualized management fee on total assets, in bps
    pub management_fee: Bps,
    // cap for per-strategy performance fee overrides
    pub max_fee_override: Bps,
    // fraction of locked profit unlocked per second
    pub locked_profit_degradation: Decimal,
    // default realized-loss gate for withdrawals, as bps of the request
    pub withdrawal_max_loss: Bps,
}

impl Default for VaultParams {
    fn default() -> Self {
        Self {
            deposit_limit: Amount::new(dec!(10_000_000)),
            performance_fee: Bps::new(1000), // 10%
            management_fee: Bps::new(200),   // 2% / year
            max_fee_override: Bps::new(5000),
            locked_profit_degradation: dec!(0.000046), // ~6 hour unlock
            withdrawal_max_loss: Bps::new(1), // 0.01%
        }
    }
}

/** 7.2: rebalance engine tuning. scoring shape, safety gates, rate limit */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceParams {
    // minimum seconds between rebalance executions
    pub min_interval_secs: i64,
    // integer power applied to scores; higher = less churn, more conviction
    pub score_power: u32,
    // per-strategy ceiling on computed targets
    pub max_allocation: Bps,
    // targets below this are zeroed instead of churning dust
    pub dust_threshold: Bps,
    // quotes under this confidence are dropped
    pub min_confidence: Decimal,
    // minimum projected blended-yield improvement to call a rebalance beneficial
    pub min_improvement: Bps,
    // fraction of deployed debt that must be quote-covered before trusting
    // the improvement signal
    pub min_coverage: Bps,
    // realized-loss budget per rebalance, as bps of total assets
    pub max_loss: Bps,
}

impl Default for RebalanceParams {
    fn default() -> Self {
        Self {
            min_interval_secs: 21_600, // 6 hours
            score_power: 1,
            max_allocation: Bps::new(8000),
            dust_threshold: Bps::new(100),
            min_confidence: dec!(0.5),
            min_improvement: Bps::new(25),
            min_coverage: Bps::new(8000),
            max_loss: Bps::new(25),
        }
    }
}

// The complete vault configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    pub vault: VaultParams,
    pub rebalance: RebalanceParams,
}

impl VaultConfig {
    // Conservative preset: slow rebalance cadence, tight loss gates,
    // high-conviction allocation only
    pub fn conservative() -> Self {
        let mut config = Self::default();
        config.vault.performance_fee = Bps::new(500);
        config.rebalance.min_interval_secs = 86_400; // daily at most
        config.rebalance.score_power = 2;
        config.rebalance.max_allocation = Bps::new(5000);
        config.rebalance.min_confidence = dec!(0.8);
        config.rebalance.max_loss = Bps::new(10);
        config
    }

    // Aggressive preset: fast cadence, wider caps, accepts thinner signals
    pub fn aggressive() -> Self {
        let mut config = Self::default();
        config.rebalance.min_interval_secs = 3600;
        config.rebalance.max_allocation = Bps::new(9500);
        config.rebalance.min_confidence = dec!(0.3);
        config.rebalance.min_improvement = Bps::new(10);
        config.rebalance.min_coverage = Bps::new(5000);
        config.rebalance.max_loss = Bps::new(50);
        config
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        // fee checks
        if self.vault.performance_fee > Bps::new(5000) {
            return Err(ConfigError::InvalidFees {
                reason: "performance fee above 50%".to_string(),
            });
        }
        if self.vault.management_fee > MAX_BPS {
            return Err(ConfigError::InvalidFees {
                reason: "management fee above 100%".to_string(),
            });
        }
        if self.vault.max_fee_override > MAX_BPS {
            return Err(ConfigError::InvalidFees {
                reason: "fee override cap above 100%".to_string(),
            });
        }

        // profit lock checks
        if self.vault.locked_profit_degradation < Decimal::ZERO
            || self.vault.locked_profit_degradation > Decimal::ONE
        {
            return Err(ConfigError::InvalidProfitLock {
                reason: "degradation rate must be within [0, 1] per second".to_string(),
            });
        }

        // rebalance checks
        if self.rebalance.score_power == 0 {
            return Err(ConfigError::InvalidRebalance {
                reason: "score power must be at least 1".to_string(),
            });
        }
        if self.rebalance.max_allocation.is_zero() || self.rebalance.max_allocation > MAX_BPS {
            return Err(ConfigError::InvalidRebalance {
                reason: "max allocation must be within (0, 10000]".to_string(),
            });
        }
        if self.rebalance.dust_threshold >= self.rebalance.max_allocation {
            return Err(ConfigError::InvalidRebalance {
                reason: "dust threshold must sit below max allocation".to_string(),
            });
        }
        if self.rebalance.min_confidence <= Decimal::ZERO
            || self.rebalance.min_confidence > Decimal::ONE
        {
            return Err(ConfigError::InvalidRebalance {
                reason: "min confidence must be within (0, 1]".to_string(),
            });
        }
        if self.rebalance.min_coverage > MAX_BPS {
            return Err(ConfigError::InvalidRebalance {
                reason: "coverage gate above 100%".to_string(),
            });
        }
        if self.rebalance.min_interval_secs < 0 {
            return Err(ConfigError::InvalidRebalance {
                reason: "rebalance interval cannot be negative".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidFees { reason: String },
    InvalidProfitLock { reason: String },
    InvalidRebalance { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(VaultConfig::default().validate().is_ok());
    }

    #[test]
    fn test_presets_valid() {
        assert!(VaultConfig::conservative().validate().is_ok());
        assert!(VaultConfig::aggressive().validate().is_ok());

        let conservative = VaultConfig::conservative();
        assert_eq!(conservative.rebalance.score_power, 2);
    }

    #[test]
    fn test_invalid_fee() {
        let mut config = VaultConfig::default();
        config.vault.performance_fee = Bps::new(6000);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFees { .. })
        ));
    }

    #[test]
    fn test_invalid_score_power() {
        let mut config = VaultConfig::default();
        config.rebalance.score_power = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRebalance { .. })
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = VaultConfig::conservative();
        let json = serde_json::to_string(&config).unwrap();
        let back: VaultConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rebalance.max_allocation, config.rebalance.max_allocation);
    }
}
