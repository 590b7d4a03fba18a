// vault-core: multi-strategy vault accounting engine.
// accounting-first architecture: debt reconciliation and loss bounding take priority.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: StrategyId, Amount, Bps, Shares, Timestamp
//   2.x  ledger.rs: vault ledger, strategy table, the two debt primitives
//   2.5  queue.rs: bounded governance-ordered withdrawal queue
//   3.x  allocation.rs: target-allocation scoring and normalization
//   4.x  advisory.rs: yield quotes, per-quote filtering (mocked source)
//   5.x  liquidation.rs: greedy queue-order withdrawal traversal
//   6.x  profit.rs: locked-profit decay, share math, fee math
//   7.x  config.rs: vault policy, rebalance tuning, presets
//   8.x  engine/: orchestrator: holders, reports, rebalancing
//   9.x  strategy.rs: strategy capability trait (mocked)
//   10.x events.rs: state transition events for audit

// core accounting modules
pub mod allocation;
pub mod ledger;
pub mod liquidation;
pub mod profit;
pub mod queue;
pub mod types;

// orchestration modules
pub mod engine;
pub mod events;

// integration modules
pub mod advisory;
pub mod config;
pub mod strategy;

// re exports for convenience
pub use advisory::*;
pub use allocation::*;
pub use engine::*;
pub use events::*;
pub use ledger::*;
pub use liquidation::*;
pub use profit::*;
pub use queue::*;
pub use strategy::*;
pub use types::*;
pub use config::{ConfigError, RebalanceParams, VaultConfig, VaultParams};
