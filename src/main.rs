//! Multi-Strategy Vault Core Simulation.
//!
//! Demonstrates the full vault lifecycle including deposits, advisory-driven
//! rebalancing, strategy reports with profit locking, loss-aware withdrawals,
//! and strategy revocation.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use vault_core::*;

const USDC: AssetId = AssetId(1);

fn main() {
    println!("Multi-Strategy Vault Core Engine Simulation");
    println!("Single Asset, Debt-Ledger Accounting, Full Lifecycle\n");

    scenario_1_deposit_and_rebalance();
    scenario_2_gain_report_and_fees();
    scenario_3_withdrawal_liquidity_failure();
    scenario_4_revocation_and_liquidation();
    scenario_5_scoring_skew();
    scenario_6_locked_profit_decay();
    scenario_7_emergency_shutdown();

    println!("\nAll simulations completed successfully.");
}

fn fresh_quote(apy: Decimal, at: Timestamp) -> YieldQuote {
    YieldQuote {
        apy,
        risk_score: dec!(1),
        confidence: dec!(1),
        timestamp: at,
        round_id: 1,
        answered_in_round: 1,
    }
}

fn register_sim(vault: &mut Vault, id: u32, ratio: u32) {
    vault
        .register_strategy(
            Caller::Governance,
            Box::new(SimStrategy::new(StrategyId(id), USDC)) as Box<dyn Strategy>,
            StrategyId(id),
            Bps::new(ratio),
            Amount::zero(),
            Amount::zero(),
            None,
        )
        .unwrap();
}

/// Fresh vault, one strategy capped at 90%, one rebalance.
fn scenario_1_deposit_and_rebalance() {
    println!("Scenario 1: Deposit and First Rebalance\n");

    let mut config = VaultConfig::default();
    config.rebalance.max_allocation = MAX_BPS; // let governance caps bind
    let mut vault = Vault::new(USDC, config, EngineConfig::default());
    register_sim(&mut vault, 1, 9000);

    let alice = AccountId(1);
    vault.deposit(alice, Amount::new(dec!(100_000))).unwrap();
    println!("  Alice deposits 100,000; idle = {}", vault.ledger().idle_funds);

    vault.advance_time(100_000);
    let mut advisor = StaticAdvisor::new(600);
    advisor.set_quote(USDC, StrategyId(1), fresh_quote(dec!(0.08), vault.time()));
    vault.set_advisor(Box::new(advisor));

    let outcome = vault.execute_rebalance(Caller::Management).unwrap();
    println!("  Rebalance moved {} into strategy 1", outcome.moved_in);
    println!(
        "  idle = {}, strategy debt = {}",
        vault.ledger().idle_funds,
        vault.strategy_entry(StrategyId(1)).unwrap().debt
    );
    if let Some(connector) = vault.connector(StrategyId(1)) {
        println!(
            "  connector reports {} under management\n",
            connector.estimated_total_assets()
        );
    }
}

/// A 5,000 gain report with a 10% performance fee.
fn scenario_2_gain_report_and_fees() {
    println!("Scenario 2: Gain Report, Profit Lock and Fees\n");

    let mut vault = Vault::new(USDC, VaultConfig::default(), EngineConfig::default());
    register_sim(&mut vault, 1, 9000);
    vault.deposit(AccountId(1), Amount::new(dec!(100_000))).unwrap();

    let outcome = vault
        .report(
            Caller::Strategy(StrategyId(1)),
            Amount::new(dec!(5000)),
            Amount::zero(),
            Amount::zero(),
        )
        .unwrap();

    println!("  Strategy 1 reports gain 5,000");
    println!("  Performance fee claim: {}", outcome.performance_fee);
    println!("  Locked profit: {}", vault.ledger().locked_profit);
    println!("  Fee recipient shares: {}\n", vault.fee_recipient_shares());
}

/// A liquidity-capped strategy cannot cover an 80,000 request.
fn scenario_3_withdrawal_liquidity_failure() {
    println!("Scenario 3: Withdrawal Fails on Liquidity Ceiling\n");

    let mut config = VaultConfig::default();
    config.rebalance.max_allocation = MAX_BPS;
    let mut vault = Vault::new(USDC, config, EngineConfig::default());
    vault.deposit(AccountId(1), Amount::new(dec!(100_000))).unwrap();

    let sim = SimStrategy::new(StrategyId(1), USDC)
        .with_liquidity_cap(Amount::new(dec!(60_000)));
    vault
        .register_strategy(
            Caller::Governance,
            Box::new(sim) as Box<dyn Strategy>,
            StrategyId(1),
            Bps::new(9000),
            Amount::zero(),
            Amount::zero(),
            None,
        )
        .unwrap();

    vault.advance_time(100_000);
    let mut advisor = StaticAdvisor::new(600);
    advisor.set_quote(USDC, StrategyId(1), fresh_quote(dec!(0.08), vault.time()));
    vault.set_advisor(Box::new(advisor));
    vault.execute_rebalance(Caller::Management).unwrap();
    println!(
        "  Deployed {} into the capped strategy, idle = {}",
        vault.strategy_entry(StrategyId(1)).unwrap().debt,
        vault.ledger().idle_funds
    );

    let plan = vault.preview_withdraw(Amount::new(dec!(80_000)));
    println!(
        "  Preview for 80,000: freed {}, shortfall {}",
        plan.freed, plan.shortfall
    );

    let result = vault.withdraw(AccountId(1), Amount::new(dec!(80_000)), None);
    println!("  Withdrawal result: {:?}", result.err().map(|e| e.to_string()));
    println!("  Nothing moved: idle = {}\n", vault.ledger().idle_funds);
}

/// Revocation keeps debt on the books until a withdrawal drains it.
fn scenario_4_revocation_and_liquidation() {
    println!("Scenario 4: Revocation and Deferred Liquidation\n");

    let mut config = VaultConfig::default();
    config.rebalance.max_allocation = MAX_BPS;
    let mut vault = Vault::new(USDC, config, EngineConfig::default());
    register_sim(&mut vault, 1, 9000);
    vault.deposit(AccountId(1), Amount::new(dec!(100_000))).unwrap();

    vault.advance_time(100_000);
    let mut advisor = StaticAdvisor::new(600);
    advisor.set_quote(USDC, StrategyId(1), fresh_quote(dec!(0.08), vault.time()));
    vault.set_advisor(Box::new(advisor));
    vault.execute_rebalance(Caller::Management).unwrap();

    vault.revoke_strategy(Caller::Governance, StrategyId(1)).unwrap();
    println!(
        "  Revoked strategy 1: ratio = {}, debt = {}",
        vault.strategy_entry(StrategyId(1)).unwrap().debt_ratio,
        vault.strategy_entry(StrategyId(1)).unwrap().debt
    );
    println!("  Aggregate ratio now {}", vault.ledger().total_debt_ratio());

    let outcome = vault
        .withdraw(AccountId(1), Amount::new(dec!(50_000)), None)
        .unwrap();
    println!(
        "  Withdrawal of 50,000 drained the revoked strategy: paid {}, debt now {}\n",
        outcome.paid_out,
        vault.strategy_entry(StrategyId(1)).unwrap().debt
    );
}

/// Scoring power skews allocation between a 2x-apy pair.
fn scenario_5_scoring_skew() {
    println!("Scenario 5: Scoring Power and Allocation Skew\n");

    let inputs = vec![
        ScoreInput {
            strategy: StrategyId(1),
            apy: dec!(0.10),
            risk_score: dec!(1),
            confidence: dec!(1),
        },
        ScoreInput {
            strategy: StrategyId(2),
            apy: dec!(0.05),
            risk_score: dec!(1),
            confidence: dec!(1),
        },
    ];

    for power in [1u32, 2u32] {
        let plan = compute_plan(&inputs, power, MAX_BPS, Bps::zero());
        println!(
            "  power={}: strategy1 {} / strategy2 {}",
            power,
            plan.target(StrategyId(1)).unwrap(),
            plan.target(StrategyId(2)).unwrap()
        );
    }
    println!();
}

/// Locked profit decays linearly and the share price follows free funds.
fn scenario_6_locked_profit_decay() {
    println!("Scenario 6: Locked Profit Decay\n");

    let mut config = VaultConfig::default();
    config.vault.locked_profit_degradation = dec!(0.0001); // 10,000s window
    let mut vault = Vault::new(USDC, config, EngineConfig::default());
    register_sim(&mut vault, 1, 9000);
    vault.deposit(AccountId(1), Amount::new(dec!(100_000))).unwrap();

    vault
        .report(
            Caller::Strategy(StrategyId(1)),
            Amount::new(dec!(10_000)),
            Amount::zero(),
            Amount::zero(),
        )
        .unwrap();

    for dt in [0i64, 5000, 10_000] {
        let at = Timestamp::from_secs(vault.ledger().last_report.as_secs() + dt);
        let locked = locked_profit_remaining(vault.ledger(), at);
        println!("  t+{dt}s: locked = {locked}");
    }
    println!();
}

/// Shutdown blocks deposits and zeroes credit lines; withdrawals still work.
fn scenario_7_emergency_shutdown() {
    println!("Scenario 7: Emergency Shutdown\n");

    let mut vault = Vault::new(USDC, VaultConfig::default(), EngineConfig::default());
    register_sim(&mut vault, 1, 9000);
    vault.deposit(AccountId(1), Amount::new(dec!(50_000))).unwrap();

    vault.set_emergency_shutdown(Caller::Governance, true).unwrap();
    println!("  Shutdown active");
    println!(
        "  Deposit attempt: {:?}",
        vault
            .deposit(AccountId(1), Amount::new(dec!(1000)))
            .err()
            .map(|e| e.to_string())
    );
    println!("  Credit available: {}", vault.credit_available(StrategyId(1)));

    let outcome = vault
        .withdraw(AccountId(1), Amount::new(dec!(20_000)), None)
        .unwrap();
    println!("  Withdrawal still works: paid {}", outcome.paid_out);
}
