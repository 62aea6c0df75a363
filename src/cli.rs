//! A small demo CLI driving the [`Coordinator`] directly — no network, no
//! HTTP surface, the same "thin orchestrator wires up tracing, parses args,
//! drives the core" shape the teacher's `main.rs` and `cli.rs` had, minus
//! the axum server that sat out of scope for this crate.

use clap::{Parser, Subcommand};

use outcome_exchange::config::EngineConfig;
use outcome_exchange::{Coordinator, MarketId, Money, Side};

#[derive(Parser)]
#[command(name = "outcome-exchange-cli")]
#[command(version = "0.1", about = "A demo of a binary-outcome exchange core")]
pub struct Cli {
    #[command(flatten)]
    pub config: EngineConfig,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the built-in scripted demo: seed two accounts, rest an order,
    /// cross it, settle the market, and print the resulting balances.
    Demo {
        #[arg(long, default_value_t = 1)]
        target_id: u64,
        #[arg(long, default_value_t = 480)]
        threshold: u32,
    },
}

pub fn run_demo(
    target_id: u64,
    threshold: u32,
    seed_deposit_cents: i64,
    audit_every_call: bool,
    aggressive_buy_ceiling_cents: i64,
) {
    let mut coordinator = Coordinator::new(audit_every_call);
    let market = MarketId::new(target_id, threshold);

    let seller: u64 = 1;
    let buyer: u64 = 2;
    coordinator.deposit(seller, Money::from_cents(seed_deposit_cents));
    coordinator.deposit(buyer, Money::from_cents(seed_deposit_cents));

    println!("seeding market {market}");
    coordinator
        .place_order(market, None, Side::Sell, 55, 10, 1, seller)
        .expect("resting sell order");

    let outcome = coordinator
        .place_order(market, None, Side::Buy, 60, 10, 2, buyer)
        .expect("crossing buy order");
    println!(
        "matched {} trade(s), refunded {}c",
        outcome.trades.len(),
        outcome.refund_cents()
    );
    for t in &outcome.trades {
        println!("  {} @ {}c x{}", t.taker_order_id, t.price, t.qty);
    }

    coordinator
        .place_order(market, None, Side::Sell, 45, 5, 3, seller)
        .expect("second resting sell order");
    let aggressive = coordinator
        .place_aggressive_buy(market, None, 5, 4, buyer, aggressive_buy_ceiling_cents)
        .expect("aggressive buy sweeps the remaining ask");
    println!(
        "aggressive buy at ceiling {}c filled {} trade(s)",
        aggressive_buy_ceiling_cents,
        aggressive.trades.len()
    );

    let snapshot = coordinator.engine.snapshot_market(market).unwrap();
    println!("book after match: {} bids, {} asks", snapshot.bids.len(), snapshot.asks.len());

    let settlement_trades = coordinator
        .settle_markets_for(target_id, threshold as u64)
        .expect("settlement");
    println!("settlement produced {} trade(s)", settlement_trades.len());

    for user_id in [seller, buyer] {
        let balance = coordinator.balance(user_id);
        println!(
            "user {user_id}: available={} locked={}",
            balance.available, balance.locked
        );
    }
}
