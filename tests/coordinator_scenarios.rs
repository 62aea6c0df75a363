//! End-to-end scenarios from spec.md §8, driving the `Coordinator` directly
//! instead of through any network surface.

use outcome_exchange::{Coordinator, MarketId, Money, Side};

fn fresh() -> Coordinator {
    Coordinator::new(true)
}

#[test]
fn full_match_at_makers_price() {
    let mut c = fresh();
    let market = MarketId::new(1, 480);
    c.deposit(2, Money::from_cents(1000));

    c.place_order(market, None, Side::Sell, 50, 10, 1, 1).unwrap();
    let outcome = c
        .place_order(market, None, Side::Buy, 50, 10, 2, 2)
        .unwrap();

    assert_eq!(outcome.trades.len(), 1);
    assert_eq!(outcome.trades[0].price, 50);
    assert_eq!(outcome.trades[0].qty, 10);
    assert_eq!(outcome.refund_cents(), 0);
}

#[test]
fn price_improvement_refund_matches_spec_example() {
    // User 7 has 5.00 available. Resting sell at 40c qty 10.
    // Buy 5@60c (limit price 60c) should fill 5 @ 40c, refund 1.00.
    let mut c = fresh();
    let market = MarketId::new(1, 480);
    c.deposit(7, Money::from_cents(500));

    c.place_order(market, None, Side::Sell, 40, 10, 1, 1).unwrap();
    let outcome = c.place_order(market, None, Side::Buy, 60, 5, 2, 7).unwrap();

    assert_eq!(outcome.refund_cents(), 100);
    let account = c.economy.account(7);
    assert_eq!(account.available, Money::from_cents(300));
    assert_eq!(account.locked, Money::ZERO);
}

#[test]
fn multi_level_sweep_respects_price_priority() {
    let mut c = fresh();
    let market = MarketId::new(1, 480);
    c.deposit(2, Money::from_cents(10_000));

    c.place_order(market, None, Side::Sell, 50, 5, 1, 1).unwrap();
    c.place_order(market, None, Side::Sell, 52, 5, 2, 1).unwrap();
    let outcome = c
        .place_order(market, None, Side::Buy, 55, 8, 3, 2)
        .unwrap();

    let trades = outcome.trades;
    assert_eq!(trades.len(), 2);
    assert_eq!((trades[0].price, trades[0].qty), (50, 5));
    assert_eq!((trades[1].price, trades[1].qty), (52, 3));
}

#[test]
fn time_priority_fills_the_earlier_resting_order_first() {
    let mut c = fresh();
    let market = MarketId::new(1, 480);
    c.deposit(3, Money::from_cents(10_000));

    c.place_order(market, None, Side::Sell, 50, 5, 1, 1).unwrap();
    c.place_order(market, None, Side::Sell, 50, 5, 2, 2).unwrap();
    let outcome = c
        .place_order(market, None, Side::Buy, 50, 5, 3, 3)
        .unwrap();

    assert_eq!(outcome.trades[0].maker_order_id, 1);
}

#[test]
fn cancel_refunds_the_full_lock() {
    let mut c = fresh();
    let market = MarketId::new(1, 480);
    c.deposit(7, Money::from_cents(5000));

    c.place_order(market, None, Side::Buy, 1000, 5, 1, 7).unwrap();
    assert_eq!(c.economy.account(7).locked, Money::from_cents(5000));

    c.cancel_order(1).unwrap();
    assert_eq!(c.economy.account(7).locked, Money::ZERO);
    assert_eq!(c.economy.account(7).available, Money::from_cents(5000));
}

#[test]
fn settlement_resolves_open_positions_against_system() {
    let mut c = fresh();
    let market = MarketId::new(1, 60);
    c.deposit(2, Money::from_cents(10_000));

    c.place_order(market, None, Side::Sell, 50, 10, 1, 3).unwrap();
    c.place_order(market, None, Side::Buy, 50, 10, 2, 2).unwrap();

    let trades = c.settle_markets_for(1, 120).unwrap();
    assert_eq!(trades.len(), 2);
    for t in &trades {
        assert_eq!(t.price, 1);
        assert_eq!(t.qty, 10);
    }
}

#[test]
fn inactive_market_rejects_further_orders_after_settlement() {
    let mut c = fresh();
    let market = MarketId::new(1, 60);
    c.place_order(market, None, Side::Sell, 50, 5, 1, 1).unwrap();
    c.settle_markets_for(1, 0).unwrap();

    let err = c
        .place_order(market, None, Side::Sell, 50, 5, 2, 1)
        .unwrap_err();
    assert!(matches!(
        err,
        outcome_exchange::EngineError::MarketInactive(_)
    ));
}

#[test]
fn duplicate_order_id_across_separate_place_calls_is_rejected() {
    let mut c = fresh();
    let market = MarketId::new(1, 480);
    c.deposit(7, Money::from_cents(10_000));

    c.place_order(market, None, Side::Buy, 50, 5, 1, 7).unwrap();
    let err = c
        .place_order(market, None, Side::Sell, 50, 5, 1, 8)
        .unwrap_err();
    assert!(matches!(
        err,
        outcome_exchange::EngineError::DuplicateOrderId(1)
    ));
}
