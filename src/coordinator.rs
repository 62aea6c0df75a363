//! Thin orchestrator sequencing lock → match → confirm → refund → audit
//! (spec §4.6), grounded in `interface.py::_handle_place_order`.

use tracing::{info, warn};

use crate::auditor::Auditor;
use crate::economy::EconomyManager;
use crate::engine::MatchingEngine;
use crate::errors::{EngineError, EngineResult};
use crate::ids::{MarketId, OrderId, Side, UserId};
use crate::money::Money;
use crate::trade::Trade;

pub struct Coordinator {
    pub engine: MatchingEngine,
    pub economy: EconomyManager,
    total_deposited: Money,
    audit_every_call: bool,
}

/// §6 — the core API's `place_order` return shape.
#[derive(Debug, Clone)]
pub struct PlaceOrderOutcome {
    pub trades: Vec<Trade>,
    pub refund: Money,
}

impl PlaceOrderOutcome {
    pub fn refund_cents(&self) -> i64 {
        self.refund.cents()
    }
}

/// §6 — `balance(user_id) -> {available, locked, positions}`.
#[derive(Debug, Clone)]
pub struct Balance {
    pub available: Money,
    pub locked: Money,
    pub positions: std::collections::HashMap<MarketId, i64>,
}

impl Coordinator {
    pub fn new(audit_every_call: bool) -> Self {
        Self {
            engine: MatchingEngine::new(),
            economy: EconomyManager::new(),
            total_deposited: Money::ZERO,
            audit_every_call,
        }
    }

    pub fn deposit(&mut self, user_id: UserId, amount: Money) {
        self.economy.deposit(user_id, amount);
        self.total_deposited += amount;
    }

    pub fn total_deposited(&self) -> Money {
        self.total_deposited
    }

    /// Used only by [`crate::persistence::load_state`] when rebuilding a
    /// coordinator from a snapshot, where deposits already happened in a
    /// prior process.
    pub fn set_total_deposited(&mut self, amount: Money) {
        self.total_deposited = amount;
    }

    fn audit(&self) -> EngineResult<()> {
        if !self.audit_every_call {
            return Ok(());
        }
        Auditor::new(&self.engine, &self.economy).run_full_audit(self.total_deposited)
    }

    /// §4.6.1. Buy-side orders lock funds before the book ever sees them;
    /// a failed match unwinds the lock. On success, every trade is settled
    /// and any price-improvement difference is refunded once, in aggregate,
    /// not per-fill — matching `interface.py`'s single refund at the end of
    /// the call rather than inside the matching loop.
    pub fn place_order(
        &mut self,
        market_id: MarketId,
        market_name: Option<String>,
        side: Side,
        price: i64,
        qty: u64,
        order_id: OrderId,
        user_id: UserId,
    ) -> EngineResult<PlaceOrderOutcome> {
        let price_money = Money::from_cents(price);

        if side == Side::Buy && !self.economy.attempt_order_lock(user_id, price_money, qty) {
            let needed = price_money.times_qty(qty);
            let available = self.economy.account(user_id).available;
            warn!(user_id, %needed, %available, "order rejected: insufficient funds");
            return Err(EngineError::InsufficientFunds {
                user_id,
                needed,
                available,
            });
        }

        self.engine.create_market(market_id, market_name);

        let trades = match self
            .engine
            .process_order(market_id, side, price, qty, order_id, user_id)
        {
            Ok(trades) => trades,
            Err(e) => {
                if side == Side::Buy {
                    self.economy.release_order_lock(user_id, price_money, qty);
                }
                return Err(e);
            }
        };

        for trade in &trades {
            let trade_price = Money::from_cents(trade.price as i64);
            self.economy.confirm_trade(
                trade.buy_user_id,
                trade.sell_user_id,
                market_id,
                trade_price,
                trade.qty as u64,
            );
        }

        let mut refund = Money::ZERO;
        if side == Side::Buy {
            let total_filled: u64 = trades
                .iter()
                .filter(|t| t.buy_user_id == user_id)
                .map(|t| t.qty as u64)
                .sum();
            if total_filled > 0 {
                let total_paid: Money = trades
                    .iter()
                    .filter(|t| t.buy_user_id == user_id)
                    .map(|t| Money::from_cents(t.price as i64).times_qty(t.qty as u64))
                    .sum();
                let total_locked = price_money.times_qty(total_filled);
                if let Some(r) = total_locked.checked_sub(total_paid) {
                    if r.cents() > 0 {
                        self.economy.release_order_lock(user_id, r, 1);
                        refund = r;
                    }
                }
            }
        }

        self.audit()?;

        info!(order_id, %market_id, trades = trades.len(), "order placed");
        Ok(PlaceOrderOutcome { trades, refund })
    }

    /// §4.2.2 — a market order isn't supported; an "aggressive" buy is a
    /// limit posted at `ceiling_cents`, the worst price the caller is
    /// willing to pay, guaranteed to cross every resting ask.
    #[allow(clippy::too_many_arguments)]
    pub fn place_aggressive_buy(
        &mut self,
        market_id: MarketId,
        market_name: Option<String>,
        qty: u64,
        order_id: OrderId,
        user_id: UserId,
        ceiling_cents: i64,
    ) -> EngineResult<PlaceOrderOutcome> {
        self.place_order(
            market_id,
            market_name,
            Side::Buy,
            ceiling_cents,
            qty,
            order_id,
            user_id,
        )
    }

    /// §6 — `balance(user_id) -> {available, locked, positions}`.
    pub fn balance(&self, user_id: UserId) -> Balance {
        let account = self.economy.account(user_id);
        Balance {
            available: account.available,
            locked: account.locked,
            positions: account.portfolio,
        }
    }

    /// §4.6.2 — release a buy-side lock on cancel; sell-side orders never
    /// locked anything.
    pub fn cancel_order(&mut self, order_id: OrderId) -> EngineResult<()> {
        let meta = self.engine.cancel_order(order_id)?;
        if meta.side == Side::Buy {
            self.economy.release_order_lock(
                meta.user_id,
                Money::from_cents(meta.price),
                meta.remaining_qty,
            );
        }
        self.audit()?;
        Ok(())
    }

    /// §4.6.3 — settle every market for `target_id`, routing the synthetic
    /// settlement trades through `confirm_trade` exactly like matched
    /// trades (buyer pays, seller receives, SYSTEM absorbs the other leg).
    pub fn settle_markets_for(&mut self, target_id: u64, actual_value: u64) -> EngineResult<Vec<Trade>> {
        let results = self.engine.settle_markets_for(target_id, actual_value);
        let mut all_trades = Vec::new();
        for (market_id, trades) in results {
            for trade in &trades {
                let trade_price = Money::from_cents(trade.price as i64);
                self.economy.confirm_trade(
                    trade.buy_user_id,
                    trade.sell_user_id,
                    market_id,
                    trade_price,
                    trade.qty as u64,
                );
            }
            all_trades.extend(trades);
        }
        self.audit()?;
        Ok(all_trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_order_rejects_without_funds() {
        let mut c = Coordinator::new(true);
        let market = MarketId::new(1, 480);
        let err = c
            .place_order(market, None, Side::Buy, 60, 10, 1, 7)
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds { .. }));
    }

    #[test]
    fn place_order_locks_and_settles_full_fill() {
        let mut c = Coordinator::new(true);
        let market = MarketId::new(1, 480);
        c.deposit(2, Money::from_cents(1000));

        c.place_order(market, None, Side::Sell, 60, 10, 1, 1).unwrap();
        let outcome = c.place_order(market, None, Side::Buy, 60, 10, 2, 2).unwrap();

        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.refund, Money::ZERO);
        assert_eq!(c.economy.account(2).locked, Money::ZERO);
        assert_eq!(c.economy.account(2).available, Money::from_cents(400));
        assert_eq!(c.economy.account(1).available, Money::from_cents(600));
    }

    #[test]
    fn price_improvement_refunds_the_difference_once() {
        let mut c = Coordinator::new(true);
        let market = MarketId::new(1, 480);
        c.deposit(2, Money::from_cents(1000));

        c.place_order(market, None, Side::Sell, 50, 10, 1, 1).unwrap();
        let outcome = c.place_order(market, None, Side::Buy, 60, 10, 2, 2).unwrap();

        // Locked 10*60=600, but paid 10*50=500, so 100 should be refunded.
        assert_eq!(outcome.refund, Money::from_cents(100));
        assert_eq!(c.economy.account(2).locked, Money::ZERO);
        assert_eq!(c.economy.account(2).available, Money::from_cents(500));
    }

    #[test]
    fn aggressive_buy_crosses_the_whole_book_at_the_ceiling() {
        let mut c = Coordinator::new(true);
        let market = MarketId::new(1, 480);
        c.deposit(2, Money::from_cents(1000));

        c.place_order(market, None, Side::Sell, 40, 10, 1, 1).unwrap();
        let outcome = c
            .place_aggressive_buy(market, None, 10, 2, 2, 100)
            .unwrap();

        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].price, 40);
    }

    #[test]
    fn cancel_releases_buy_side_lock() {
        let mut c = Coordinator::new(true);
        let market = MarketId::new(1, 480);
        c.deposit(2, Money::from_cents(1000));
        c.place_order(market, None, Side::Buy, 60, 10, 1, 2).unwrap();
        assert_eq!(c.economy.account(2).locked, Money::from_cents(600));

        c.cancel_order(1).unwrap();
        assert_eq!(c.economy.account(2).locked, Money::ZERO);
        assert_eq!(c.economy.account(2).available, Money::from_cents(1000));
    }

    #[test]
    fn settlement_pays_longs_from_system() {
        let mut c = Coordinator::new(true);
        let market = MarketId::new(9, 480);
        c.deposit(1, Money::from_cents(1000));
        c.deposit(2, Money::from_cents(1000));

        c.place_order(market, None, Side::Sell, 40, 5, 1, 1).unwrap();
        c.place_order(market, None, Side::Buy, 40, 5, 2, 2).unwrap();

        let before = c.economy.account(2).available;
        let trades = c.settle_markets_for(9, 500).unwrap();
        assert_eq!(trades.len(), 1);
        let after = c.economy.account(2).available;
        assert!(after >= before);
    }

    #[test]
    fn balance_reports_available_locked_and_positions() {
        let mut c = Coordinator::new(true);
        let market = MarketId::new(1, 480);
        c.deposit(2, Money::from_cents(1000));

        c.place_order(market, None, Side::Sell, 50, 10, 1, 1).unwrap();
        c.place_order(market, None, Side::Buy, 50, 10, 2, 2).unwrap();

        let balance = c.balance(2);
        assert_eq!(balance.locked, Money::ZERO);
        assert_eq!(balance.available, Money::from_cents(500));
        assert_eq!(balance.positions.get(&market).copied(), Some(10));
    }

    #[test]
    fn shared_coordinator_allows_concurrent_readers() {
        use crate::SharedCoordinator;
        use std::sync::Arc;

        let shared: SharedCoordinator = Arc::new(tokio::sync::RwLock::new(Coordinator::new(true)));

        let _reader_a = shared.try_read().expect("first reader");
        let _reader_b = shared.try_read().expect("second reader, concurrent with the first");
        drop(_reader_a);
        drop(_reader_b);

        let mut writer = shared.try_write().expect("no readers left, writer acquires");
        writer.deposit(1, Money::from_cents(500));
        drop(writer);

        assert!(shared.try_read().is_ok());
    }
}
