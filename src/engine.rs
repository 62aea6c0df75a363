//! Multi-market router: owns one [`OrderBook`] per [`MarketId`] plus the
//! engine-global [`OrderRegistry`] that mirrors every resting order so a
//! cancel can find its market in O(1) (spec §3, §4.3).

use std::collections::HashMap;

use tracing::{info, warn};

use crate::errors::{EngineError, EngineResult};
use crate::ids::{MarketId, OrderId, Side, UserId};
use crate::orderbook::{BookSnapshot, OrderBook};
use crate::registry::{OrderMetadata, OrderRegistry};
use crate::trade::Trade;

/// §6 — one row of `list_markets`'s `{market_id, name, best_bid, best_ask}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSummary {
    pub market_id: MarketId,
    pub name: String,
    pub best_bid: Option<i64>,
    pub best_ask: Option<i64>,
}

pub struct MatchingEngine {
    markets: HashMap<MarketId, OrderBook>,
    market_names: HashMap<MarketId, String>,
    registry: OrderRegistry,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self {
            markets: HashMap::new(),
            market_names: HashMap::new(),
            registry: OrderRegistry::new(),
        }
    }

    pub fn registry(&self) -> &OrderRegistry {
        &self.registry
    }

    /// Create the market if it doesn't exist yet, using `market_id`'s
    /// default display name unless one is given.
    pub fn create_market(&mut self, market_id: MarketId, name: Option<String>) {
        if self.markets.contains_key(&market_id) {
            return;
        }
        self.markets.insert(market_id, OrderBook::new(market_id));
        self.market_names
            .insert(market_id, name.unwrap_or_else(|| market_id.default_name()));
        info!(%market_id, "market created");
    }

    pub fn has_market(&self, market_id: MarketId) -> bool {
        self.markets.contains_key(&market_id)
    }

    /// Mark a market settled without running `settle_market` again. Used by
    /// [`crate::persistence::load_state`] when restoring a market that was
    /// already settled before the snapshot was taken.
    pub fn deactivate_market(&mut self, market_id: MarketId) {
        if let Some(book) = self.markets.get_mut(&market_id) {
            book.deactivate();
        }
    }

    /// Re-rest an order carrying its original timestamp, used by
    /// [`crate::persistence::load_state`] to restore FIFO priority. Orders
    /// for one market must be restored in ascending timestamp order.
    pub fn restore_order(
        &mut self,
        market_id: MarketId,
        side: Side,
        price: i64,
        qty: u64,
        order_id: OrderId,
        user_id: UserId,
        timestamp: u64,
    ) {
        if let Some(book) = self.markets.get_mut(&market_id) {
            book.restore_resting(side, price, qty, order_id, user_id, timestamp);
        }
    }

    /// §4.3.2 — submit an order to one market and keep the registry in sync:
    /// any maker order the book fully consumed is dropped from the registry;
    /// any remainder the book rested is (re-)registered with its fresh
    /// quantity. `OrderId` uniqueness (§3/§7) is engine-wide, not per-market,
    /// so this checks the registry before ever asking the book — a book's
    /// own duplicate check only sees its own local orders and would let the
    /// same id rest in two different markets.
    pub fn process_order(
        &mut self,
        market_id: MarketId,
        side: Side,
        price: i64,
        qty: u64,
        order_id: OrderId,
        user_id: UserId,
    ) -> EngineResult<Vec<Trade>> {
        if self.registry.contains(order_id) {
            return Err(EngineError::DuplicateOrderId(order_id));
        }

        let book = self
            .markets
            .get_mut(&market_id)
            .ok_or(EngineError::MarketInactive(market_id))?;

        let trades = book.process_order(side, price, qty, order_id, user_id)?;

        for trade in &trades {
            let maker_id = trade.maker_order_id as u64;
            if !book_still_resting(book, maker_id) {
                self.registry.remove(maker_id);
            }
        }

        if book_still_resting(book, order_id) {
            let remaining = book
                .iter_resting()
                .find(|(id, ..)| *id == order_id)
                .map(|(_, _, _, qty, _)| qty)
                .unwrap_or(0);
            self.registry.insert(
                order_id,
                OrderMetadata {
                    market_id,
                    side,
                    price,
                    remaining_qty: remaining,
                    user_id,
                },
            );
        }

        Ok(trades)
    }

    /// §4.3.3 — O(1) cross-market cancel via the registry.
    pub fn cancel_order(&mut self, order_id: OrderId) -> EngineResult<OrderMetadata> {
        let meta = self
            .registry
            .remove(order_id)
            .ok_or(EngineError::UnknownOrder(order_id))?;
        let book = self
            .markets
            .get_mut(&meta.market_id)
            .ok_or(EngineError::UnknownOrder(order_id))?;
        book.cancel_order(order_id);
        Ok(meta)
    }

    /// §4.3.4 — settle every market whose `target_id` matches, given the
    /// realized value the threshold is compared against.
    pub fn settle_markets_for(&mut self, target_id: u64, actual_value: u64) -> Vec<(MarketId, Vec<Trade>)> {
        let mut results = Vec::new();
        let market_ids: Vec<MarketId> = self
            .markets
            .keys()
            .filter(|m| m.target_id == target_id)
            .copied()
            .collect();

        for market_id in market_ids {
            let terminal_price: u8 = if actual_value >= market_id.threshold as u64 { 1 } else { 0 };
            let book = self.markets.get_mut(&market_id).unwrap();
            let trades = book.settle_market(terminal_price);
            self.registry.clear_market(market_id);
            info!(%market_id, terminal_price, trades = trades.len(), "market settled");
            results.push((market_id, trades));
        }
        results
    }

    pub fn snapshot_market(&self, market_id: MarketId) -> Option<BookSnapshot> {
        self.markets.get(&market_id).map(|b| b.snapshot())
    }

    pub fn market_name(&self, market_id: MarketId) -> Option<&str> {
        self.market_names.get(&market_id).map(String::as_str)
    }

    pub fn list_markets(&mut self) -> Vec<MarketSummary> {
        let ids: Vec<MarketId> = self.markets.keys().copied().collect();
        ids.into_iter()
            .map(|id| {
                let name = self
                    .market_names
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| id.default_name());
                let book = self.markets.get_mut(&id).unwrap();
                MarketSummary {
                    market_id: id,
                    name,
                    best_bid: book.best_bid(),
                    best_ask: book.best_ask(),
                }
            })
            .collect()
    }

    /// §9 — rebuild the registry from scratch by walking every book's
    /// resting orders. Used after a [`crate::persistence`] load, where the
    /// registry is not itself part of the serialized state.
    pub fn rebuild_registry(&mut self) {
        self.registry.clear();
        for (market_id, book) in &self.markets {
            for (order_id, side, price, remaining_qty, user_id) in book.iter_resting() {
                self.registry.insert(
                    order_id,
                    OrderMetadata {
                        market_id: *market_id,
                        side,
                        price,
                        remaining_qty,
                        user_id,
                    },
                );
            }
        }
        warn!(orders = self.registry.iter().count(), "registry rebuilt");
    }

    pub fn markets(&self) -> impl Iterator<Item = (&MarketId, &OrderBook)> {
        self.markets.iter()
    }

    pub fn markets_mut(&mut self) -> impl Iterator<Item = (&MarketId, &mut OrderBook)> {
        self.markets.iter_mut()
    }
}

fn book_still_resting(book: &OrderBook, order_id: OrderId) -> bool {
    book.iter_resting().any(|(id, ..)| id == order_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_order_registers_resting_remainder() {
        let mut engine = MatchingEngine::new();
        let market = MarketId::new(1, 480);
        engine.create_market(market, None);

        engine
            .process_order(market, Side::Buy, 60, 10, 1, 7)
            .unwrap();
        assert!(engine.registry().contains(1));
        assert_eq!(engine.registry().get(1).unwrap().remaining_qty, 10);
    }

    #[test]
    fn process_order_removes_fully_filled_maker_from_registry() {
        let mut engine = MatchingEngine::new();
        let market = MarketId::new(1, 480);
        engine.create_market(market, None);

        engine
            .process_order(market, Side::Sell, 60, 10, 1, 7)
            .unwrap();
        assert!(engine.registry().contains(1));

        engine
            .process_order(market, Side::Buy, 60, 10, 2, 8)
            .unwrap();
        assert!(!engine.registry().contains(1));
        assert!(!engine.registry().contains(2));
    }

    #[test]
    fn duplicate_order_id_rejected_across_markets() {
        let mut engine = MatchingEngine::new();
        let a = MarketId::new(1, 480);
        let b = MarketId::new(2, 480);
        engine.create_market(a, None);
        engine.create_market(b, None);

        engine.process_order(a, Side::Buy, 50, 5, 1, 1).unwrap();
        let err = engine.process_order(b, Side::Sell, 50, 5, 1, 2).unwrap_err();
        assert_eq!(err, EngineError::DuplicateOrderId(1));
    }

    #[test]
    fn cancel_unknown_order_is_an_error() {
        let mut engine = MatchingEngine::new();
        let err = engine.cancel_order(999).unwrap_err();
        assert_eq!(err, EngineError::UnknownOrder(999));
    }

    #[test]
    fn cancel_is_cross_market_o1() {
        let mut engine = MatchingEngine::new();
        let market = MarketId::new(2, 30);
        engine.create_market(market, None);
        engine
            .process_order(market, Side::Buy, 50, 5, 10, 1)
            .unwrap();

        let meta = engine.cancel_order(10).unwrap();
        assert_eq!(meta.market_id, market);
        assert!(!engine.registry().contains(10));
    }

    #[test]
    fn settle_markets_for_picks_terminal_price_from_threshold() {
        let mut engine = MatchingEngine::new();
        let below = MarketId::new(5, 480);
        let above = MarketId::new(5, 60);
        engine.create_market(below, None);
        engine.create_market(above, None);

        engine.process_order(below, Side::Sell, 50, 3, 1, 1).unwrap();
        engine.process_order(below, Side::Buy, 50, 3, 2, 2).unwrap();
        engine.process_order(above, Side::Sell, 50, 3, 3, 1).unwrap();
        engine.process_order(above, Side::Buy, 50, 3, 4, 2).unwrap();

        let results = engine.settle_markets_for(5, 120);
        assert_eq!(results.len(), 2);
        for (market_id, trades) in &results {
            let expected = if market_id.threshold <= 120 { 1 } else { 0 };
            for t in trades {
                assert_eq!(t.price, expected);
            }
        }
    }

    #[test]
    fn list_markets_reports_name_and_best_prices() {
        let mut engine = MatchingEngine::new();
        let market = MarketId::new(1, 480);
        engine.create_market(market, Some("will-it-rain".to_string()));
        engine.process_order(market, Side::Sell, 60, 5, 1, 1).unwrap();

        let markets = engine.list_markets();
        assert_eq!(markets.len(), 1);
        assert_eq!(markets[0].name, "will-it-rain");
        assert_eq!(markets[0].best_ask, Some(60));
        assert_eq!(markets[0].best_bid, None);
    }

    #[test]
    fn rebuild_registry_reflects_every_resting_order() {
        let mut engine = MatchingEngine::new();
        let market = MarketId::new(1, 480);
        engine.create_market(market, None);
        engine.process_order(market, Side::Buy, 55, 4, 1, 1).unwrap();
        engine.process_order(market, Side::Sell, 60, 4, 2, 2).unwrap();

        engine.rebuild_registry();
        assert!(engine.registry().contains(1));
        assert!(engine.registry().contains(2));
    }
}
