//! One market's price-level book: two price-indexed maps, two lazy-deletion
//! heaps for best-price lookup, an order-id index, and per-user net
//! positions (spec §4.2).

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::{EngineError, EngineResult};
use crate::ids::{MarketId, OrderId, Side, UserId, SYSTEM};
use crate::order::Order;
use crate::price_level::{OrderArena, PriceLevelQueue};
use crate::trade::{Trade, SYNTHETIC_ORDER_ID};

struct OrderLocation {
    idx: usize,
    side: Side,
    price: i64,
}

pub struct OrderBook {
    market_id: MarketId,
    arena: OrderArena,
    orders: HashMap<OrderId, OrderLocation>,
    bids: HashMap<i64, PriceLevelQueue>,
    asks: HashMap<i64, PriceLevelQueue>,
    bid_heap: BinaryHeap<i64>,
    ask_heap: BinaryHeap<Reverse<i64>>,
    positions: HashMap<UserId, i64>,
    active: bool,
    next_timestamp: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Level {
    pub price: i64,
    pub volume: u64,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookSnapshot {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

impl OrderBook {
    pub fn new(market_id: MarketId) -> Self {
        Self {
            market_id,
            arena: OrderArena::new(),
            orders: HashMap::new(),
            bids: HashMap::new(),
            asks: HashMap::new(),
            bid_heap: BinaryHeap::new(),
            ask_heap: BinaryHeap::new(),
            positions: HashMap::new(),
            active: true,
            next_timestamp: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn market_id(&self) -> MarketId {
        self.market_id
    }

    /// Mark the book inactive without touching positions or resting
    /// orders, used when restoring an already-settled market from a
    /// [`crate::persistence::StateBlob`] (which carries no orders for a
    /// settled market).
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn orders_len(&self) -> usize {
        self.orders.len()
    }

    pub fn position_of(&self, user_id: UserId) -> i64 {
        self.positions.get(&user_id).copied().unwrap_or(0)
    }

    pub fn positions(&self) -> impl Iterator<Item = (&UserId, &i64)> {
        self.positions.iter()
    }

    fn next_ts(&mut self) -> u64 {
        let ts = self.next_timestamp;
        self.next_timestamp += 1;
        ts
    }

    fn adjust_position(&mut self, user_id: UserId, delta: i64) {
        let entry = self.positions.entry(user_id).or_insert(0);
        *entry += delta;
        if *entry == 0 {
            self.positions.remove(&user_id);
        }
    }

    /// §4.2.1 — rest a brand-new order with a fresh monotonic timestamp.
    pub fn add_resting(
        &mut self,
        side: Side,
        price: i64,
        qty: u64,
        order_id: OrderId,
        user_id: UserId,
    ) -> EngineResult<()> {
        if !self.active {
            return Err(EngineError::MarketInactive(self.market_id));
        }
        let ts = self.next_ts();
        self.insert_resting(side, price, qty, order_id, user_id, ts)
    }

    /// Re-rest an order carrying its original timestamp, used by
    /// [`crate::persistence::load_state`] to restore FIFO priority across a
    /// reload. Callers must restore orders in ascending timestamp order and
    /// then bump `next_timestamp` past the highest one seen.
    pub fn restore_resting(
        &mut self,
        side: Side,
        price: i64,
        qty: u64,
        order_id: OrderId,
        user_id: UserId,
        timestamp: u64,
    ) {
        self.insert_resting(side, price, qty, order_id, user_id, timestamp)
            .expect("restoring into an active book");
        if timestamp >= self.next_timestamp {
            self.next_timestamp = timestamp + 1;
        }
    }

    fn insert_resting(
        &mut self,
        side: Side,
        price: i64,
        qty: u64,
        order_id: OrderId,
        user_id: UserId,
        ts: u64,
    ) -> EngineResult<()> {
        let order = Order {
            order_id,
            user_id,
            price,
            quantity: qty,
            timestamp: ts,
        };
        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let is_new_level = !levels.contains_key(&price);
        let queue = levels.entry(price).or_insert_with(PriceLevelQueue::new);
        let idx = queue.append(&mut self.arena, order);
        if is_new_level {
            match side {
                Side::Buy => self.bid_heap.push(price),
                Side::Sell => self.ask_heap.push(Reverse(price)),
            }
        }
        self.orders.insert(order_id, OrderLocation { idx, side, price });
        Ok(())
    }

    /// §4.2.2 — match an incoming order against the book, resting any
    /// remainder. Returns every trade produced, best-price-first and
    /// time-priority within a level.
    pub fn process_order(
        &mut self,
        side: Side,
        price: i64,
        qty: u64,
        order_id: OrderId,
        user_id: UserId,
    ) -> EngineResult<Vec<Trade>> {
        if !self.active {
            return Err(EngineError::MarketInactive(self.market_id));
        }
        if qty == 0 {
            return Err(EngineError::InvalidQuantity(qty));
        }
        if self.orders.contains_key(&order_id) {
            return Err(EngineError::DuplicateOrderId(order_id));
        }

        let mut remaining = qty;
        let mut trades = Vec::new();

        match side {
            Side::Buy => self.match_buy(price, &mut remaining, order_id, user_id, &mut trades),
            Side::Sell => self.match_sell(price, &mut remaining, order_id, user_id, &mut trades),
        }

        if remaining > 0 {
            self.add_resting(side, price, remaining, order_id, user_id)?;
        }

        info!(
            market_order_id = order_id,
            side = %side,
            filled = qty - remaining,
            resting = remaining,
            trades = trades.len(),
            "processed order"
        );
        Ok(trades)
    }

    fn match_buy(
        &mut self,
        price: i64,
        remaining: &mut u64,
        taker_id: OrderId,
        taker_user: UserId,
        trades: &mut Vec<Trade>,
    ) {
        while *remaining > 0 {
            let Some(&Reverse(best_ask)) = self.ask_heap.peek() else {
                break;
            };
            if !self.asks.contains_key(&best_ask) {
                self.ask_heap.pop();
                continue;
            }
            if price < best_ask {
                break;
            }

            loop {
                if *remaining == 0 {
                    break;
                }
                let queue = self.asks.get_mut(&best_ask).unwrap();
                let Some(head_idx) = queue.head_index() else {
                    break;
                };
                let (maker_id, maker_user, maker_qty) = {
                    let order = self.arena.get(head_idx);
                    (order.order_id, order.user_id, order.quantity)
                };
                let fill = (*remaining).min(maker_qty);

                trades.push(Trade {
                    buy_order_id: taker_id as i64,
                    sell_order_id: maker_id as i64,
                    price: best_ask as i32,
                    qty: fill as i32,
                    maker_order_id: maker_id as i64,
                    taker_order_id: taker_id as i64,
                    buy_user_id: taker_user,
                    sell_user_id: maker_user,
                });

                self.adjust_position(taker_user, fill as i64);
                self.adjust_position(maker_user, -(fill as i64));

                *remaining -= fill;
                let maker_remaining = maker_qty - fill;
                let queue = self.asks.get_mut(&best_ask).unwrap();
                queue.total_volume -= fill;
                self.arena.get_mut(head_idx).quantity = maker_remaining;

                if maker_remaining == 0 {
                    let queue = self.asks.get_mut(&best_ask).unwrap();
                    queue.remove(&mut self.arena, head_idx);
                    self.orders.remove(&maker_id);
                    warn!(order_id = maker_id, "maker order fully filled");
                }
            }

            let queue_empty = self.asks.get(&best_ask).map(|q| q.is_empty()).unwrap_or(true);
            if queue_empty {
                self.asks.remove(&best_ask);
                self.ask_heap.pop();
            }
        }
    }

    fn match_sell(
        &mut self,
        price: i64,
        remaining: &mut u64,
        taker_id: OrderId,
        taker_user: UserId,
        trades: &mut Vec<Trade>,
    ) {
        while *remaining > 0 {
            let Some(&best_bid) = self.bid_heap.peek() else {
                break;
            };
            if !self.bids.contains_key(&best_bid) {
                self.bid_heap.pop();
                continue;
            }
            if price > best_bid {
                break;
            }

            loop {
                if *remaining == 0 {
                    break;
                }
                let queue = self.bids.get_mut(&best_bid).unwrap();
                let Some(head_idx) = queue.head_index() else {
                    break;
                };
                let (maker_id, maker_user, maker_qty) = {
                    let order = self.arena.get(head_idx);
                    (order.order_id, order.user_id, order.quantity)
                };
                let fill = (*remaining).min(maker_qty);

                trades.push(Trade {
                    buy_order_id: maker_id as i64,
                    sell_order_id: taker_id as i64,
                    price: best_bid as i32,
                    qty: fill as i32,
                    maker_order_id: maker_id as i64,
                    taker_order_id: taker_id as i64,
                    buy_user_id: maker_user,
                    sell_user_id: taker_user,
                });

                self.adjust_position(taker_user, -(fill as i64));
                self.adjust_position(maker_user, fill as i64);

                *remaining -= fill;
                let maker_remaining = maker_qty - fill;
                let queue = self.bids.get_mut(&best_bid).unwrap();
                queue.total_volume -= fill;
                self.arena.get_mut(head_idx).quantity = maker_remaining;

                if maker_remaining == 0 {
                    let queue = self.bids.get_mut(&best_bid).unwrap();
                    queue.remove(&mut self.arena, head_idx);
                    self.orders.remove(&maker_id);
                    warn!(order_id = maker_id, "maker order fully filled");
                }
            }

            let queue_empty = self.bids.get(&best_bid).map(|q| q.is_empty()).unwrap_or(true);
            if queue_empty {
                self.bids.remove(&best_bid);
                self.bid_heap.pop();
            }
        }
    }

    /// §4.2.3 — O(1) cancel via the `orders` index.
    pub fn cancel_order(&mut self, order_id: OrderId) -> Option<(Side, i64, u64, UserId)> {
        let loc = self.orders.remove(&order_id)?;
        let levels = match loc.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let queue = levels.get_mut(&loc.price)?;
        let order = queue.remove(&mut self.arena, loc.idx);
        if queue.is_empty() {
            levels.remove(&loc.price);
            // Stale heap entry is reaped lazily by best_bid/best_ask.
        }
        Some((loc.side, loc.price, order.quantity, order.user_id))
    }

    /// §4.2.4 — pop stale heap entries until the top price still has a queue.
    pub fn best_bid(&mut self) -> Option<i64> {
        while let Some(&top) = self.bid_heap.peek() {
            if self.bids.contains_key(&top) {
                return Some(top);
            }
            self.bid_heap.pop();
        }
        None
    }

    pub fn best_ask(&mut self) -> Option<i64> {
        while let Some(&Reverse(top)) = self.ask_heap.peek() {
            if self.asks.contains_key(&top) {
                return Some(top);
            }
            self.ask_heap.pop();
        }
        None
    }

    /// §4.2.5 — bids sorted descending, asks ascending.
    pub fn snapshot(&self) -> BookSnapshot {
        let mut bids: Vec<Level> = self
            .bids
            .iter()
            .map(|(price, q)| Level {
                price: *price,
                volume: q.total_volume,
                count: q.count,
            })
            .collect();
        bids.sort_by(|a, b| b.price.cmp(&a.price));

        let mut asks: Vec<Level> = self
            .asks
            .iter()
            .map(|(price, q)| Level {
                price: *price,
                volume: q.total_volume,
                count: q.count,
            })
            .collect();
        asks.sort_by(|a, b| a.price.cmp(&b.price));

        BookSnapshot { bids, asks }
    }

    /// §4.2.6 — terminal settlement: close the market, cancel every resting
    /// order, and pay/collect every open position against SYSTEM.
    pub fn settle_market(&mut self, terminal_price: u8) -> Vec<Trade> {
        debug_assert!(terminal_price == 0 || terminal_price == 1);
        self.active = false;

        self.orders.clear();
        self.bids.clear();
        self.asks.clear();
        self.bid_heap.clear();
        self.ask_heap.clear();
        self.arena = OrderArena::new();

        let mut trades = Vec::new();
        let positions: Vec<(UserId, i64)> = self.positions.drain().collect();
        for (user_id, position) in positions {
            if position == 0 {
                continue;
            }
            let qty = position.unsigned_abs();
            let (buy_user, sell_user) = if position > 0 {
                (user_id, SYSTEM)
            } else {
                (SYSTEM, user_id)
            };
            trades.push(Trade {
                buy_order_id: SYNTHETIC_ORDER_ID,
                sell_order_id: SYNTHETIC_ORDER_ID,
                price: terminal_price as i32,
                qty: qty as i32,
                maker_order_id: SYNTHETIC_ORDER_ID,
                taker_order_id: SYNTHETIC_ORDER_ID,
                buy_user_id: buy_user,
                sell_user_id: sell_user,
            });
        }
        trades
    }

    /// Used by `rebuild_registry` and snapshot/restore: every resting order
    /// across both sides, in no particular order.
    pub fn iter_resting(&self) -> impl Iterator<Item = (OrderId, Side, i64, u64, UserId)> + '_ {
        self.orders.iter().map(|(id, loc)| {
            let order = self.arena.get(loc.idx);
            (*id, loc.side, loc.price, order.quantity, order.user_id)
        })
    }

    /// Like [`Self::iter_resting`] but also yields each order's original
    /// timestamp, needed to restore FIFO priority across a state reload.
    pub fn iter_resting_with_timestamp(
        &self,
    ) -> impl Iterator<Item = (OrderId, Side, i64, u64, UserId, u64)> + '_ {
        self.orders.iter().map(|(id, loc)| {
            let order = self.arena.get(loc.idx);
            (*id, loc.side, loc.price, order.quantity, order.user_id, order.timestamp)
        })
    }
}
