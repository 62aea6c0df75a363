//! Engine-global registry mirroring every resting order across all markets,
//! giving O(1) cross-market cancellation (spec §3, §4.3).

use std::collections::HashMap;

use crate::ids::{MarketId, OrderId, Side, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderMetadata {
    pub market_id: MarketId,
    pub side: Side,
    pub price: i64,
    pub remaining_qty: u64,
    pub user_id: UserId,
}

#[derive(Debug, Default)]
pub struct OrderRegistry {
    entries: HashMap<OrderId, OrderMetadata>,
}

impl OrderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, order_id: OrderId) -> Option<&OrderMetadata> {
        self.entries.get(&order_id)
    }

    pub fn insert(&mut self, order_id: OrderId, meta: OrderMetadata) {
        self.entries.insert(order_id, meta);
    }

    pub fn remove(&mut self, order_id: OrderId) -> Option<OrderMetadata> {
        self.entries.remove(&order_id)
    }

    pub fn set_remaining_qty(&mut self, order_id: OrderId, qty: u64) {
        if let Some(meta) = self.entries.get_mut(&order_id) {
            meta.remaining_qty = qty;
        }
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.entries.contains_key(&order_id)
    }

    pub fn clear_market(&mut self, market_id: MarketId) {
        self.entries.retain(|_, meta| meta.market_id != market_id);
    }

    /// Sum of `remaining_qty` for every registry entry belonging to `market_id`.
    /// Used by the auditor's registry-integrity check (I2/I3).
    pub fn volume_for_market(&self, market_id: MarketId) -> u64 {
        self.entries
            .values()
            .filter(|meta| meta.market_id == market_id)
            .map(|meta| meta.remaining_qty)
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OrderId, &OrderMetadata)> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
