//! The resting-order node stored in a [`crate::price_level::PriceLevelQueue`].

use crate::ids::{OrderId, UserId};

#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub price: i64,
    pub quantity: u64,
    pub timestamp: u64,
}
