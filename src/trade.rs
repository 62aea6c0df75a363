//! The trade record, persisted and broadcast in the bit-level shape fixed by
//! spec §6: synthetic settlement trades use `-1` for the order-id fields.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

pub const SYNTHETIC_ORDER_ID: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub buy_order_id: i64,
    pub sell_order_id: i64,
    pub price: i32,
    pub qty: i32,
    pub maker_order_id: i64,
    pub taker_order_id: i64,
    pub buy_user_id: UserId,
    pub sell_user_id: UserId,
}

impl Trade {
    pub fn is_synthetic(&self) -> bool {
        self.maker_order_id == SYNTHETIC_ORDER_ID && self.taker_order_id == SYNTHETIC_ORDER_ID
    }
}
