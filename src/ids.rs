//! Identifier types shared across the engine, economy, and registry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque 64-bit order identifier, unique across the entire engine lifetime.
pub type OrderId = u64;

/// Dense 64-bit user identifier. `0` is reserved for [`SYSTEM`].
pub type UserId = u64;

/// Reserved user id absorbing the opposite side of settlement trades.
pub const SYSTEM: UserId = 0;

/// Identifies one binary market: a target and the threshold it settles against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarketId {
    pub target_id: u64,
    pub threshold: u32,
}

impl MarketId {
    pub fn new(target_id: u64, threshold: u32) -> Self {
        Self {
            target_id,
            threshold,
        }
    }

    /// Human-readable default display name, used when a market is created
    /// without an explicit name.
    pub fn default_name(&self) -> String {
        format!("{} @ {}", self.target_id, self.threshold)
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_id, self.threshold)
    }
}

/// Which side of the book an order rests on or an incoming order crosses from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}
