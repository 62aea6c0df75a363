//! Core of a multi-market limit-order-book exchange for binary outcome
//! contracts: price-time-priority matching, cross-market order cancellation,
//! fund custody, and terminal settlement against a reserved SYSTEM
//! counterparty. See `SPEC_FULL.md` for the full shape.

pub mod auditor;
pub mod config;
pub mod coordinator;
pub mod economy;
pub mod engine;
pub mod errors;
pub mod ids;
pub mod money;
pub mod order;
pub mod orderbook;
pub mod persistence;
pub mod price_level;
pub mod registry;
pub mod trade;

/// A `Coordinator` behind the single-writer/cooperative-reader lock spec §5
/// describes: many callers may hold a read guard (snapshots, balance
/// queries) concurrently, but a write guard is exclusive. `Coordinator`
/// itself does no I/O, so this is a plain `RwLock`, not an async one guarding
/// a network call.
pub type SharedCoordinator = std::sync::Arc<tokio::sync::RwLock<Coordinator>>;

pub use coordinator::{Balance, Coordinator, PlaceOrderOutcome};
pub use economy::{Account, EconomyManager};
pub use engine::{MarketSummary, MatchingEngine};
pub use errors::{EngineError, EngineResult};
pub use ids::{MarketId, OrderId, Side, UserId, SYSTEM};
pub use money::Money;
pub use orderbook::{BookSnapshot, Level, OrderBook};
pub use trade::Trade;
