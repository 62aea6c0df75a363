//! The opaque external snapshot interface (spec §6). A [`StateBlob`] is a
//! plain serializable value; this module makes no claim about how it
//! reaches disk or a database — that boundary is explicitly out of scope.
//! The only contract is round-trip fidelity: every resting order (with its
//! original timestamp, to keep FIFO priority across a reload), every
//! market's active flag and name, and every account's available/locked/
//! portfolio balances.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::coordinator::Coordinator;
use crate::economy::Account;
use crate::ids::{MarketId, OrderId, Side, UserId};
use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub side: Side,
    pub price: i64,
    pub quantity: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRecord {
    pub market_id: MarketId,
    pub name: String,
    pub active: bool,
    pub orders: Vec<OrderRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateBlob {
    pub markets: Vec<MarketRecord>,
    pub accounts: HashMap<UserId, Account>,
    pub total_deposited: Money,
}

impl StateBlob {
    /// A `StateBlob` is opaque as far as this crate is concerned (spec §6),
    /// but JSON text is the obvious concrete encoding for it, the same way
    /// the teacher's own store serializes its records before they reach
    /// disk. Callers outside this crate own the actual file/DB boundary.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// §6 — serialize every market's resting orders and every account.
/// Settled (inactive) markets carry no orders but are still recorded so
/// their `active: false` flag survives the round trip.
pub fn dump_state(coordinator: &Coordinator) -> StateBlob {
    let markets = coordinator
        .engine
        .markets()
        .map(|(market_id, book)| {
            let mut orders: Vec<OrderRecord> = book
                .iter_resting_with_timestamp()
                .map(|(order_id, side, price, quantity, user_id, timestamp)| OrderRecord {
                    order_id,
                    user_id,
                    side,
                    price,
                    quantity,
                    timestamp,
                })
                .collect();
            orders.sort_by_key(|o| o.timestamp);

            MarketRecord {
                market_id: *market_id,
                name: coordinator
                    .engine
                    .market_name(*market_id)
                    .unwrap_or_default()
                    .to_string(),
                active: book.is_active(),
                orders,
            }
        })
        .collect();

    let accounts = coordinator
        .economy
        .accounts()
        .map(|(id, acct)| (*id, acct.clone()))
        .collect();

    StateBlob {
        markets,
        accounts,
        total_deposited: coordinator.total_deposited(),
    }
}

/// §6 — rebuild a [`Coordinator`] from a [`StateBlob`]. Orders are restored
/// in ascending timestamp order per market so the FIFO queues come back
/// exactly as they were. Callers MUST treat this as a full replacement: the
/// returned coordinator's registry is already consistent, since
/// `rebuild_registry` runs as the final step.
pub fn load_state(blob: StateBlob, audit_every_call: bool) -> Coordinator {
    let mut coordinator = Coordinator::new(audit_every_call);
    coordinator.set_total_deposited(blob.total_deposited);

    for (user_id, account) in blob.accounts {
        coordinator.economy.restore_account(user_id, account);
    }

    for market in blob.markets {
        coordinator
            .engine
            .create_market(market.market_id, Some(market.name));
        if !market.active {
            coordinator.engine.deactivate_market(market.market_id);
            continue;
        }
        for order in market.orders {
            coordinator.engine.restore_order(
                market.market_id,
                order.side,
                order.price,
                order.quantity,
                order.order_id,
                order.user_id,
                order.timestamp,
            );
        }
    }

    coordinator.engine.rebuild_registry();
    coordinator
}
