//! Fund custody: per-user available/locked balances, portfolio positions,
//! order-time locking, and trade-time settlement (spec §4.4).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::ids::{MarketId, UserId};
use crate::money::Money;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    pub available: Money,
    pub locked: Money,
    pub portfolio: HashMap<MarketId, i64>,
}

impl Account {
    pub fn total_equity(&self) -> Money {
        self.available + self.locked
    }

    pub fn position(&self, market_id: MarketId) -> i64 {
        self.portfolio.get(&market_id).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct EconomyManager {
    accounts: HashMap<UserId, Account>,
}

impl EconomyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily creates the account on first touch, matching
    /// `economy.py::get_account`.
    pub fn account(&self, user_id: UserId) -> Account {
        self.accounts.get(&user_id).cloned().unwrap_or_default()
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&UserId, &Account)> {
        self.accounts.iter()
    }

    fn account_mut(&mut self, user_id: UserId) -> &mut Account {
        self.accounts.entry(user_id).or_default()
    }

    /// §4.4.1 — pure credit to `available`. Not part of spec.md's matching
    /// core (deposits are external minting there), but the only way the
    /// demo CLI and tests can seed accounts without reaching into private
    /// state.
    pub fn deposit(&mut self, user_id: UserId, amount: Money) {
        self.account_mut(user_id).available += amount;
    }

    /// Used by [`crate::persistence::load_state`] to restore an account
    /// wholesale from a [`StateBlob`], bypassing `deposit`'s additive
    /// semantics.
    pub fn restore_account(&mut self, user_id: UserId, account: Account) {
        self.accounts.insert(user_id, account);
    }

    /// §4.4.2 — reserve `price * qty` from `user_id`'s available balance for
    /// a resting buy order. Returns `false` (no mutation) if insufficient.
    /// Only buyers lock cash: short-selling is implicit via a negative
    /// portfolio position, with no inventory check.
    pub fn attempt_order_lock(&mut self, user_id: UserId, price: Money, qty: u64) -> bool {
        let cost = price.times_qty(qty);
        let account = self.account_mut(user_id);
        if account.available < cost {
            return false;
        }
        account.available -= cost;
        account.locked += cost;
        true
    }

    /// §4.4.2 cont'd — move `amount * qty` from locked back to available,
    /// clamped so `locked` never goes negative. `qty = 1` refunds an
    /// explicit lump sum (used for price-improvement refunds).
    pub fn release_order_lock(&mut self, user_id: UserId, amount: Money, qty: u64) {
        let cost = amount.times_qty(qty);
        let account = self.account_mut(user_id);
        if account.locked < cost {
            warn!(user_id, "release_order_lock: releasing more than is locked, clamping");
            account.available += account.locked;
            account.locked = Money::ZERO;
            return;
        }
        account.locked -= cost;
        account.available += cost;
    }

    /// §4.4.3 — buyer's locked balance pays the seller's available balance,
    /// and both portfolios move by `qty` in opposite directions. If the
    /// buyer's locked balance underflows (which should never happen given a
    /// correct caller), clamp to zero and log — the auditor's cash check
    /// will catch the resulting imbalance.
    pub fn confirm_trade(
        &mut self,
        buyer_id: UserId,
        seller_id: UserId,
        market_id: MarketId,
        price: Money,
        qty: u64,
    ) {
        let cost = price.times_qty(qty);

        let buyer = self.account_mut(buyer_id);
        if let Some(new_locked) = buyer.locked.checked_sub(cost) {
            buyer.locked = new_locked;
        } else {
            error!(buyer_id, %cost, locked = %buyer.locked, "confirm_trade: locked balance underflowed, clamping");
            buyer.locked = Money::ZERO;
        }
        *buyer.portfolio.entry(market_id).or_insert(0) += qty as i64;

        let seller = self.account_mut(seller_id);
        seller.available += cost;
        *seller.portfolio.entry(market_id).or_insert(0) -= qty as i64;
    }
}
