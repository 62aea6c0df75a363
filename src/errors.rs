//! Error taxonomy (spec §7). The benign variants reject a request with no
//! state mutation; [`EngineError::AuditFailure`] is a kill-switch the
//! coordinator does not attempt to recover from.

use thiserror::Error;

use crate::ids::{MarketId, OrderId, UserId};
use crate::money::Money;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EngineError {
    #[error("market {0} is inactive")]
    MarketInactive(MarketId),

    #[error("order quantity must be positive, got {0}")]
    InvalidQuantity(u64),

    #[error("order id {0} already rests in the engine")]
    DuplicateOrderId(OrderId),

    #[error("order {0} not found")]
    UnknownOrder(OrderId),

    #[error("user {user_id} has insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds {
        user_id: UserId,
        needed: Money,
        available: Money,
    },

    #[error("audit failure: {reason}")]
    AuditFailure { reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
