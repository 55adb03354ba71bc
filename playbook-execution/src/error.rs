use crate::order::{OrderId, OrderKind};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised by the simulated exchange.
///
/// `MarginReject`, `PostOnlyReject`, `TifCancel` and `OrderBookFull` are the only
/// recoverable conditions inside the core: the offending order is discarded and the
/// run continues. Everything else surfaces immediately.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum ExecutionError {
    #[error("malformed {kind:?} order: {detail}")]
    MalformedOrder { kind: OrderKind, detail: SmolStr },

    #[error("insufficient margin: required {required_usdt} USDT, available {available_usdt}")]
    MarginReject {
        required_usdt: f64,
        available_usdt: f64,
    },

    #[error("order book full: {cap} pending orders")]
    OrderBookFull { cap: usize },

    #[error("post-only order {id} would have filled immediately")]
    PostOnlyReject { id: OrderId },

    #[error("a position is already open; one-way mode allows at most one")]
    PositionAlreadyOpen,

    #[error("no open position")]
    NoOpenPosition,
}
