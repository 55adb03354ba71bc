#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]

//! # Playbook-Execution
//! Deterministic simulated exchange for linear USDT-margined perpetuals.
//!
//! The exchange owns the pending order book, the (at most one) open isolated-margin
//! position, and the cash/margin ledger. Per execution bar it applies the strict step
//! order: funding accrual, pending order fills, the 1-minute intra-bar subloop
//! (liquidation, stop-loss, take-profit, stop triggers), mark-to-market, new order
//! enqueueing and equity point emission. All prices, IDs and iteration orders are
//! deterministic: two identical runs produce identical fills.

/// Pending [`OrderBook`](book::OrderBook) with its deterministic iteration order.
pub mod book;

/// Exchange configuration: fees, slippage, mark price source, margin parameters.
pub mod config;

/// All [`ExecutionError`](error::ExecutionError) variants.
pub mod error;

/// The [`SimExchange`](exchange::SimExchange) itself and its per-bar step protocol.
pub mod exchange;

/// Pure bar-level fill rules (limit touch, stop trigger, slippage).
pub mod fill;

/// Order records, kinds, time-in-force and sequential IDs.
pub mod order;

/// The isolated-margin [`Position`](position::Position) and its Bybit-aligned pricing.
pub mod position;

/// Cash/margin [`Ledger`](ledger::Ledger) and its accounting identities.
pub mod ledger;

/// Closed-trade records, equity points and exit reasons.
pub mod trade;

pub use book::OrderBook;
pub use config::{ExchangeConfig, FeeModel, MarkPriceSource};
pub use error::ExecutionError;
pub use exchange::{Fill, FillKind, SimExchange, StepResult};
pub use order::{Order, OrderId, OrderKind, OrderRequest, TimeInForce, TriggerDirection};
pub use position::{Position, PositionId};
pub use ledger::Ledger;
pub use trade::{EquityPoint, ExitReason, TradeRecord};
