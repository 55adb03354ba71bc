#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]

//! # Playbook
//! Deterministic backtesting engine for linear USDT-margined crypto perpetuals.
//!
//! A run consumes a declarative strategy (the Play), preloaded multi-timeframe bar
//! frames with precomputed indicator columns, a funding series and a 1-minute
//! sub-bar stream, and produces hash-chained artifacts: per-trade and per-bar
//! columnar files, a run summary, and a manifest whose `run_hash` is bit-identical
//! across reruns of the same inputs.
//!
//! The per-bar control flow is strictly sequential: advance the multi-timeframe
//! cursor, let the exchange apply funding/fills/intra-bar exits, snapshot the
//! market, evaluate the compiled rules, hand the intents back to the exchange, then
//! append to the evaluation history rings. No wall clock, no randomness, no
//! unordered iteration anywhere on that path.

pub use playbook_data as data;
pub use playbook_execution as execution;
pub use playbook_instrument as instrument;
pub use playbook_strategy as strategy;

/// Artifact writing: canonical JSON, the SHA-256 hash chain, parquet outputs, the
/// run manifest and the determinism verifier.
pub mod artifact;

/// The per-bar [`Engine`](engine::Engine) loop: readiness gating, intent lowering,
/// terminal stops.
pub mod engine;

/// Top-level [`PlaybookError`](error::PlaybookError).
pub mod error;

/// `tracing` bootstrap (plain and JSON).
pub mod logging;

/// The engine entry point: [`run`](run::run).
pub mod run;

/// O(1) [`Snapshot`](snapshot::Snapshot) implementing the strategy's `MarketView`.
pub mod snapshot;

/// Run-level summary statistics (Sharpe, Sortino, Calmar, drawdown, ...).
pub mod statistic;

pub use engine::{Engine, RunOutcome, TerminalStop};
pub use error::PlaybookError;
pub use run::{RunArtifacts, run};
