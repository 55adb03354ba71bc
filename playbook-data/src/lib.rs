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

//! # Playbook-Data
//! Immutable, aligned multi-timeframe bar feeds with precomputed indicator columns,
//! funding rate series, the 1-minute sub-bar stream, and the incremental-state
//! scaffolding used by the Playbook engine.
//!
//! All series are constructed once at run start, validated for ordering and
//! completeness, and are read-only thereafter. Per-bar access is O(1).

/// Closed-candle [`Bar`](bar::Bar) record and its invariants.
pub mod bar;

/// [`MtfCursor`](cursor::MtfCursor) - the multi-timeframe index triple and its
/// forward-fill update protocol.
pub mod cursor;

/// All [`DataError`](error::DataError) variants raised during load and preflight.
pub mod error;

/// [`BarFeed`](feed::BarFeed) - per-role frames plus `ts_close -> idx` close detection.
pub mod feed;

/// [`BarFrame`](frame::BarFrame) - parallel column arrays for one timeframe.
pub mod frame;

/// Time-indexed [`FundingSeries`](funding::FundingSeries) aligned to 8-hour boundaries.
pub mod funding;

/// Collaborator contract for incrementally-updated indicators.
pub mod indicator;

/// The 1-minute [`MinuteStream`](minute::MinuteStream) backing intra-bar fill checks.
pub mod minute;

/// [`DataProvider`](provider::DataProvider) collaborator contract and an in-memory
/// implementation.
pub mod provider;

/// Market-structure detector contract and the [`StructureSet`](structure::StructureSet)
/// registry.
pub mod structure;

pub use bar::{Bar, BarField};
pub use cursor::{MtfCursor, RoleCloses};
pub use error::DataError;
pub use feed::BarFeed;
pub use frame::BarFrame;
pub use funding::{FUNDING_INTERVAL_MS, FundingRate, FundingSeries};
pub use minute::MinuteStream;
pub use provider::{DataProvider, InMemoryProvider};
pub use structure::{StructureDetector, StructureSet};
