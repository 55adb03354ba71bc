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

//! # Playbook-Strategy
//! The Play configuration model and the compiled rules DSL.
//!
//! A Play arrives validated and resolved (loading/normalisation is upstream). At run
//! start it is compiled once against the bar feed and structure registry: feature ids
//! and dot-paths become slot-indexed [`PathRef`](view::PathRef)s, operator strings
//! become enum tags, and crossover/duration state is sized. Per bar, evaluation is a
//! pure read of the [`MarketView`](view::MarketView) snapshot emitting typed
//! [`Intent`](intent::Intent)s.

/// The rules DSL: definitions, AST, compiler, history and evaluator.
pub mod dsl;

/// [`ConfigError`](error::ConfigError) - everything that can fail a Play at load.
pub mod error;

/// [`Intent`](intent::Intent) and [`IntentAction`](intent::IntentAction).
pub mod intent;

/// The [`Play`](play::Play) model: timeframes, warmups, features, actions, risk,
/// sizing.
pub mod play;

/// [`MarketView`](view::MarketView) - the O(1) snapshot seam - and compiled
/// [`PathRef`](view::PathRef)s.
pub mod view;

pub use dsl::{CompiledPlay, EvalResult, Evaluator, ReasonCode, compile};
pub use error::ConfigError;
pub use intent::{Intent, IntentAction};
pub use play::{ActionGroup, Case, FeatureDef, Play, RiskConfig, Sizing, TimeframeSet, WarmupBars};
pub use view::{MarketView, PathRef};
