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

//! # Playbook-Instrument
//! Core instrument, timeframe and market-side data structures shared across the
//! Playbook backtesting engine.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// [`Timeframe`] and [`TimeframeRole`] definitions, including the deterministic
/// multi-timeframe update ordering.
pub mod timeframe;

/// Perpetual instrument metadata ([`InstrumentSpec`](spec::InstrumentSpec)).
pub mod spec;

/// [`Side`] of a trade or order - Buy or Sell.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Side {
    #[serde(alias = "buy", alias = "BUY", alias = "b")]
    Buy,
    #[serde(alias = "sell", alias = "SELL", alias = "s")]
    Sell,
}

impl Side {
    /// The opposing [`Side`].
    pub fn inverse(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Side::Buy => "buy",
                Side::Sell => "sell",
            }
        )
    }
}

/// Direction of an open one-way position - Long or Short.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum PositionSide {
    #[serde(alias = "long", alias = "LONG")]
    Long,
    #[serde(alias = "short", alias = "SHORT")]
    Short,
}

impl PositionSide {
    /// [`Side`] of the order that opens a position in this direction.
    pub fn entry_side(self) -> Side {
        match self {
            Self::Long => Side::Buy,
            Self::Short => Side::Sell,
        }
    }

    /// [`Side`] of the order that closes a position in this direction.
    pub fn exit_side(self) -> Side {
        self.entry_side().inverse()
    }
}

impl Display for PositionSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PositionSide::Long => "long",
                PositionSide::Short => "short",
            }
        )
    }
}
