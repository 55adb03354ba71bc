use derive_more::Constructor;
use playbook_data::bar::Bar;
use serde::{Deserialize, Serialize};

/// Taker/maker fee schedule in basis points of filled notional.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
pub struct FeeModel {
    pub taker_bps: f64,
    pub maker_bps: f64,
}

impl FeeModel {
    pub fn taker_rate(&self) -> f64 {
        self.taker_bps / 10_000.0
    }

    pub fn maker_rate(&self) -> f64 {
        self.maker_bps / 10_000.0
    }
}

/// How the exchange derives the canonical mark price from the execution bar.
///
/// The mark is computed once per bar step and consumed by every downstream user
/// (mark-to-market, liquidation, funding basis); nothing recomputes it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum MarkPriceSource {
    #[serde(rename = "close")]
    Close,
    #[serde(rename = "hlc3")]
    Hlc3,
    #[serde(rename = "ohlc4")]
    Ohlc4,
}

impl MarkPriceSource {
    /// Canonical mark for one bar.
    pub fn mark(&self, bar: &Bar) -> f64 {
        match self {
            Self::Close => bar.close,
            Self::Hlc3 => bar.hlc3(),
            Self::Ohlc4 => bar.ohlc4(),
        }
    }
}

/// Simulated exchange configuration, resolved from the Play's risk section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExchangeConfig {
    pub starting_equity_usdt: f64,
    /// Leverage applied to every position (isolated margin).
    pub leverage: f64,
    pub fees: FeeModel,
    /// Adverse slippage on market and stop-market fills, in basis points.
    pub slippage_bps: f64,
    pub mark_price_source: MarkPriceSource,
    pub funding_enabled: bool,
    /// Maintenance margin rate of the simulated margin tier.
    pub maintenance_margin_rate: f64,
    /// Cap on simultaneously pending orders.
    pub max_pending_orders: usize,
}

impl ExchangeConfig {
    pub const DEFAULT_MAX_PENDING_ORDERS: usize = 100;

    pub fn slippage_rate(&self) -> f64 {
        self.slippage_bps / 10_000.0
    }
}
