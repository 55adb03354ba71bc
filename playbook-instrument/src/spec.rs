use derive_more::Constructor;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Static metadata for a linear USDT-margined perpetual instrument.
///
/// eg/ InstrumentSpec { symbol: "BTCUSDT", tick_size: 0.1, min_notional_usdt: 5.0,
/// maintenance_margin_rate: 0.005 }
#[derive(Debug, Clone, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
pub struct InstrumentSpec {
    /// Exchange symbol, eg/ "BTCUSDT".
    pub symbol: SmolStr,
    /// Minimum price increment.
    pub tick_size: f64,
    /// Minimum order notional in quote currency.
    pub min_notional_usdt: f64,
    /// Maintenance margin rate for the simulated margin tier.
    pub maintenance_margin_rate: f64,
}

impl InstrumentSpec {
    /// Round a price to the nearest tick.
    pub fn round_price(&self, price: f64) -> f64 {
        if self.tick_size <= 0.0 {
            return price;
        }
        (price / self.tick_size).round() * self.tick_size
    }
}
