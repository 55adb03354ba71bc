use playbook_data::bar::BarField;
use playbook_instrument::timeframe::TimeframeRole;
use serde::{Deserialize, Serialize};

/// A snapshot path compiled once at load into slot indices.
///
/// The evaluator never splits strings per bar: resolving any `PathRef` is a namespace
/// dispatch plus at most one array index on the implementing view.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum PathRef {
    /// `bar.<role>.<field>[<offset>]`
    Bar {
        role: TimeframeRole,
        field: BarField,
        offset: usize,
    },
    /// `indicator.<role>.<key>[<offset>]`, key resolved to its frame column slot.
    Indicator {
        role: TimeframeRole,
        slot: usize,
        offset: usize,
    },
    /// `structure.<block>.<field>`, resolved to registry slots.
    Structure { block_slot: usize, field_slot: usize },
    /// `bar.<role>.bars_high_<window>` / `bars_low_<window>` rolling extremes.
    Rolling {
        role: TimeframeRole,
        window: usize,
        is_high: bool,
    },
    /// `price.close` - execution bar close.
    PriceClose,
    /// `price.last` - last 1-minute sub-bar close.
    PriceLast,
    /// `price.mark.close` - the exchange-computed canonical mark.
    MarkClose,
    /// `price.mark.high` / `price.mark.low` - mark extremes within the bar.
    MarkHigh,
    MarkLow,
}

/// Read-only, O(1) view of the market state at one closed execution bar.
///
/// Implemented by the engine's snapshot; the trait is the seam between strategy
/// evaluation and everything it reads.
pub trait MarketView {
    /// Resolve a compiled path. `None` is the explicit MISSING sentinel (pre-warmup
    /// indicator, offset beyond history, structure field not yet formed).
    fn resolve(&self, path: &PathRef) -> Option<f64>;

    /// `ts_close` of the bar under evaluation (the strategy's decision time).
    fn ts_close(&self) -> i64;
}

#[cfg(test)]
pub(crate) mod test_view {
    use super::{MarketView, PathRef};

    /// Fixed-value view for DSL tests.
    #[derive(Debug, Default)]
    pub struct TestView {
        pub values: Vec<(PathRef, f64)>,
        pub ts_close: i64,
    }

    impl TestView {
        pub fn with(mut self, path: PathRef, value: f64) -> Self {
            self.values.retain(|(existing, _)| existing != &path);
            self.values.push((path, value));
            self
        }
    }

    impl MarketView for TestView {
        fn resolve(&self, path: &PathRef) -> Option<f64> {
            self.values
                .iter()
                .find(|(existing, _)| existing == path)
                .map(|(_, value)| *value)
        }

        fn ts_close(&self) -> i64 {
            self.ts_close
        }
    }
}
