use crate::bar::Bar;
use indexmap::IndexMap;
use smol_str::SmolStr;

/// Collaborator contract for an incrementally-updated indicator (EMA, RSI, ATR, ...).
///
/// Indicator values consumed by the engine are precomputed into
/// [`BarFrame`](crate::frame::BarFrame) columns ahead of a run; this trait is the
/// contract those precomputation pipelines (and live-mode adapters) implement.
pub trait Indicator {
    /// Ingest a newly-closed bar. O(1).
    fn update(&mut self, bar: &Bar);

    /// Whether enough bars have been seen to produce defined outputs.
    fn is_ready(&self) -> bool;

    /// Current outputs keyed by name (eg/ "ema_21", "macd.signal"); NaN while MISSING.
    fn outputs(&self) -> IndexMap<SmolStr, f64>;

    /// Warmup hint: bars required before `is_ready` can become true.
    fn required_bars(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Reference SMA used to exercise the contract.
    #[derive(Debug)]
    struct SimpleMovingAverage {
        period: usize,
        values: VecDeque<f64>,
        sum: f64,
    }

    impl SimpleMovingAverage {
        fn new(period: usize) -> Self {
            Self {
                period,
                values: VecDeque::new(),
                sum: 0.0,
            }
        }
    }

    impl Indicator for SimpleMovingAverage {
        fn update(&mut self, bar: &Bar) {
            self.values.push_back(bar.close);
            self.sum += bar.close;
            if self.values.len() > self.period
                && let Some(old) = self.values.pop_front()
            {
                self.sum -= old;
            }
        }

        fn is_ready(&self) -> bool {
            self.values.len() >= self.period
        }

        fn outputs(&self) -> IndexMap<SmolStr, f64> {
            let value = if self.is_ready() {
                self.sum / self.values.len() as f64
            } else {
                f64::NAN
            };
            IndexMap::from([(SmolStr::new("sma"), value)])
        }

        fn required_bars(&self) -> usize {
            self.period
        }
    }

    #[test]
    fn test_indicator_contract_round_trip() {
        let mut sma = SimpleMovingAverage::new(2);
        assert!(!sma.is_ready());
        assert!(sma.outputs()["sma"].is_nan());

        sma.update(&Bar::new(0, 60_000, 1.0, 1.0, 1.0, 10.0, 1.0));
        sma.update(&Bar::new(60_000, 120_000, 1.0, 1.0, 1.0, 20.0, 1.0));

        assert!(sma.is_ready());
        assert_eq!(sma.outputs()["sma"], 15.0);
        assert_eq!(sma.required_bars(), 2);
    }
}
