use crate::{
    bar::{Bar, BarField},
    error::DataError,
};
use fnv::FnvHashMap;
use indexmap::IndexMap;
use itertools::Itertools;
use playbook_instrument::timeframe::Timeframe;
use smol_str::SmolStr;
use std::collections::VecDeque;

/// Immutable column store for one timeframe: parallel arrays for timestamps and OHLCV,
/// plus one column per precomputed indicator output.
///
/// Indicator columns encode MISSING (pre-warmup, undefined) as NaN. Rolling high/low
/// extremes are precomputed per declared window size at load, so window lookups in the
/// hot loop are O(1).
#[derive(Debug, Clone, PartialEq)]
pub struct BarFrame {
    timeframe: Timeframe,
    ts_open: Vec<i64>,
    ts_close: Vec<i64>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
    indicators: IndexMap<SmolStr, Vec<f64>>,
    rolling_high: FnvHashMap<usize, Vec<f64>>,
    rolling_low: FnvHashMap<usize, Vec<f64>>,
}

impl BarFrame {
    /// Construct a frame from closed bars, validating candle invariants, strict
    /// ascending order and gaplessness.
    pub fn from_bars(timeframe: Timeframe, bars: Vec<Bar>) -> Result<Self, DataError> {
        if bars.is_empty() {
            return Err(DataError::EmptySeries { timeframe });
        }

        for bar in &bars {
            bar.validate(timeframe)?;
        }

        for (prev, next) in bars.iter().tuple_windows() {
            if next.ts_open <= prev.ts_open {
                return Err(DataError::UnsortedSeries {
                    timeframe,
                    ts_open: next.ts_open,
                });
            }
            if next.ts_open != prev.ts_close {
                return Err(DataError::GapInSeries {
                    timeframe,
                    ts_expected: prev.ts_close,
                    ts_found: next.ts_open,
                });
            }
        }

        let len = bars.len();
        let mut frame = Self {
            timeframe,
            ts_open: Vec::with_capacity(len),
            ts_close: Vec::with_capacity(len),
            open: Vec::with_capacity(len),
            high: Vec::with_capacity(len),
            low: Vec::with_capacity(len),
            close: Vec::with_capacity(len),
            volume: Vec::with_capacity(len),
            indicators: IndexMap::new(),
            rolling_high: FnvHashMap::default(),
            rolling_low: FnvHashMap::default(),
        };

        for bar in bars {
            frame.ts_open.push(bar.ts_open);
            frame.ts_close.push(bar.ts_close);
            frame.open.push(bar.open);
            frame.high.push(bar.high);
            frame.low.push(bar.low);
            frame.close.push(bar.close);
            frame.volume.push(bar.volume);
        }

        Ok(frame)
    }

    /// Attach a precomputed indicator column (eg/ "ema_21", "macd.signal").
    pub fn with_indicator<K>(mut self, key: K, values: Vec<f64>) -> Result<Self, DataError>
    where
        K: Into<SmolStr>,
    {
        let key = key.into();
        if values.len() != self.len() {
            return Err(DataError::ColumnLengthMismatch {
                key,
                expected: self.len(),
                found: values.len(),
            });
        }
        self.indicators.insert(key, values);
        Ok(self)
    }

    /// Precompute rolling high/low extremes for each declared window size.
    ///
    /// Values at indices with fewer than `window` bars of history are NaN (MISSING).
    /// Each window costs O(n) via a monotonic deque.
    pub fn precompute_rolling_extremes(&mut self, windows: &[usize]) {
        for &window in windows {
            if window == 0 || self.rolling_high.contains_key(&window) {
                continue;
            }
            self.rolling_high
                .insert(window, rolling_extreme(&self.high, window, true));
            self.rolling_low
                .insert(window, rolling_extreme(&self.low, window, false));
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.ts_open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ts_open.is_empty()
    }

    /// Reassemble the [`Bar`] at `idx`. O(1).
    pub fn bar(&self, idx: usize) -> Bar {
        Bar {
            ts_open: self.ts_open[idx],
            ts_close: self.ts_close[idx],
            open: self.open[idx],
            high: self.high[idx],
            low: self.low[idx],
            close: self.close[idx],
            volume: self.volume[idx],
        }
    }

    pub fn ts_open(&self, idx: usize) -> i64 {
        self.ts_open[idx]
    }

    pub fn ts_close(&self, idx: usize) -> i64 {
        self.ts_close[idx]
    }

    /// Raw candle field at `idx`. O(1).
    pub fn field(&self, field: BarField, idx: usize) -> f64 {
        match field {
            BarField::Open => self.open[idx],
            BarField::High => self.high[idx],
            BarField::Low => self.low[idx],
            BarField::Close => self.close[idx],
            BarField::Volume => self.volume[idx],
        }
    }

    /// Indicator value at `idx`, `None` when the stored value is NaN (MISSING). O(1).
    ///
    /// The column slot must have been resolved at load time; an unknown `slot` is a
    /// programming error.
    pub fn indicator(&self, slot: usize, idx: usize) -> Option<f64> {
        let value = self.indicators[slot][idx];
        (!value.is_nan()).then_some(value)
    }

    /// Resolve an indicator key to its column slot, for load-time path compilation.
    pub fn indicator_slot(&self, key: &str) -> Option<usize> {
        self.indicators.get_index_of(key)
    }

    /// Declared indicator keys, in deterministic column order.
    pub fn indicator_keys(&self) -> impl Iterator<Item = &SmolStr> {
        self.indicators.keys()
    }

    /// Rolling maximum of `high` over the trailing `window` bars ending at `idx`.
    /// `None` when the window is not precomputed or not yet full.
    pub fn rolling_high(&self, window: usize, idx: usize) -> Option<f64> {
        let value = *self.rolling_high.get(&window)?.get(idx)?;
        (!value.is_nan()).then_some(value)
    }

    /// Rolling minimum of `low` over the trailing `window` bars ending at `idx`.
    pub fn rolling_low(&self, window: usize, idx: usize) -> Option<f64> {
        let value = *self.rolling_low.get(&window)?.get(idx)?;
        (!value.is_nan()).then_some(value)
    }

    /// `ts_close -> idx` pairs for building close-detection maps.
    pub(crate) fn close_index_pairs(&self) -> impl Iterator<Item = (i64, usize)> + '_ {
        self.ts_close.iter().copied().enumerate().map(|(i, ts)| (ts, i))
    }
}

/// Trailing-window extreme via monotonic deque; NaN until the window is full.
fn rolling_extreme(values: &[f64], window: usize, is_max: bool) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut deque: VecDeque<usize> = VecDeque::new();

    for (idx, &value) in values.iter().enumerate() {
        while let Some(&back) = deque.back() {
            let dominated = if is_max {
                values[back] <= value
            } else {
                values[back] >= value
            };
            if dominated {
                deque.pop_back();
            } else {
                break;
            }
        }
        deque.push_back(idx);

        if let Some(&front) = deque.front()
            && front + window <= idx
        {
            deque.pop_front();
        }

        if idx + 1 >= window {
            out.push(values[deque[0]]);
        } else {
            out.push(f64::NAN);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let ts_open = i as i64 * 3_600_000;
                Bar::new(
                    ts_open,
                    ts_open + 3_600_000,
                    close,
                    close + 1.0,
                    close - 1.0,
                    close,
                    1.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_from_bars_rejects_gap() {
        let mut input = bars(&[1.0, 2.0, 3.0]);
        input.remove(1);
        let actual = BarFrame::from_bars(Timeframe::H1, input);
        assert!(matches!(actual, Err(DataError::GapInSeries { .. })));
    }

    #[test]
    fn test_from_bars_rejects_empty() {
        let actual = BarFrame::from_bars(Timeframe::H1, vec![]);
        assert!(matches!(actual, Err(DataError::EmptySeries { .. })));
    }

    #[test]
    fn test_indicator_column_missing_is_none() {
        let frame = BarFrame::from_bars(Timeframe::H1, bars(&[1.0, 2.0, 3.0]))
            .unwrap()
            .with_indicator("ema_2", vec![f64::NAN, 1.5, 2.5])
            .unwrap();

        let slot = frame.indicator_slot("ema_2").unwrap();
        assert_eq!(frame.indicator(slot, 0), None);
        assert_eq!(frame.indicator(slot, 1), Some(1.5));
        assert_eq!(frame.indicator_slot("ema_99"), None);
    }

    #[test]
    fn test_indicator_column_length_mismatch() {
        let actual = BarFrame::from_bars(Timeframe::H1, bars(&[1.0, 2.0]))
            .unwrap()
            .with_indicator("ema_2", vec![1.0]);
        assert!(matches!(
            actual,
            Err(DataError::ColumnLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_rolling_extremes() {
        struct TestCase {
            window: usize,
            idx: usize,
            expected_high: Option<f64>,
            expected_low: Option<f64>,
        }

        let mut frame =
            BarFrame::from_bars(Timeframe::H1, bars(&[10.0, 12.0, 11.0, 9.0, 13.0])).unwrap();
        frame.precompute_rolling_extremes(&[3]);

        // highs are close+1, lows are close-1
        let tests = vec![
            TestCase {
                // TC0: window not yet full
                window: 3,
                idx: 1,
                expected_high: None,
                expected_low: None,
            },
            TestCase {
                // TC1: first full window [10, 12, 11]
                window: 3,
                idx: 2,
                expected_high: Some(13.0),
                expected_low: Some(9.0),
            },
            TestCase {
                // TC2: window [12, 11, 9]
                window: 3,
                idx: 3,
                expected_high: Some(13.0),
                expected_low: Some(8.0),
            },
            TestCase {
                // TC3: window [11, 9, 13]
                window: 3,
                idx: 4,
                expected_high: Some(14.0),
                expected_low: Some(8.0),
            },
            TestCase {
                // TC4: undeclared window
                window: 7,
                idx: 4,
                expected_high: None,
                expected_low: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(
                frame.rolling_high(test.window, test.idx),
                test.expected_high,
                "TC{index} failed"
            );
            assert_eq!(
                frame.rolling_low(test.window, test.idx),
                test.expected_low,
                "TC{index} failed"
            );
        }
    }
}
