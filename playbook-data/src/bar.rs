use crate::error::DataError;
use derive_more::Constructor;
use playbook_instrument::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{Display, Formatter};

/// Immutable closed candle on some timeframe.
///
/// `ts_open` is the canonical stored timestamp; `ts_close = ts_open + tf duration` is the
/// strategy's decision time. All timestamps are UTC milliseconds.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
pub struct Bar {
    pub ts_open: i64,
    pub ts_close: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Validate the candle invariants against its [`Timeframe`].
    pub fn validate(&self, timeframe: Timeframe) -> Result<(), DataError> {
        let fail = |detail: &str| DataError::MalformedBar {
            ts_open: self.ts_open,
            detail: SmolStr::new(detail),
        };

        if self.ts_close != self.ts_open + timeframe.duration_ms() {
            return Err(fail("ts_close != ts_open + timeframe duration"));
        }
        if self.high < self.open.max(self.close) {
            return Err(fail("high < max(open, close)"));
        }
        if self.low > self.open.min(self.close) {
            return Err(fail("low > min(open, close)"));
        }
        if self.volume < 0.0 {
            return Err(fail("volume < 0"));
        }
        Ok(())
    }

    /// Mid-range hlc3 value, `(high + low + close) / 3`.
    pub fn hlc3(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Mid-range ohlc4 value, `(open + high + low + close) / 4`.
    pub fn ohlc4(&self) -> f64 {
        (self.open + self.high + self.low + self.close) / 4.0
    }
}

/// Raw candle field addressable through the snapshot path protocol
/// (eg/ `bar.exec.high`).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum BarField {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "close")]
    Close,
    #[serde(rename = "volume")]
    Volume,
}

impl BarField {
    pub const ALL: [BarField; 5] = [
        Self::Open,
        Self::High,
        Self::Low,
        Self::Close,
        Self::Volume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Volume => "volume",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "high" => Some(Self::High),
            "low" => Some(Self::Low),
            "close" => Some(Self::Close),
            "volume" => Some(Self::Volume),
            _ => None,
        }
    }

    /// Extract this field from a [`Bar`].
    pub fn of(&self, bar: &Bar) -> f64 {
        match self {
            Self::Open => bar.open,
            Self::High => bar.high,
            Self::Low => bar.low,
            Self::Close => bar.close,
            Self::Volume => bar.volume,
        }
    }
}

impl Display for BarField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(0, 3_600_000, open, high, low, close, 1.0)
    }

    #[test]
    fn test_bar_validate() {
        struct TestCase {
            input: Bar,
            expected_ok: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: valid candle
                input: bar(99.0, 101.0, 98.0, 100.0),
                expected_ok: true,
            },
            TestCase {
                // TC1: high below close
                input: bar(99.0, 99.5, 98.0, 100.0),
                expected_ok: false,
            },
            TestCase {
                // TC2: low above open
                input: bar(99.0, 101.0, 99.5, 100.0),
                expected_ok: false,
            },
            TestCase {
                // TC3: negative volume
                input: Bar::new(0, 3_600_000, 99.0, 101.0, 98.0, 100.0, -1.0),
                expected_ok: false,
            },
            TestCase {
                // TC4: ts_close inconsistent with timeframe
                input: Bar::new(0, 60_000, 99.0, 101.0, 98.0, 100.0, 1.0),
                expected_ok: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.validate(Timeframe::H1);
            assert_eq!(actual.is_ok(), test.expected_ok, "TC{index} failed");
        }
    }

    #[test]
    fn test_bar_mark_aggregates() {
        let bar = bar(10.0, 14.0, 6.0, 10.0);
        assert_eq!(bar.hlc3(), 10.0);
        assert_eq!(bar.ohlc4(), 10.0);
    }
}
