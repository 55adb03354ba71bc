use crate::error::DataError;
use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// Funding settles every 8 hours at 00:00 / 08:00 / 16:00 UTC.
pub const FUNDING_INTERVAL_MS: i64 = 8 * 60 * 60 * 1_000;

/// A single funding rate point, keyed by its boundary timestamp (UTC ms).
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
pub struct FundingRate {
    pub ts: i64,
    pub rate: f64,
}

/// Time-indexed funding rate series aligned to 8-hour boundaries.
///
/// Rates are looked up by exact boundary timestamp; a boundary the run needs without a
/// rate is a preflight [`DataError::FundingGap`], never a silent zero.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct FundingSeries {
    points: Vec<FundingRate>,
}

impl FundingSeries {
    pub fn new(mut points: Vec<FundingRate>) -> Self {
        points.sort_by_key(|point| point.ts);
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Funding boundaries contained in `[ts_open, ts_close)`.
    pub fn boundaries_in(ts_open: i64, ts_close: i64) -> impl Iterator<Item = i64> {
        let first = ts_open.div_euclid(FUNDING_INTERVAL_MS) * FUNDING_INTERVAL_MS;
        let first = if first < ts_open {
            first + FUNDING_INTERVAL_MS
        } else {
            first
        };
        (0..)
            .map(move |i| first + i * FUNDING_INTERVAL_MS)
            .take_while(move |&ts| ts < ts_close)
    }

    /// Rate at an exact boundary timestamp. O(log n).
    pub fn rate_at(&self, boundary_ts: i64) -> Option<f64> {
        self.points
            .binary_search_by_key(&boundary_ts, |point| point.ts)
            .ok()
            .map(|idx| self.points[idx].rate)
    }

    /// Preflight: every boundary inside `[start_ts, end_ts)` must carry a rate.
    pub fn preflight(&self, start_ts: i64, end_ts: i64) -> Result<(), DataError> {
        for boundary_ts in Self::boundaries_in(start_ts, end_ts) {
            if self.rate_at(boundary_ts).is_none() {
                return Err(DataError::FundingGap { boundary_ts });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_in_window() {
        struct TestCase {
            ts_open: i64,
            ts_close: i64,
            expected: Vec<i64>,
        }

        let tests = vec![
            TestCase {
                // TC0: window strictly inside one funding period
                ts_open: 1_000,
                ts_close: 2_000,
                expected: vec![],
            },
            TestCase {
                // TC1: boundary at window start is included
                ts_open: 0,
                ts_close: 60_000,
                expected: vec![0],
            },
            TestCase {
                // TC2: boundary at window end is excluded
                ts_open: FUNDING_INTERVAL_MS - 60_000,
                ts_close: FUNDING_INTERVAL_MS,
                expected: vec![],
            },
            TestCase {
                // TC3: daily bar spans all three boundaries after midnight
                ts_open: 0,
                ts_close: 86_400_000,
                expected: vec![0, FUNDING_INTERVAL_MS, 2 * FUNDING_INTERVAL_MS],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual: Vec<i64> =
                FundingSeries::boundaries_in(test.ts_open, test.ts_close).collect();
            assert_eq!(actual, test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_preflight_detects_gap() {
        let series = FundingSeries::new(vec![
            FundingRate::new(0, 0.0001),
            FundingRate::new(2 * FUNDING_INTERVAL_MS, 0.0001),
        ]);

        assert!(series.preflight(0, FUNDING_INTERVAL_MS).is_ok());
        assert_eq!(
            series.preflight(0, 86_400_000),
            Err(DataError::FundingGap {
                boundary_ts: FUNDING_INTERVAL_MS
            })
        );
    }

    #[test]
    fn test_rate_lookup_is_exact() {
        let series = FundingSeries::new(vec![FundingRate::new(FUNDING_INTERVAL_MS, 0.0003)]);
        assert_eq!(series.rate_at(FUNDING_INTERVAL_MS), Some(0.0003));
        assert_eq!(series.rate_at(FUNDING_INTERVAL_MS + 1), None);
    }
}
