use playbook_execution::trade::EquityPoint;
use serde::{Deserialize, Serialize};

/// Peak-to-trough decline of the equity curve.
///
/// See documentation: <https://www.investopedia.com/terms/d/drawdown.asp>
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct MaxDrawdown {
    /// Largest peak-to-trough decline as a fraction of the peak.
    pub value: f64,
    pub time_peak_ms: i64,
    pub time_trough_ms: i64,
}

impl MaxDrawdown {
    /// Scan the equity curve for its maximum drawdown. `None` for an empty curve or
    /// one that never declines.
    pub fn calculate(points: &[EquityPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut peak = first.equity_usdt;
        let mut time_peak_ms = first.ts_ms;
        let mut max = MaxDrawdown::default();

        for point in points {
            if point.equity_usdt > peak {
                peak = point.equity_usdt;
                time_peak_ms = point.ts_ms;
                continue;
            }
            if peak > 0.0 {
                let drawdown = (peak - point.equity_usdt) / peak;
                if drawdown > max.value {
                    max = MaxDrawdown {
                        value: drawdown,
                        time_peak_ms,
                        time_trough_ms: point.ts_ms,
                    };
                }
            }
        }

        (max.value > 0.0).then_some(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn point(ts_ms: i64, equity: f64) -> EquityPoint {
        EquityPoint::new(ts_ms, equity, equity, 0.0, 0.0)
    }

    #[test]
    fn test_max_drawdown_finds_deepest_trough() {
        let points = vec![
            point(0, 100.0),
            point(1, 110.0),
            point(2, 99.0),  // dd 10% from 110
            point(3, 115.0), // recovery, new peak
            point(4, 92.0),  // dd 20% from 115
            point(5, 120.0),
        ];
        let actual = MaxDrawdown::calculate(&points).unwrap();
        assert_relative_eq!(actual.value, 0.2);
        assert_eq!(actual.time_peak_ms, 3);
        assert_eq!(actual.time_trough_ms, 4);
    }

    #[test]
    fn test_monotonic_curve_has_no_drawdown() {
        let points = vec![point(0, 100.0), point(1, 101.0), point(2, 102.0)];
        assert_eq!(MaxDrawdown::calculate(&points), None);
    }
}
