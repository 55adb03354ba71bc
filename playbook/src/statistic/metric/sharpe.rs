use serde::{Deserialize, Serialize};

/// Annualised Sharpe Ratio over per-bar returns.
///
/// Sharpe Ratio measures risk-adjusted return by comparing excess returns (over the
/// risk-free rate) to their standard deviation.
///
/// See docs: <https://www.investopedia.com/articles/07/sharpe_ratio.asp>
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct SharpeRatio {
    pub value: f64,
}

impl SharpeRatio {
    /// Calculate from per-bar return statistics, annualising by the IID square-root
    /// scaling over `bars_per_year`.
    pub fn calculate(
        risk_free_return: f64,
        mean_return: f64,
        std_dev_returns: f64,
        bars_per_year: f64,
    ) -> Self {
        if std_dev_returns == 0.0 {
            Self {
                value: f64::INFINITY,
            }
        } else {
            Self {
                value: (mean_return - risk_free_return) / std_dev_returns * bars_per_year.sqrt(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sharpe_with_zero_std_dev() {
        let actual = SharpeRatio::calculate(0.001, 0.002, 0.0, 8760.0);
        assert!(actual.value.is_infinite());
    }

    #[test]
    fn test_sharpe_annualises_by_sqrt() {
        let actual = SharpeRatio::calculate(0.0015, 0.0025, 0.02, 252.0);
        // per-bar 0.05, annualised by sqrt(252)
        assert_relative_eq!(actual.value, 0.05 * 252.0_f64.sqrt(), epsilon = 1e-9);
    }
}
