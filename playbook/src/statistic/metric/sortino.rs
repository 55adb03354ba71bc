use serde::{Deserialize, Serialize};

/// Annualised Sortino Ratio over per-bar returns.
///
/// Like Sharpe, but only downside volatility (standard deviation of negative
/// returns) counts as risk - a better fit for non-normal return distributions.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct SortinoRatio {
    pub value: f64,
}

impl SortinoRatio {
    pub fn calculate(
        risk_free_return: f64,
        mean_return: f64,
        std_dev_loss_returns: f64,
        bars_per_year: f64,
    ) -> Self {
        if std_dev_loss_returns == 0.0 {
            Self {
                value: if mean_return > risk_free_return {
                    // +ve excess returns with no downside risk (very good)
                    f64::INFINITY
                } else if mean_return < risk_free_return {
                    // -ve excess returns with no downside risk (very bad)
                    f64::NEG_INFINITY
                } else {
                    0.0
                },
            }
        } else {
            Self {
                value: (mean_return - risk_free_return) / std_dev_loss_returns
                    * bars_per_year.sqrt(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sortino_special_cases_with_no_downside() {
        assert!(SortinoRatio::calculate(0.0, 0.01, 0.0, 252.0).value.is_infinite());
        assert_eq!(
            SortinoRatio::calculate(0.0, -0.01, 0.0, 252.0).value,
            f64::NEG_INFINITY
        );
        assert_eq!(SortinoRatio::calculate(0.0, 0.0, 0.0, 252.0).value, 0.0);
    }

    #[test]
    fn test_sortino_normal_case() {
        let actual = SortinoRatio::calculate(0.0015, 0.0025, 0.01, 252.0);
        assert_relative_eq!(actual.value, 0.1 * 252.0_f64.sqrt(), epsilon = 1e-9);
    }
}
