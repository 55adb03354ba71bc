use serde::{Deserialize, Serialize};

/// ProfitFactor divides the absolute value of gross profits by the absolute value of
/// gross losses. A profit factor greater than 1 indicates a profitable strategy.
///
/// Special cases:
/// - `None` when both profits and losses are zero (no information)
/// - INFINITY when there are profits but no losses
/// - NEG_INFINITY when there are losses but no profits
///
/// See docs: <https://www.investopedia.com/articles/fundamental-analysis/10/strategy-performance-reports.asp#toc-profit-factor>
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct ProfitFactor {
    pub value: f64,
}

impl ProfitFactor {
    pub fn calculate(profits_gross_abs: f64, losses_gross_abs: f64) -> Option<Self> {
        if profits_gross_abs == 0.0 && losses_gross_abs == 0.0 {
            return None;
        }

        let value = if losses_gross_abs == 0.0 {
            f64::INFINITY
        } else if profits_gross_abs == 0.0 {
            f64::NEG_INFINITY
        } else {
            profits_gross_abs.abs() / losses_gross_abs.abs()
        };

        Some(Self { value })
    }
}
