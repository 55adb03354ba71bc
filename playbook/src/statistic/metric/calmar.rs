use serde::{Deserialize, Serialize};

/// Calmar Ratio: annualised return over maximum drawdown.
///
/// See docs: <https://www.investopedia.com/terms/c/calmarratio.asp>
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct CalmarRatio {
    pub value: f64,
}

impl CalmarRatio {
    pub fn calculate(annualised_return: f64, max_drawdown: f64) -> Self {
        if max_drawdown == 0.0 {
            Self {
                value: if annualised_return > 0.0 {
                    f64::INFINITY
                } else if annualised_return < 0.0 {
                    f64::NEG_INFINITY
                } else {
                    0.0
                },
            }
        } else {
            Self {
                value: annualised_return / max_drawdown.abs(),
            }
        }
    }
}
