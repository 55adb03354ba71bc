use serde::{Deserialize, Serialize};

/// Fraction of closed trades with positive net PnL.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct WinRate {
    pub value: f64,
}

impl WinRate {
    pub fn calculate(wins: f64, total: f64) -> Option<Self> {
        if total == 0.0 {
            None
        } else {
            Some(Self {
                value: wins.abs() / total.abs(),
            })
        }
    }
}
