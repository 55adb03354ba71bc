use itertools::Itertools;
use playbook_execution::trade::EquityPoint;

/// Per-bar simple returns of the equity curve.
pub fn returns(points: &[EquityPoint]) -> Vec<f64> {
    points
        .iter()
        .tuple_windows()
        .map(|(prev, next)| {
            if prev.equity_usdt == 0.0 {
                0.0
            } else {
                next.equity_usdt / prev.equity_usdt - 1.0
            }
        })
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    let variance =
        values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Standard deviation of the negative returns only (downside deviation, target 0).
pub fn downside_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let downside_sq =
        values.iter().filter(|&&value| value < 0.0).map(|value| value.powi(2)).sum::<f64>();
    (downside_sq / values.len() as f64).sqrt()
}
