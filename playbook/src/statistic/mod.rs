//! Run-level performance statistics computed from the trade set and equity curve.

/// Mean / standard deviation / downside deviation helpers over return series.
pub mod dispersion;

/// Individual performance metrics.
pub mod metric;

/// The [`RunSummary`](summary::RunSummary) written to `result.json`.
pub mod summary;
