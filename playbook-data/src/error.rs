use playbook_instrument::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised while loading or preflight-validating run inputs.
///
/// Every variant surfaces before the engine loop starts; the loop itself assumes
/// complete, ordered data.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum DataError {
    #[error("malformed bar at ts_open={ts_open}: {detail}")]
    MalformedBar { ts_open: i64, detail: SmolStr },

    #[error("{timeframe} series is empty")]
    EmptySeries { timeframe: Timeframe },

    #[error("{timeframe} series is not strictly ascending at ts_open={ts_open}")]
    UnsortedSeries { timeframe: Timeframe, ts_open: i64 },

    #[error("{timeframe} series has a gap: expected ts_open={ts_expected}, found {ts_found}")]
    GapInSeries {
        timeframe: Timeframe,
        ts_expected: i64,
        ts_found: i64,
    },

    #[error("indicator column {key} has {found} rows, expected {expected}")]
    ColumnLengthMismatch {
        key: SmolStr,
        expected: usize,
        found: usize,
    },

    #[error("funding series is missing a rate at boundary ts={boundary_ts}")]
    FundingGap { boundary_ts: i64 },

    #[error("1m stream does not cover exec bar [{ts_open}, {ts_close})")]
    MinuteGap { ts_open: i64, ts_close: i64 },

    #[error("warmup unsatisfiable for {role}: requires {required} bars, series has {available}")]
    WarmupUnsatisfiable {
        role: SmolStr,
        required: usize,
        available: usize,
    },

    #[error("unknown structure block {block}; available: [{available}]")]
    UnknownStructureBlock { block: SmolStr, available: SmolStr },

    #[error("unknown field {field} on structure block {block}; available: [{available}]")]
    UnknownStructureField {
        block: SmolStr,
        field: SmolStr,
        available: SmolStr,
    },
}
