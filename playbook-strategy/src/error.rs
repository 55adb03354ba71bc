use playbook_data::error::DataError;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised while validating and compiling a Play. All of them surface at load;
/// a run whose Play compiled never sees them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum ConfigError {
    #[error("operator {op} not supported; allowed: {allowed}")]
    UnsupportedOperator { op: SmolStr, allowed: SmolStr },

    #[error("operator == not supported on float inputs; use near_pct or near_abs")]
    FloatEquality,

    #[error("operator {op} requires a {what} operand")]
    MissingOperand { op: SmolStr, what: SmolStr },

    #[error("unknown feature {id}; declared: [{available}]")]
    UnknownFeature { id: SmolStr, available: SmolStr },

    #[error("unresolved path {path}: {detail}")]
    UnresolvedPath { path: SmolStr, detail: SmolStr },

    #[error("structure reference: {0}")]
    Structure(#[from] DataError),

    #[error("percent {value} outside (0, 100]")]
    InvalidPercent { value: f64 },

    #[error("sizing must be positive, got {value}")]
    NonPositiveSizing { value: f64 },

    #[error("duration window requires bars >= 1")]
    EmptyDurationWindow,

    #[error("play declares no actions")]
    NoActions,
}
