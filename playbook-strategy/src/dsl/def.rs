use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Raw (pre-compilation) boolean expression as it appears in a Play.
///
/// Operators arrive as strings and are validated during compilation; see
/// [`compile`](super::compile::compile) for the allowed set and the banned-operator
/// rejections.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ExprDef {
    /// `lhs OP rhs` (plus a third operand for `between` / `near_pct` / `near_abs`).
    #[serde(rename = "compare")]
    Compare {
        op: SmolStr,
        lhs: OperandDef,
        rhs: OperandDef,
        #[serde(default)]
        extra: Option<OperandDef>,
    },
    #[serde(rename = "all")]
    All(Vec<ExprDef>),
    #[serde(rename = "any")]
    Any(Vec<ExprDef>),
    #[serde(rename = "not")]
    Not(Box<ExprDef>),
    /// Expression held true for each of the last `bars` bars (current included).
    #[serde(rename = "holds_for_duration")]
    HoldsForDuration { expr: Box<ExprDef>, bars: usize },
    /// Expression true at least once within the last `bars` bars.
    #[serde(rename = "occurred_within_duration")]
    OccurredWithinDuration { expr: Box<ExprDef>, bars: usize },
    /// `count_true_duration{expr, bars} OP count`.
    #[serde(rename = "count_true_duration")]
    CountTrueDuration {
        expr: Box<ExprDef>,
        bars: usize,
        op: SmolStr,
        count: usize,
    },
}

/// Raw scalar operand.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum OperandDef {
    /// Literal number.
    #[serde(rename = "lit")]
    Literal(f64),
    /// Reference to a declared feature, with an optional history offset.
    #[serde(rename = "feature")]
    Feature {
        id: SmolStr,
        #[serde(default)]
        offset: usize,
    },
    /// Direct snapshot path (eg/ `price.close`), with an optional history offset.
    #[serde(rename = "path")]
    Path {
        path: SmolStr,
        #[serde(default)]
        offset: usize,
    },
    /// Arithmetic over two operands; op is one of `+ - * / %`.
    #[serde(rename = "arith")]
    Arith {
        op: SmolStr,
        left: Box<OperandDef>,
        right: Box<OperandDef>,
    },
    /// Literal value set, only valid as the right-hand side of `in`.
    #[serde(rename = "values")]
    Values(Vec<f64>),
}
