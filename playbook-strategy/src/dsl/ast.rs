use crate::{
    intent::IntentAction,
    play::Sizing,
    view::PathRef,
};
use playbook_execution::order::{OrderKind, TimeInForce, TriggerDirection};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Comparison operators after compilation.
///
/// `Eq` is only producible for duration-window counts (integer compares); float `==`
/// is rejected at compile time in favour of `near_pct` / `near_abs`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
pub enum CmpOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    CrossAbove,
    CrossBelow,
    NearPct,
    NearAbs,
    Between,
    In,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Compiled scalar operand: slots only, no strings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum Operand {
    Literal(f64),
    Ref(PathRef),
    Arith {
        op: ArithOp,
        left: Box<Operand>,
        right: Box<Operand>,
    },
    Values(Vec<f64>),
}

/// Compiled boolean expression.
///
/// Crossover comparisons carry the slots of their operands' single-bar value history;
/// duration windows carry the slot of their boolean ring. Both histories are updated
/// *after* evaluation each bar, so "previous" always means the previous bar.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum Expr {
    Compare {
        op: CmpOp,
        lhs: Operand,
        rhs: Operand,
        extra: Option<Operand>,
        /// Value-history slots for `cross_above` / `cross_below`.
        lhs_slot: Option<usize>,
        rhs_slot: Option<usize>,
    },
    All(Vec<Expr>),
    Any(Vec<Expr>),
    Not(Box<Expr>),
    HoldsFor {
        expr: Box<Expr>,
        bars: usize,
        slot: usize,
    },
    OccurredWithin {
        expr: Box<Expr>,
        bars: usize,
        slot: usize,
    },
    CountTrue {
        expr: Box<Expr>,
        bars: usize,
        op: CmpOp,
        count: usize,
        slot: usize,
    },
}

/// Compiled intent template; operands are resolved to prices at emit time.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CompiledIntent {
    pub action: IntentAction,
    pub order_kind: OrderKind,
    pub limit_price: Option<Operand>,
    pub trigger_price: Option<Operand>,
    pub trigger_direction: Option<TriggerDirection>,
    pub time_in_force: TimeInForce,
    pub sizing: Option<Sizing>,
    pub sl: Option<Operand>,
    pub tp: Option<Operand>,
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CompiledCase {
    pub when: Expr,
    pub emit: Vec<CompiledIntent>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CompiledGroup {
    pub id: SmolStr,
    pub cases: Vec<CompiledCase>,
}

/// A Play's rules after compilation: groups plus the tracked state feeding the
/// history rings.
///
/// `tracked_values[i]` is re-evaluated after every bar and pushed into value ring
/// `i`; `tracked_bools[i]` likewise into boolean ring `i`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CompiledPlay {
    pub groups: Vec<CompiledGroup>,
    pub tracked_values: Vec<Operand>,
    pub tracked_bools: Vec<(Expr, usize)>,
}
