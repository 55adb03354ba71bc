use crate::{
    dsl::ast::{ArithOp, CmpOp, CompiledIntent, CompiledPlay, Expr, Operand},
    dsl::history::History,
    intent::Intent,
    view::MarketView,
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::debug;

/// Why a condition did not fire (beyond simply being false).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
pub enum ReasonCode {
    /// An operand resolved to MISSING; the enclosing comparison evaluated false.
    MissingInput,
}

/// Output of one bar's rule evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvalResult {
    pub intents: Vec<Intent>,
    pub reasons: Vec<ReasonCode>,
}

/// Three-valued evaluation outcome: MISSING propagates without being true.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Tri {
    True,
    False,
    Missing,
}

impl Tri {
    fn is_true(self) -> bool {
        matches!(self, Tri::True)
    }

    fn from_bool(value: bool) -> Self {
        if value { Tri::True } else { Tri::False }
    }
}

/// Per-run rules evaluator: compiled groups plus the crossover/duration history.
///
/// Per bar the engine calls [`Evaluator::evaluate`] (read-only) and then, after the
/// exchange has consumed the intents, [`Evaluator::update_history`] - the
/// update-after-evaluation ordering is what makes "previous" mean the previous bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluator {
    compiled: CompiledPlay,
    history: History,
}

impl Evaluator {
    pub fn new(compiled: CompiledPlay) -> Self {
        let caps: Vec<usize> = compiled
            .tracked_bools
            .iter()
            .map(|(_, cap)| *cap)
            .collect();
        let history = History::new(compiled.tracked_values.len(), &caps);
        Self { compiled, history }
    }

    pub fn compiled(&self) -> &CompiledPlay {
        &self.compiled
    }

    /// Evaluate every action group against the snapshot. Within a group the first
    /// case whose `when` holds emits; later cases are skipped this bar.
    pub fn evaluate(&self, view: &dyn MarketView) -> EvalResult {
        let mut result = EvalResult::default();

        for group in &self.compiled.groups {
            for case in &group.cases {
                let fired = eval_expr(&case.when, view, &self.history, &mut result.reasons);
                if fired.is_true() {
                    for intent in &case.emit {
                        if let Some(intent) =
                            resolve_intent(intent, &group.id, view, &mut result.reasons)
                        {
                            result.intents.push(intent);
                        }
                    }
                    break;
                }
            }
        }

        result
    }

    /// Append this bar's tracked values/booleans to the history rings. Must run
    /// after [`Evaluator::evaluate`], never before.
    pub fn update_history(&mut self, view: &dyn MarketView) {
        let mut scratch = Vec::new();
        // Boolean trackers first: they may read the value rings still holding the
        // previous bar.
        let bools: Vec<bool> = self
            .compiled
            .tracked_bools
            .iter()
            .map(|(expr, _)| eval_expr(expr, view, &self.history, &mut scratch).is_true())
            .collect();
        let values: Vec<Option<f64>> = self
            .compiled
            .tracked_values
            .iter()
            .map(|operand| eval_operand(operand, view))
            .collect();
        self.history.push(values, bools);
    }
}

/// Resolve a compiled intent's price expressions against the snapshot. An intent
/// whose declared expression resolves MISSING is dropped (with a reason) rather than
/// reaching the exchange half-built.
fn resolve_intent(
    template: &CompiledIntent,
    group: &SmolStr,
    view: &dyn MarketView,
    reasons: &mut Vec<ReasonCode>,
) -> Option<Intent> {
    let mut resolve = |operand: &Option<Operand>| -> Result<Option<f64>, ()> {
        match operand {
            None => Ok(None),
            Some(operand) => match eval_operand(operand, view) {
                Some(value) => Ok(Some(value)),
                None => Err(()),
            },
        }
    };

    let resolved = (|| {
        Ok::<_, ()>((
            resolve(&template.limit_price)?,
            resolve(&template.trigger_price)?,
            resolve(&template.sl)?,
            resolve(&template.tp)?,
        ))
    })();

    match resolved {
        Ok((limit_price, trigger_price, sl, tp)) => Some(Intent {
            action: template.action,
            order_kind: template.order_kind,
            limit_price,
            trigger_price,
            trigger_direction: template.trigger_direction,
            time_in_force: template.time_in_force,
            sizing: template.sizing,
            sl,
            tp,
            percent: template.percent,
            group: group.clone(),
        }),
        Err(()) => {
            reasons.push(ReasonCode::MissingInput);
            debug!(action = %template.action, %group, "intent dropped: missing price input");
            None
        }
    }
}

fn eval_expr(
    expr: &Expr,
    view: &dyn MarketView,
    history: &History,
    reasons: &mut Vec<ReasonCode>,
) -> Tri {
    match expr {
        Expr::Compare {
            op,
            lhs,
            rhs,
            extra,
            lhs_slot,
            rhs_slot,
        } => eval_compare(*op, lhs, rhs, extra.as_ref(), *lhs_slot, *rhs_slot, view, history, reasons),
        Expr::All(members) => {
            let mut missing = false;
            for member in members {
                match eval_expr(member, view, history, reasons) {
                    Tri::False => return Tri::False,
                    Tri::Missing => missing = true,
                    Tri::True => {}
                }
            }
            if missing { Tri::Missing } else { Tri::True }
        }
        Expr::Any(members) => {
            let mut missing = false;
            for member in members {
                match eval_expr(member, view, history, reasons) {
                    Tri::True => return Tri::True,
                    Tri::Missing => missing = true,
                    Tri::False => {}
                }
            }
            if missing { Tri::Missing } else { Tri::False }
        }
        Expr::Not(inner) => match eval_expr(inner, view, history, reasons) {
            Tri::True => Tri::False,
            Tri::False => Tri::True,
            Tri::Missing => Tri::Missing,
        },
        Expr::HoldsFor { expr, bars, slot } => {
            let current = eval_expr(expr, view, history, reasons).is_true();
            Tri::from_bool(current && history.bools(*slot).all_true_last(bars - 1))
        }
        Expr::OccurredWithin { expr, bars, slot } => {
            let current = eval_expr(expr, view, history, reasons).is_true();
            Tri::from_bool(current || history.bools(*slot).any_true_last(bars - 1))
        }
        Expr::CountTrue {
            expr,
            bars,
            op,
            count,
            slot,
        } => {
            let current = eval_expr(expr, view, history, reasons).is_true() as usize;
            let total = current + history.bools(*slot).count_true_last(bars - 1);
            Tri::from_bool(compare_counts(*op, total, *count))
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn eval_compare(
    op: CmpOp,
    lhs: &Operand,
    rhs: &Operand,
    extra: Option<&Operand>,
    lhs_slot: Option<usize>,
    rhs_slot: Option<usize>,
    view: &dyn MarketView,
    history: &History,
    reasons: &mut Vec<ReasonCode>,
) -> Tri {
    let mut missing = || {
        reasons.push(ReasonCode::MissingInput);
        Tri::Missing
    };

    match op {
        CmpOp::In => {
            let Some(a) = eval_operand(lhs, view) else {
                return missing();
            };
            let Operand::Values(values) = rhs else {
                return Tri::False;
            };
            Tri::from_bool(values.contains(&a))
        }
        CmpOp::CrossAbove | CmpOp::CrossBelow => {
            let (Some(a), Some(b)) = (eval_operand(lhs, view), eval_operand(rhs, view)) else {
                return missing();
            };
            let (Some(a_prev), Some(b_prev)) = (
                lhs_slot.and_then(|slot| history.prev_value(slot)),
                rhs_slot.and_then(|slot| history.prev_value(slot)),
            ) else {
                return missing();
            };
            let crossed = match op {
                CmpOp::CrossAbove => a_prev <= b_prev && a > b,
                _ => a_prev >= b_prev && a < b,
            };
            Tri::from_bool(crossed)
        }
        CmpOp::Between => {
            let (Some(a), Some(lo)) = (eval_operand(lhs, view), eval_operand(rhs, view)) else {
                return missing();
            };
            let Some(hi) = extra.and_then(|operand| eval_operand(operand, view)) else {
                return missing();
            };
            Tri::from_bool(lo <= a && a <= hi)
        }
        CmpOp::NearPct | CmpOp::NearAbs => {
            let (Some(a), Some(b)) = (eval_operand(lhs, view), eval_operand(rhs, view)) else {
                return missing();
            };
            let Some(tolerance) = extra.and_then(|operand| eval_operand(operand, view)) else {
                return missing();
            };
            let near = match op {
                CmpOp::NearPct => (a - b).abs() <= b.abs() * tolerance / 100.0,
                _ => (a - b).abs() <= tolerance,
            };
            Tri::from_bool(near)
        }
        CmpOp::Gt | CmpOp::Lt | CmpOp::Ge | CmpOp::Le | CmpOp::Ne | CmpOp::Eq => {
            let (Some(a), Some(b)) = (eval_operand(lhs, view), eval_operand(rhs, view)) else {
                return missing();
            };
            let held = match op {
                CmpOp::Gt => a > b,
                CmpOp::Lt => a < b,
                CmpOp::Ge => a >= b,
                CmpOp::Le => a <= b,
                CmpOp::Ne => a != b,
                // Unreachable through the compiler for float operands; kept total
                // for hand-built ASTs.
                _ => a == b,
            };
            Tri::from_bool(held)
        }
    }
}

fn compare_counts(op: CmpOp, total: usize, target: usize) -> bool {
    match op {
        CmpOp::Gt => total > target,
        CmpOp::Lt => total < target,
        CmpOp::Ge => total >= target,
        CmpOp::Le => total <= target,
        CmpOp::Eq => total == target,
        CmpOp::Ne => total != target,
        _ => false,
    }
}

/// Resolve an operand to a value; `None` is MISSING. Division (and remainder) by
/// zero is MISSING, not infinity.
pub(crate) fn eval_operand(operand: &Operand, view: &dyn MarketView) -> Option<f64> {
    match operand {
        Operand::Literal(value) => Some(*value),
        Operand::Ref(path) => view.resolve(path),
        Operand::Arith { op, left, right } => {
            let left = eval_operand(left, view)?;
            let right = eval_operand(right, view)?;
            match op {
                ArithOp::Add => Some(left + right),
                ArithOp::Sub => Some(left - right),
                ArithOp::Mul => Some(left * right),
                ArithOp::Div => (right != 0.0).then(|| left / right),
                ArithOp::Rem => (right != 0.0).then(|| left % right),
            }
        }
        Operand::Values(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{PathRef, test_view::TestView};
    use playbook_data::bar::BarField;
    use playbook_instrument::timeframe::TimeframeRole;

    fn fast() -> PathRef {
        PathRef::Indicator {
            role: TimeframeRole::Exec,
            slot: 0,
            offset: 0,
        }
    }

    fn slow() -> PathRef {
        PathRef::Indicator {
            role: TimeframeRole::Exec,
            slot: 1,
            offset: 0,
        }
    }

    fn cross_above_expr() -> Expr {
        Expr::Compare {
            op: CmpOp::CrossAbove,
            lhs: Operand::Ref(fast()),
            rhs: Operand::Ref(slow()),
            extra: None,
            lhs_slot: Some(0),
            rhs_slot: Some(1),
        }
    }

    /// fast_prev=10, slow_prev=10.5; fast=10.6, slow=10.4 => crossed.
    /// Next bar fast_prev=10.6, slow_prev=10.4; fast=10.7, slow=10.3 => no cross.
    #[test]
    fn test_cross_above_fires_only_on_the_crossing_bar() {
        let expr = cross_above_expr();
        let mut history = History::new(2, &[]);
        let mut reasons = Vec::new();

        history.push(vec![Some(10.0), Some(10.5)], vec![]);
        let view = TestView::default().with(fast(), 10.6).with(slow(), 10.4);
        assert_eq!(eval_expr(&expr, &view, &history, &mut reasons), Tri::True);

        history.push(vec![Some(10.6), Some(10.4)], vec![]);
        let view = TestView::default().with(fast(), 10.7).with(slow(), 10.3);
        assert_eq!(eval_expr(&expr, &view, &history, &mut reasons), Tri::False);
    }

    #[test]
    fn test_cross_above_without_history_is_missing() {
        let expr = cross_above_expr();
        let history = History::new(2, &[]);
        let mut reasons = Vec::new();
        let view = TestView::default().with(fast(), 10.6).with(slow(), 10.4);
        assert_eq!(eval_expr(&expr, &view, &history, &mut reasons), Tri::Missing);
        assert_eq!(reasons, vec![ReasonCode::MissingInput]);
    }

    #[test]
    fn test_missing_operand_propagates_through_boolean_groups() {
        let unresolved = Expr::Compare {
            op: CmpOp::Gt,
            lhs: Operand::Ref(PathRef::Bar {
                role: TimeframeRole::Exec,
                field: BarField::Close,
                offset: 5,
            }),
            rhs: Operand::Literal(1.0),
            extra: None,
            lhs_slot: None,
            rhs_slot: None,
        };
        let always = Expr::Compare {
            op: CmpOp::Gt,
            lhs: Operand::Literal(2.0),
            rhs: Operand::Literal(1.0),
            extra: None,
            lhs_slot: None,
            rhs_slot: None,
        };

        let history = History::new(0, &[]);
        let view = TestView::default();
        let mut reasons = Vec::new();

        // all with a missing member is not true
        let all = Expr::All(vec![always.clone(), unresolved.clone()]);
        assert_eq!(eval_expr(&all, &view, &history, &mut reasons), Tri::Missing);

        // any short-circuits on the first true member
        let any = Expr::Any(vec![unresolved.clone(), always]);
        assert_eq!(eval_expr(&any, &view, &history, &mut reasons), Tri::True);

        // not of MISSING stays MISSING
        let not = Expr::Not(Box::new(unresolved));
        assert_eq!(eval_expr(&not, &view, &history, &mut reasons), Tri::Missing);
        assert!(reasons.contains(&ReasonCode::MissingInput));
    }

    #[test]
    fn test_near_pct_and_between() {
        let history = History::new(0, &[]);
        let view = TestView::default();
        let mut reasons = Vec::new();

        let near = Expr::Compare {
            op: CmpOp::NearPct,
            lhs: Operand::Literal(101.0),
            rhs: Operand::Literal(100.0),
            extra: Some(Operand::Literal(1.5)),
            lhs_slot: None,
            rhs_slot: None,
        };
        assert_eq!(eval_expr(&near, &view, &history, &mut reasons), Tri::True);

        let between = Expr::Compare {
            op: CmpOp::Between,
            lhs: Operand::Literal(5.0),
            rhs: Operand::Literal(1.0),
            extra: Some(Operand::Literal(4.0)),
            lhs_slot: None,
            rhs_slot: None,
        };
        assert_eq!(eval_expr(&between, &view, &history, &mut reasons), Tri::False);
    }

    #[test]
    fn test_holds_for_duration_needs_full_window() {
        let inner = Expr::Compare {
            op: CmpOp::Gt,
            lhs: Operand::Ref(PathRef::PriceClose),
            rhs: Operand::Literal(100.0),
            extra: None,
            lhs_slot: None,
            rhs_slot: None,
        };
        let expr = Expr::HoldsFor {
            expr: Box::new(inner),
            bars: 3,
            slot: 0,
        };
        let mut history = History::new(0, &[2]);
        let mut reasons = Vec::new();

        let above = TestView::default().with(PathRef::PriceClose, 101.0);

        // current true but only one prior true: not held for 3 bars yet
        history.push(vec![], vec![true]);
        assert_eq!(eval_expr(&expr, &above, &history, &mut reasons), Tri::False);

        history.push(vec![], vec![true]);
        assert_eq!(eval_expr(&expr, &above, &history, &mut reasons), Tri::True);
    }

    #[test]
    fn test_division_by_zero_is_missing() {
        let operand = Operand::Arith {
            op: ArithOp::Div,
            left: Box::new(Operand::Literal(1.0)),
            right: Box::new(Operand::Literal(0.0)),
        };
        assert_eq!(eval_operand(&operand, &TestView::default()), None);
    }
}
