use crate::{
    dsl::ast::{
        ArithOp, CmpOp, CompiledCase, CompiledGroup, CompiledIntent, CompiledPlay, Expr, Operand,
    },
    dsl::def::{ExprDef, OperandDef},
    error::ConfigError,
    play::{IntentDef, Play},
    view::PathRef,
};
use itertools::Itertools;
use playbook_data::{bar::BarField, feed::BarFeed, structure::StructureSet};
use playbook_execution::order::{OrderKind, TimeInForce};
use playbook_instrument::timeframe::TimeframeRole;
use smol_str::SmolStr;

const ALLOWED_OPERATORS: &str =
    ">, <, >=, <=, !=, cross_above, cross_below, near_pct, near_abs, between, in";
const ALLOWED_ARITH: &str = "+, -, *, /, %";
const ALLOWED_COUNT_OPERATORS: &str = ">, <, >=, <=, ==, !=";

/// Compile a validated [`Play`] against the run's bar feed and structure registry.
///
/// Everything stringly-typed is resolved here: feature ids to paths, paths to slots,
/// operator names to enum tags. Banned operators are rejected with the allowed
/// alternatives; unknown paths fail naming what IS available.
pub fn compile(
    play: &Play,
    feed: &BarFeed,
    structures: &StructureSet,
) -> Result<CompiledPlay, ConfigError> {
    play.validate()?;

    let mut compiler = Compiler {
        play,
        feed,
        structures,
        tracked_values: Vec::new(),
        tracked_bools: Vec::new(),
    };

    let groups = play
        .actions
        .iter()
        .map(|group| {
            let cases = group
                .cases
                .iter()
                .map(|case| {
                    Ok(CompiledCase {
                        when: compiler.compile_expr(&case.when)?,
                        emit: case
                            .emit
                            .iter()
                            .map(|intent| compiler.compile_intent(intent))
                            .collect::<Result<Vec<_>, _>>()?,
                    })
                })
                .collect::<Result<Vec<_>, ConfigError>>()?;
            Ok(CompiledGroup {
                id: group.id.clone(),
                cases,
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    Ok(CompiledPlay {
        groups,
        tracked_values: compiler.tracked_values,
        tracked_bools: compiler.tracked_bools,
    })
}

struct Compiler<'a> {
    play: &'a Play,
    feed: &'a BarFeed,
    structures: &'a StructureSet,
    tracked_values: Vec<Operand>,
    tracked_bools: Vec<(Expr, usize)>,
}

impl Compiler<'_> {
    fn compile_expr(&mut self, def: &ExprDef) -> Result<Expr, ConfigError> {
        match def {
            ExprDef::Compare {
                op,
                lhs,
                rhs,
                extra,
            } => self.compile_compare(op, lhs, rhs, extra.as_ref()),
            ExprDef::All(members) => Ok(Expr::All(
                members
                    .iter()
                    .map(|member| self.compile_expr(member))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            ExprDef::Any(members) => Ok(Expr::Any(
                members
                    .iter()
                    .map(|member| self.compile_expr(member))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            ExprDef::Not(inner) => Ok(Expr::Not(Box::new(self.compile_expr(inner)?))),
            ExprDef::HoldsForDuration { expr, bars } => {
                let (expr, slot) = self.compile_duration(expr, *bars)?;
                Ok(Expr::HoldsFor {
                    expr: Box::new(expr),
                    bars: *bars,
                    slot,
                })
            }
            ExprDef::OccurredWithinDuration { expr, bars } => {
                let (expr, slot) = self.compile_duration(expr, *bars)?;
                Ok(Expr::OccurredWithin {
                    expr: Box::new(expr),
                    bars: *bars,
                    slot,
                })
            }
            ExprDef::CountTrueDuration {
                expr,
                bars,
                op,
                count,
            } => {
                let cmp = parse_count_operator(op)?;
                let (expr, slot) = self.compile_duration(expr, *bars)?;
                Ok(Expr::CountTrue {
                    expr: Box::new(expr),
                    bars: *bars,
                    op: cmp,
                    count: *count,
                    slot,
                })
            }
        }
    }

    /// Duration sub-expressions are tracked: re-evaluated and pushed into their ring
    /// after every bar, whether or not first-match reached them.
    fn compile_duration(&mut self, def: &ExprDef, bars: usize) -> Result<(Expr, usize), ConfigError> {
        if bars == 0 {
            return Err(ConfigError::EmptyDurationWindow);
        }
        let expr = self.compile_expr(def)?;
        let slot = self.tracked_bools.len();
        self.tracked_bools.push((expr.clone(), bars - 1));
        Ok((expr, slot))
    }

    fn compile_compare(
        &mut self,
        op: &str,
        lhs: &OperandDef,
        rhs: &OperandDef,
        extra: Option<&OperandDef>,
    ) -> Result<Expr, ConfigError> {
        let op = parse_operator(op)?;

        let lhs = self.compile_operand(lhs)?;
        let rhs = self.compile_operand(rhs)?;
        let extra = extra.map(|def| self.compile_operand(def)).transpose()?;

        if matches!(op, CmpOp::In) && !matches!(rhs, Operand::Values(_)) {
            return Err(ConfigError::MissingOperand {
                op: SmolStr::new("in"),
                what: SmolStr::new("value set"),
            });
        }

        if matches!(op, CmpOp::NearPct | CmpOp::NearAbs) && extra.is_none() {
            return Err(ConfigError::MissingOperand {
                op: SmolStr::new(match op {
                    CmpOp::NearPct => "near_pct",
                    _ => "near_abs",
                }),
                what: SmolStr::new("tolerance"),
            });
        }
        if matches!(op, CmpOp::Between) && extra.is_none() {
            return Err(ConfigError::MissingOperand {
                op: SmolStr::new("between"),
                what: SmolStr::new("upper bound"),
            });
        }

        // Crossovers read previous-bar values; allocate their value-history slots.
        let (lhs_slot, rhs_slot) = if matches!(op, CmpOp::CrossAbove | CmpOp::CrossBelow) {
            let lhs_slot = self.tracked_values.len();
            self.tracked_values.push(lhs.clone());
            let rhs_slot = self.tracked_values.len();
            self.tracked_values.push(rhs.clone());
            (Some(lhs_slot), Some(rhs_slot))
        } else {
            (None, None)
        };

        Ok(Expr::Compare {
            op,
            lhs,
            rhs,
            extra,
            lhs_slot,
            rhs_slot,
        })
    }

    fn compile_operand(&mut self, def: &OperandDef) -> Result<Operand, ConfigError> {
        match def {
            OperandDef::Literal(value) => Ok(Operand::Literal(*value)),
            OperandDef::Values(values) => Ok(Operand::Values(values.clone())),
            OperandDef::Feature { id, offset } => {
                let feature = self.play.feature(id)?;
                let path = self.resolve_path(&feature.path, *offset)?;
                Ok(Operand::Ref(path))
            }
            OperandDef::Path { path, offset } => {
                Ok(Operand::Ref(self.resolve_path(path, *offset)?))
            }
            OperandDef::Arith { op, left, right } => {
                let op = match op.as_str() {
                    "+" => ArithOp::Add,
                    "-" => ArithOp::Sub,
                    "*" => ArithOp::Mul,
                    "/" => ArithOp::Div,
                    "%" => ArithOp::Rem,
                    other => {
                        return Err(ConfigError::UnsupportedOperator {
                            op: SmolStr::new(other),
                            allowed: SmolStr::new(ALLOWED_ARITH),
                        });
                    }
                };
                Ok(Operand::Arith {
                    op,
                    left: Box::new(self.compile_operand(left)?),
                    right: Box::new(self.compile_operand(right)?),
                })
            }
        }
    }

    /// Resolve a dot path (with optional trailing `[offset]`) to a [`PathRef`].
    fn resolve_path(&self, path: &str, extra_offset: usize) -> Result<PathRef, ConfigError> {
        let fail = |detail: String| ConfigError::UnresolvedPath {
            path: SmolStr::new(path),
            detail: SmolStr::new(detail),
        };

        let (base, parsed_offset) = split_offset(path)
            .map_err(|detail| fail(detail))?;
        let offset = parsed_offset + extra_offset;

        let mut tokens = base.split('.');
        let namespace = tokens.next().unwrap_or_default();
        match namespace {
            "price" => {
                if offset > 0 {
                    return Err(fail("price paths do not take offsets".into()));
                }
                match (tokens.next(), tokens.next(), tokens.next()) {
                    (Some("close"), None, _) => Ok(PathRef::PriceClose),
                    (Some("last"), None, _) => Ok(PathRef::PriceLast),
                    (Some("mark"), Some("close"), None) => Ok(PathRef::MarkClose),
                    (Some("mark"), Some("high"), None) => Ok(PathRef::MarkHigh),
                    (Some("mark"), Some("low"), None) => Ok(PathRef::MarkLow),
                    _ => Err(fail(
                        "available: close, last, mark.close, mark.high, mark.low".into(),
                    )),
                }
            }
            "bar" => {
                let role = self.resolve_role(tokens.next(), &fail)?;
                let field_token = tokens
                    .next()
                    .ok_or_else(|| fail("missing field token".into()))?;
                if tokens.next().is_some() {
                    return Err(fail("too many tokens".into()));
                }
                self.resolve_bar_field(role, field_token, offset, &fail)
            }
            "indicator" => {
                let role = self.resolve_role(tokens.next(), &fail)?;
                let key = tokens.join(".");
                if key.is_empty() {
                    return Err(fail("missing indicator key".into()));
                }
                let frame = self
                    .feed
                    .frame(role)
                    .expect("role checked by resolve_role");
                let slot = frame.indicator_slot(&key).ok_or_else(|| {
                    fail(format!(
                        "unknown indicator {key} on {role}; available: [{}]",
                        frame.indicator_keys().join(", ")
                    ))
                })?;
                Ok(PathRef::Indicator { role, slot, offset })
            }
            "structure" => {
                if offset > 0 {
                    return Err(fail("structure paths do not take offsets".into()));
                }
                let block = tokens
                    .next()
                    .ok_or_else(|| fail("missing block id".into()))?;
                let field = tokens
                    .next()
                    .ok_or_else(|| fail("missing field name".into()))?;
                let (block_slot, field_slot) = self.structures.resolve(block, field)?;
                Ok(PathRef::Structure {
                    block_slot,
                    field_slot,
                })
            }
            other => Err(fail(format!(
                "unknown namespace {other}; available: bar, indicator, structure, price"
            ))),
        }
    }

    fn resolve_role(
        &self,
        token: Option<&str>,
        fail: &dyn Fn(String) -> ConfigError,
    ) -> Result<TimeframeRole, ConfigError> {
        let token = token.ok_or_else(|| fail("missing timeframe role".into()))?;
        let role: TimeframeRole = token
            .parse()
            .map_err(|_| fail(format!("unknown role {token}; available: exec, med, high")))?;
        if !self.feed.has_role(role) {
            return Err(fail(format!("role {role} not declared by this play")));
        }
        Ok(role)
    }

    fn resolve_bar_field(
        &self,
        role: TimeframeRole,
        token: &str,
        offset: usize,
        fail: &dyn Fn(String) -> ConfigError,
    ) -> Result<PathRef, ConfigError> {
        if let Some(field) = BarField::parse(token) {
            return Ok(PathRef::Bar {
                role,
                field,
                offset,
            });
        }

        for (prefix, is_high) in [("bars_high_", true), ("bars_low_", false)] {
            if let Some(window_text) = token.strip_prefix(prefix) {
                let window: usize = window_text
                    .parse()
                    .map_err(|_| fail(format!("bad window in {token}")))?;
                if offset > 0 {
                    return Err(fail("rolling extremes do not take offsets".into()));
                }
                if !self.play.rolling_windows.contains(&window) {
                    return Err(fail(format!(
                        "window {window} not declared in rolling_windows {:?}",
                        self.play.rolling_windows
                    )));
                }
                return Ok(PathRef::Rolling {
                    role,
                    window,
                    is_high,
                });
            }
        }

        Err(fail(format!(
            "unknown bar field {token}; available: open, high, low, close, volume, \
             bars_high_<n>, bars_low_<n>"
        )))
    }

    fn compile_intent(&mut self, def: &IntentDef) -> Result<CompiledIntent, ConfigError> {
        Ok(CompiledIntent {
            action: def.action,
            order_kind: def.order_kind.unwrap_or(OrderKind::Market),
            limit_price: def
                .limit_price
                .as_ref()
                .map(|operand| self.compile_operand(operand))
                .transpose()?,
            trigger_price: def
                .trigger_price
                .as_ref()
                .map(|operand| self.compile_operand(operand))
                .transpose()?,
            trigger_direction: def.trigger_direction,
            time_in_force: def.time_in_force.unwrap_or(TimeInForce::Gtc),
            sizing: def.sizing,
            sl: def
                .sl
                .as_ref()
                .map(|operand| self.compile_operand(operand))
                .transpose()?,
            tp: def
                .tp
                .as_ref()
                .map(|operand| self.compile_operand(operand))
                .transpose()?,
            percent: def.percent,
        })
    }
}

/// Split a trailing `[n]` offset off a path.
fn split_offset(path: &str) -> Result<(&str, usize), String> {
    let Some(stripped) = path.strip_suffix(']') else {
        return Ok((path, 0));
    };
    let Some(open) = stripped.rfind('[') else {
        return Err("unbalanced ] in path".into());
    };
    let offset = stripped[open + 1..]
        .parse::<usize>()
        .map_err(|_| format!("bad offset in {path}"))?;
    Ok((&stripped[..open], offset))
}

fn parse_operator(op: &str) -> Result<CmpOp, ConfigError> {
    match op {
        ">" => Ok(CmpOp::Gt),
        "<" => Ok(CmpOp::Lt),
        ">=" => Ok(CmpOp::Ge),
        "<=" => Ok(CmpOp::Le),
        "!=" => Ok(CmpOp::Ne),
        "cross_above" => Ok(CmpOp::CrossAbove),
        "cross_below" => Ok(CmpOp::CrossBelow),
        "near_pct" => Ok(CmpOp::NearPct),
        "near_abs" => Ok(CmpOp::NearAbs),
        "between" => Ok(CmpOp::Between),
        "in" => Ok(CmpOp::In),
        "==" => Err(ConfigError::FloatEquality),
        other => Err(ConfigError::UnsupportedOperator {
            op: SmolStr::new(other),
            allowed: SmolStr::new(ALLOWED_OPERATORS),
        }),
    }
}

/// Operators over duration-window counts; integer compares, so `==` is legal here.
fn parse_count_operator(op: &str) -> Result<CmpOp, ConfigError> {
    match op {
        ">" => Ok(CmpOp::Gt),
        "<" => Ok(CmpOp::Lt),
        ">=" => Ok(CmpOp::Ge),
        "<=" => Ok(CmpOp::Le),
        "==" => Ok(CmpOp::Eq),
        "!=" => Ok(CmpOp::Ne),
        other => Err(ConfigError::UnsupportedOperator {
            op: SmolStr::new(other),
            allowed: SmolStr::new(ALLOWED_COUNT_OPERATORS),
        }),
    }
}
