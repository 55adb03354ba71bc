//! The rules DSL: raw serde-level expression definitions, the typed AST they compile
//! into, the load-time compiler, history ring buffers, and the per-bar evaluator.
//!
//! Compilation happens once per run: every path is resolved to slots, banned
//! operators are rejected, and crossover/duration-window state is sized. The per-bar
//! hot path is enum dispatch and array indexing only.

pub mod ast;
pub mod compile;
pub mod def;
pub mod eval;
pub mod history;

pub use ast::{ArithOp, CmpOp, CompiledPlay, Expr, Operand};
pub use compile::compile;
pub use eval::{EvalResult, Evaluator, ReasonCode};
