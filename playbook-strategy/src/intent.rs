use crate::play::Sizing;
use playbook_execution::order::{OrderKind, TimeInForce, TriggerDirection};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{Display, Formatter};

/// Abstract order request emitted by the rules evaluator.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum IntentAction {
    #[serde(rename = "enter_long")]
    EnterLong,
    #[serde(rename = "enter_short")]
    EnterShort,
    #[serde(rename = "exit_long")]
    ExitLong,
    #[serde(rename = "exit_short")]
    ExitShort,
    #[serde(rename = "move_stop")]
    MoveStop,
    #[serde(rename = "partial_tp")]
    PartialTp,
    #[serde(rename = "alert")]
    Alert,
}

impl Display for IntentAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EnterLong => "enter_long",
            Self::EnterShort => "enter_short",
            Self::ExitLong => "exit_long",
            Self::ExitShort => "exit_short",
            Self::MoveStop => "move_stop",
            Self::PartialTp => "partial_tp",
            Self::Alert => "alert",
        };
        write!(f, "{s}")
    }
}

/// A fully-resolved intent: every price expression has been evaluated against the
/// current snapshot, so only concrete levels reach the exchange.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Intent {
    pub action: IntentAction,
    pub order_kind: OrderKind,
    pub limit_price: Option<f64>,
    pub trigger_price: Option<f64>,
    pub trigger_direction: Option<TriggerDirection>,
    pub time_in_force: TimeInForce,
    /// Per-intent sizing override; `None` falls back to the Play default.
    pub sizing: Option<Sizing>,
    pub sl: Option<f64>,
    pub tp: Option<f64>,
    /// Percent of position for PARTIAL_TP / partial exits.
    pub percent: Option<f64>,
    /// Id of the action group that emitted this intent.
    pub group: SmolStr,
}
