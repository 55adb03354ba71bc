use crate::position::PositionId;
use derive_more::Constructor;
use playbook_instrument::PositionSide;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Why a position was closed.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum ExitReason {
    #[serde(rename = "tp")]
    Tp,
    #[serde(rename = "sl")]
    Sl,
    #[serde(rename = "signal")]
    Signal,
    #[serde(rename = "liquidation")]
    Liquidation,
    #[serde(rename = "end_of_data")]
    EndOfData,
    #[serde(rename = "force_close")]
    ForceClose,
    #[serde(rename = "trailing_stop")]
    TrailingStop,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tp => "tp",
            Self::Sl => "sl",
            Self::Signal => "signal",
            Self::Liquidation => "liquidation",
            Self::EndOfData => "end_of_data",
            Self::ForceClose => "force_close",
            Self::TrailingStop => "trailing_stop",
        }
    }
}

impl Display for ExitReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Record of one fully-closed position.
///
/// `pnl_usdt` is the gross price PnL (partial closes included); `net_pnl_usdt` nets
/// fees and funding.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradeRecord {
    pub id: PositionId,
    pub side: PositionSide,
    pub entry_ts_ms: i64,
    pub exit_ts_ms: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size_usdt: f64,
    pub pnl_usdt: f64,
    pub fees_usdt: f64,
    pub funding_paid_usdt: f64,
    pub funding_received_usdt: f64,
    pub exit_reason: ExitReason,
    pub mae_usdt: f64,
    pub mfe_usdt: f64,
}

impl TradeRecord {
    pub fn net_pnl_usdt(&self) -> f64 {
        self.pnl_usdt - self.fees_usdt - self.funding_paid_usdt + self.funding_received_usdt
    }

    pub fn hold_ms(&self) -> i64 {
        self.exit_ts_ms - self.entry_ts_ms
    }
}

/// Account snapshot recorded once per execution bar.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Deserialize, Serialize, Constructor)]
pub struct EquityPoint {
    pub ts_ms: i64,
    pub equity_usdt: f64,
    pub cash_balance_usdt: f64,
    pub unrealized_pnl_usdt: f64,
    pub realized_pnl_usdt: f64,
}
