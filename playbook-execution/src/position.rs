use playbook_instrument::PositionSide;
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};
use std::fmt::{Display, Formatter};

/// Sequential position identifier (`pos_0001`, `pos_0002`, ...).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct PositionId(pub SmolStr);

impl PositionId {
    pub fn from_seq(seq: u64) -> Self {
        Self(format_smolstr!("pos_{seq:04}"))
    }
}

impl Display for PositionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The single open isolated-margin position (one-way mode).
///
/// Margin formulas are Bybit-aligned for linear USDT perpetuals:
/// `initial_margin = size_usdt / leverage`,
/// `maintenance_margin = qty * mark * mmr`,
/// `bankruptcy_price = entry * (1 ∓ 1/leverage)` (long/short),
/// `liquidation_price = bankruptcy * (1 ± (mmr + fee_rate))`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Position {
    pub id: PositionId,
    pub side: PositionSide,
    pub entry_price: f64,
    /// Current notional at entry-price basis; shrinks on partial closes.
    pub size_usdt: f64,
    /// Notional at entry; reported on the closed trade.
    pub original_size_usdt: f64,
    pub entry_ts: i64,
    pub leverage: f64,
    /// Maintenance margin rate of the margin tier.
    pub mmr: f64,
    pub attached_sl: Option<f64>,
    pub attached_tp: Option<f64>,
    /// True once MOVE_STOP rewrote the stop; an SL fill then reports TrailingStop.
    pub stop_moved: bool,
    pub fees_usdt: f64,
    pub funding_paid_usdt: f64,
    pub funding_received_usdt: f64,
    /// Realized PnL banked by partial closes.
    pub partial_realized_usdt: f64,
    /// Worst unrealized PnL over the hold (recorded ≥ 0).
    pub mae_usdt: f64,
    /// Best unrealized PnL over the hold (recorded ≥ 0).
    pub mfe_usdt: f64,
}

impl Position {
    pub fn qty(&self) -> f64 {
        self.size_usdt / self.entry_price
    }

    /// Initial margin rate, `1 / leverage`.
    pub fn imr(&self) -> f64 {
        1.0 / self.leverage
    }

    pub fn initial_margin(&self) -> f64 {
        self.size_usdt * self.imr()
    }

    pub fn position_value(&self, mark: f64) -> f64 {
        self.qty() * mark
    }

    pub fn maintenance_margin(&self, mark: f64) -> f64 {
        self.position_value(mark) * self.mmr
    }

    pub fn unrealized_pnl(&self, mark: f64) -> f64 {
        let qty = self.qty();
        match self.side {
            PositionSide::Long => qty * (mark - self.entry_price),
            PositionSide::Short => qty * (self.entry_price - mark),
        }
    }

    /// Price at which equity in the position reaches zero; exit fee is baked in, so a
    /// liquidation fill at this price charges no separate fee.
    pub fn bankruptcy_price(&self) -> f64 {
        match self.side {
            PositionSide::Long => self.entry_price * (1.0 - 1.0 / self.leverage),
            PositionSide::Short => self.entry_price * (1.0 + 1.0 / self.leverage),
        }
    }

    /// Mark price at which liquidation triggers.
    pub fn liquidation_price(&self, fee_rate: f64) -> f64 {
        let bankruptcy = self.bankruptcy_price();
        match self.side {
            PositionSide::Long => bankruptcy * (1.0 + self.mmr + fee_rate),
            PositionSide::Short => bankruptcy * (1.0 - self.mmr - fee_rate),
        }
    }

    /// Whether `mark` has crossed the liquidation price.
    pub fn is_liquidated(&self, mark: f64, fee_rate: f64) -> bool {
        let liquidation = self.liquidation_price(fee_rate);
        match self.side {
            PositionSide::Long => mark <= liquidation,
            PositionSide::Short => mark >= liquidation,
        }
    }

    /// Fold a new mark into the MAE/MFE excursion extremes.
    pub fn update_excursions(&mut self, mark: f64) {
        let unrealized = self.unrealized_pnl(mark);
        if -unrealized > self.mae_usdt {
            self.mae_usdt = -unrealized;
        }
        if unrealized > self.mfe_usdt {
            self.mfe_usdt = unrealized;
        }
    }
}
