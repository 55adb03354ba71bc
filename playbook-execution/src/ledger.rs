use serde::{Deserialize, Serialize};

/// Cash and margin accounting for the isolated-margin account.
///
/// `cash_balance_usdt` is settled PnL minus fees minus funding paid plus funding
/// received. Open-position margin is reserved in `used_margin_usdt`, never deducted
/// from cash. Identities (`equity = cash + unrealized`,
/// `free_margin = equity - used_margin`) are asserted every bar step.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Ledger {
    pub starting_equity_usdt: f64,
    pub cash_balance_usdt: f64,
    pub used_margin_usdt: f64,
    pub total_fees_usdt: f64,
    pub total_funding_paid_usdt: f64,
    pub total_funding_received_usdt: f64,
    /// Residual loss written off when a liquidation would take cash below zero.
    pub liquidation_loss_usdt: f64,
}

impl Ledger {
    pub fn new(starting_equity_usdt: f64) -> Self {
        Self {
            starting_equity_usdt,
            cash_balance_usdt: starting_equity_usdt,
            used_margin_usdt: 0.0,
            total_fees_usdt: 0.0,
            total_funding_paid_usdt: 0.0,
            total_funding_received_usdt: 0.0,
            liquidation_loss_usdt: 0.0,
        }
    }

    pub fn equity(&self, unrealized_pnl: f64) -> f64 {
        self.cash_balance_usdt + unrealized_pnl
    }

    pub fn free_margin(&self, unrealized_pnl: f64) -> f64 {
        self.equity(unrealized_pnl) - self.used_margin_usdt
    }

    pub fn available_balance(&self, unrealized_pnl: f64) -> f64 {
        self.free_margin(unrealized_pnl).max(0.0)
    }

    /// Cumulative realized PnL net of fees and funding.
    pub fn realized_pnl(&self) -> f64 {
        self.cash_balance_usdt - self.starting_equity_usdt
    }

    pub fn charge_fee(&mut self, fee_usdt: f64) {
        self.cash_balance_usdt -= fee_usdt;
        self.total_fees_usdt += fee_usdt;
    }

    pub fn settle_pnl(&mut self, pnl_usdt: f64) {
        self.cash_balance_usdt += pnl_usdt;
    }

    pub fn reserve_margin(&mut self, margin_usdt: f64) {
        self.used_margin_usdt += margin_usdt;
    }

    pub fn release_margin(&mut self, margin_usdt: f64) {
        self.used_margin_usdt -= margin_usdt;
        if self.used_margin_usdt.abs() < 1e-9 {
            self.used_margin_usdt = 0.0;
        }
    }

    /// Apply a funding transfer. Positive `amount_usdt` is paid by the account,
    /// negative is received.
    pub fn apply_funding(&mut self, amount_usdt: f64) {
        self.cash_balance_usdt -= amount_usdt;
        if amount_usdt >= 0.0 {
            self.total_funding_paid_usdt += amount_usdt;
        } else {
            self.total_funding_received_usdt += -amount_usdt;
        }
    }

    /// Floor cash at zero after liquidation, recording the residual as written-off
    /// liquidation loss.
    pub fn floor_after_liquidation(&mut self) {
        if self.cash_balance_usdt < 0.0 {
            self.liquidation_loss_usdt += -self.cash_balance_usdt;
            self.cash_balance_usdt = 0.0;
        }
    }

    /// Accounting identities, asserted every step. Violations are programming errors.
    ///
    /// `equity = cash + unrealized` and `free_margin = equity - used_margin` hold by
    /// construction (derived accessors); what can drift is the reserved margin
    /// against the open position and the cash floor. Cash may go below zero only
    /// while a position is open.
    pub fn assert_identities(&self, unrealized_pnl: f64, position_margin: f64, bar_idx: usize) {
        assert!(
            (self.used_margin_usdt - position_margin).abs() < 1e-6,
            "bar {bar_idx}: used margin {} != open position margin {position_margin}",
            self.used_margin_usdt
        );
        assert!(
            position_margin > 0.0 || self.cash_balance_usdt >= -1e-6,
            "bar {bar_idx}: cash {} below zero with no open position",
            self.cash_balance_usdt
        );
        assert!(
            self.equity(unrealized_pnl).is_finite(),
            "bar {bar_idx}: non-finite equity"
        );
    }
}
