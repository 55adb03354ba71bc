use crate::{
    engine::RunOutcome,
    statistic::{
        dispersion,
        metric::{
            calmar::CalmarRatio, drawdown::MaxDrawdown, profit_factor::ProfitFactor,
            sharpe::SharpeRatio, sortino::SortinoRatio, win_rate::WinRate,
        },
    },
};
use playbook_execution::{
    ledger::Ledger,
    trade::{EquityPoint, TradeRecord},
};
use playbook_instrument::timeframe::Timeframe;
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};

const MS_PER_YEAR: f64 = 365.25 * 24.0 * 60.0 * 60.0 * 1_000.0;

/// Run-level metrics written to `result.json` and folded into the hash chain.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunSummary {
    pub starting_equity_usdt: f64,
    pub final_equity_usdt: f64,
    pub net_pnl_usdt: f64,
    pub return_pct: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown_pct: f64,
    pub calmar: f64,
    pub total_trades: usize,
    pub win_rate: Option<f64>,
    pub profit_factor: Option<f64>,
    /// Mean net PnL per closed trade.
    pub expectancy_usdt: f64,
    pub time_in_market_pct: f64,
    pub total_fees_usdt: f64,
    pub funding_paid_usdt: f64,
    pub funding_received_usdt: f64,
    pub liquidation_loss_usdt: f64,
}

impl RunSummary {
    pub fn generate(
        trades: &[TradeRecord],
        equity: &[EquityPoint],
        ledger: &Ledger,
        outcome: &RunOutcome,
        exec_tf: Timeframe,
    ) -> Self {
        let starting = ledger.starting_equity_usdt;
        let final_equity = equity.last().map(|point| point.equity_usdt).unwrap_or(starting);
        let net_pnl = final_equity - starting;

        let returns = dispersion::returns(equity);
        let mean_return = dispersion::mean(&returns);
        let bars_per_year = MS_PER_YEAR / exec_tf.duration_ms() as f64;
        let risk_free = 0.0;

        let sharpe = SharpeRatio::calculate(
            risk_free,
            mean_return,
            dispersion::std_dev(&returns),
            bars_per_year,
        );
        let sortino = SortinoRatio::calculate(
            risk_free,
            mean_return,
            dispersion::downside_deviation(&returns),
            bars_per_year,
        );
        let max_drawdown = MaxDrawdown::calculate(equity)
            .map(|drawdown| drawdown.value)
            .unwrap_or(0.0);
        let annualised_return = mean_return * bars_per_year;
        let calmar = CalmarRatio::calculate(annualised_return, max_drawdown);

        let wins = trades.iter().filter(|trade| trade.net_pnl_usdt() > 0.0).count();
        let gross_profits = trades
            .iter()
            .map(TradeRecord::net_pnl_usdt)
            .filter(|pnl| *pnl > 0.0)
            .sum::<f64>();
        let gross_losses = trades
            .iter()
            .map(TradeRecord::net_pnl_usdt)
            .filter(|pnl| *pnl < 0.0)
            .sum::<f64>()
            .abs();
        let expectancy = if trades.is_empty() {
            0.0
        } else {
            trades.iter().map(TradeRecord::net_pnl_usdt).sum::<f64>() / trades.len() as f64
        };

        let time_in_market_pct = if outcome.bars == 0 {
            0.0
        } else {
            outcome.bars_in_position as f64 / outcome.bars as f64 * 100.0
        };

        Self {
            starting_equity_usdt: starting,
            final_equity_usdt: final_equity,
            net_pnl_usdt: net_pnl,
            return_pct: if starting == 0.0 { 0.0 } else { net_pnl / starting * 100.0 },
            sharpe: sharpe.value,
            sortino: sortino.value,
            max_drawdown_pct: max_drawdown * 100.0,
            calmar: calmar.value,
            total_trades: trades.len(),
            win_rate: WinRate::calculate(wins as f64, trades.len() as f64).map(|rate| rate.value),
            profit_factor: ProfitFactor::calculate(gross_profits, gross_losses)
                .map(|factor| factor.value),
            expectancy_usdt: expectancy,
            time_in_market_pct,
            total_fees_usdt: ledger.total_fees_usdt,
            funding_paid_usdt: ledger.total_funding_paid_usdt,
            funding_received_usdt: ledger.total_funding_received_usdt,
            liquidation_loss_usdt: ledger.liquidation_loss_usdt,
        }
    }

    /// Render the summary table to stdout.
    pub fn print_summary(&self) {
        let mut table = Table::new();
        table.set_format(*prettytable::format::consts::FORMAT_CLEAN);
        table.add_row(row![b => "Metric", "Value"]);
        table.add_row(row!["Net PnL (USDT)", format!("{:.2}", self.net_pnl_usdt)]);
        table.add_row(row!["Return %", format!("{:.2}", self.return_pct)]);
        table.add_row(row!["Sharpe", format!("{:.3}", self.sharpe)]);
        table.add_row(row!["Sortino", format!("{:.3}", self.sortino)]);
        table.add_row(row!["Max Drawdown %", format!("{:.2}", self.max_drawdown_pct)]);
        table.add_row(row!["Calmar", format!("{:.3}", self.calmar)]);
        table.add_row(row!["Trades", self.total_trades]);
        table.add_row(row![
            "Win Rate",
            self.win_rate
                .map(|rate| format!("{:.1}%", rate * 100.0))
                .unwrap_or_else(|| "-".into())
        ]);
        table.add_row(row![
            "Profit Factor",
            self.profit_factor
                .map(|factor| format!("{factor:.2}"))
                .unwrap_or_else(|| "-".into())
        ]);
        table.add_row(row!["Expectancy (USDT)", format!("{:.2}", self.expectancy_usdt)]);
        table.add_row(row!["Time In Market %", format!("{:.1}", self.time_in_market_pct)]);
        table.add_row(row!["Fees (USDT)", format!("{:.2}", self.total_fees_usdt)]);
        table.add_row(row![
            "Funding Paid / Received",
            format!(
                "{:.2} / {:.2}",
                self.funding_paid_usdt, self.funding_received_usdt
            )
        ]);
        table.printstd();
    }
}
