pub mod calmar;
pub mod drawdown;
pub mod profit_factor;
pub mod sharpe;
pub mod sortino;
pub mod win_rate;
