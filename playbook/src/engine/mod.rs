use crate::{error::PlaybookError, snapshot::Snapshot};
use playbook_data::{
    cursor::MtfCursor, feed::BarFeed, funding::FundingSeries, minute::MinuteStream,
    structure::StructureSet,
};
use playbook_execution::{
    config::{ExchangeConfig, FeeModel},
    exchange::SimExchange,
    order::OrderRequest,
    trade::ExitReason,
};
use playbook_instrument::{Side, timeframe::TimeframeRole};
use playbook_strategy::{
    Evaluator, Intent, IntentAction, MarketView, Play, Sizing, compile,
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::{debug, info, warn};

/// Why the run ended.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub enum TerminalStop {
    #[serde(rename = "max_drawdown_breach")]
    MaxDrawdownBreach,
    #[serde(rename = "equity_floor")]
    EquityFloor,
    #[serde(rename = "insufficient_margin")]
    InsufficientMargin,
    #[serde(rename = "end_of_data")]
    EndOfData,
}

impl TerminalStop {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxDrawdownBreach => "max_drawdown_breach",
            Self::EquityFloor => "equity_floor",
            Self::InsufficientMargin => "insufficient_margin",
            Self::EndOfData => "end_of_data",
        }
    }
}

impl Display for TerminalStop {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured event tallies for the run manifest; the detailed event log is the
/// `tracing` stream.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Deserialize, Serialize)]
pub struct EventCounts {
    pub fills: u64,
    pub trades: u64,
    pub alerts: u64,
    pub rejections: u64,
}

/// Outcome of the engine loop.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunOutcome {
    pub terminal: TerminalStop,
    pub bars: usize,
    pub bars_in_position: usize,
    pub counts: EventCounts,
}

/// The per-run engine: owns the feeds, incremental state, exchange and evaluator,
/// and drives the fixed per-bar step order.
///
/// Construction performs every preflight (warmups satisfiable, 1-minute coverage,
/// funding coverage, Play compilation); [`Engine::run`] itself cannot fail, only
/// stop.
#[derive(Debug)]
pub struct Engine {
    play: Play,
    feed: BarFeed,
    minutes: MinuteStream,
    structures: StructureSet,
    cursor: MtfCursor,
    exchange: SimExchange,
    evaluator: Evaluator,
    counts: EventCounts,
    peak_equity: f64,
    bars_in_position: usize,
}

impl Engine {
    pub fn new(
        play: Play,
        feed: BarFeed,
        minutes: MinuteStream,
        structures: StructureSet,
        funding: FundingSeries,
    ) -> Result<Self, PlaybookError> {
        for role in [TimeframeRole::Exec, TimeframeRole::Med, TimeframeRole::High] {
            feed.check_warmup(role, play.warmup_bars.get(role))?;
        }

        let window_start = feed.exec().ts_open(0);
        let window_end = feed.exec().ts_close(feed.exec().len() - 1);
        minutes.preflight(window_start, window_end)?;
        if play.risk.funding_enabled {
            funding.preflight(window_start, window_end)?;
        }

        let compiled = compile(&play, &feed, &structures)?;
        let evaluator = Evaluator::new(compiled);

        let config = ExchangeConfig {
            starting_equity_usdt: play.risk.starting_equity_usdt,
            leverage: play.risk.max_leverage,
            fees: FeeModel::new(play.risk.fee_taker_bps, play.risk.fee_maker_bps),
            slippage_bps: play.risk.slippage_bps,
            mark_price_source: play.risk.mark_price_source,
            funding_enabled: play.risk.funding_enabled,
            maintenance_margin_rate: play.instrument.maintenance_margin_rate,
            max_pending_orders: ExchangeConfig::DEFAULT_MAX_PENDING_ORDERS,
        };
        let exchange = SimExchange::new(config, funding);
        let peak_equity = play.risk.starting_equity_usdt;

        info!(play = %play.name, bars = feed.exec().len(), "engine constructed");

        Ok(Self {
            play,
            feed,
            minutes,
            structures,
            cursor: MtfCursor::new(),
            exchange,
            evaluator,
            counts: EventCounts::default(),
            peak_equity,
            bars_in_position: 0,
        })
    }

    pub fn exchange(&self) -> &SimExchange {
        &self.exchange
    }

    pub fn play(&self) -> &Play {
        &self.play
    }

    /// Consume the engine, yielding the exchange results.
    pub fn into_exchange(self) -> SimExchange {
        self.exchange
    }

    /// Drive the run to its terminal stop.
    pub fn run(&mut self) -> RunOutcome {
        let total = self.feed.exec().len();
        let mut terminal = None;

        for bar_idx in 0..total {
            let closes = self.cursor.advance(&self.feed);
            debug_assert_eq!(self.cursor.exec_idx, bar_idx, "cursor desync");
            let bar = self.feed.exec().bar(bar_idx);

            // Incremental state sees newly-closed bars, highest timeframe first.
            if closes.high
                && let Some(idx) = self.cursor.high_idx
            {
                let closed = self
                    .feed
                    .frame(TimeframeRole::High)
                    .expect("high closed")
                    .bar(idx);
                self.structures.update_closed(TimeframeRole::High, &closed);
            }
            if closes.med
                && let Some(idx) = self.cursor.med_idx
            {
                let closed = self
                    .feed
                    .frame(TimeframeRole::Med)
                    .expect("med closed")
                    .bar(idx);
                self.structures.update_closed(TimeframeRole::Med, &closed);
            }
            self.structures.update_closed(TimeframeRole::Exec, &bar);

            // 1-minute rollups for this bar.
            let minutes = self.minutes.window(bar.ts_open, bar.ts_close);
            let price_last = minutes.last().map(|minute| minute.close).unwrap_or(bar.close);

            // Readiness gate: indices advance and equity is recorded, but the
            // strategy never sees a pre-warmup bar.
            let warmup = &self.play.warmup_bars;
            if !self.cursor.is_ready(&self.feed, |role| warmup.get(role)) {
                self.exchange.record_equity_point(bar.ts_close);
                continue;
            }

            let step = self.exchange.process_bar_pre(&bar, minutes);
            self.counts.fills += step.fills.len() as u64;
            self.counts.trades += step.closed_trades.len() as u64;

            let snapshot = Snapshot::new(
                &self.feed,
                &self.structures,
                self.cursor,
                step.mark_price,
                price_last,
            );
            assert_eq!(
                snapshot.ts_close(),
                bar.ts_close,
                "no-lookahead breach at bar {bar_idx}"
            );

            let eval = self.evaluator.evaluate(&snapshot);
            let requests = lower_intents(
                &self.play,
                &mut self.exchange,
                &mut self.counts,
                &eval.intents,
            );

            let rejections = self.exchange.process_bar_post(&bar, bar_idx, requests);
            self.counts.rejections += rejections.len() as u64;

            // Hard contract: history rings advance only after evaluation, so
            // "previous" keeps meaning the previous bar.
            self.evaluator.update_history(&snapshot);

            if self.exchange.position().is_some() {
                self.bars_in_position += 1;
            }

            if let Some(stop) = self.check_terminal() {
                if let Some(trade) =
                    self.exchange
                        .force_close(bar.open, ExitReason::ForceClose, bar.ts_close)
                {
                    self.counts.trades += 1;
                    self.exchange.restate_last_equity_point();
                    debug!(id = %trade.id, "force-closed on terminal stop");
                }
                warn!(%stop, bar_idx, "terminal stop");
                terminal = Some(stop);
                break;
            }
        }

        let terminal = terminal.unwrap_or_else(|| {
            let last = self.feed.exec().bar(total - 1);
            if let Some(trade) =
                self.exchange
                    .force_close(last.close, ExitReason::EndOfData, last.ts_close)
            {
                self.counts.trades += 1;
                self.exchange.restate_last_equity_point();
                debug!(id = %trade.id, "closed at end of data");
            }
            TerminalStop::EndOfData
        });

        info!(%terminal, trades = self.counts.trades, "run finished");
        RunOutcome {
            terminal,
            bars: self.cursor.exec_idx + 1,
            bars_in_position: self.bars_in_position,
            counts: self.counts,
        }
    }

    /// Terminal stop conditions, checked once per bar after the post step.
    fn check_terminal(&mut self) -> Option<TerminalStop> {
        let equity = self.exchange.equity();
        let floor = self.play.risk.equity_floor_usdt.unwrap_or(0.0);
        if equity <= floor {
            return Some(TerminalStop::EquityFloor);
        }

        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if let Some(max_dd) = self.play.risk.max_drawdown_pct {
            let drawdown_pct = (self.peak_equity - equity) / self.peak_equity * 100.0;
            if drawdown_pct >= max_dd {
                return Some(TerminalStop::MaxDrawdownBreach);
            }
        }

        // Margin call: reserved margin no longer covered by equity.
        if self.exchange.position().is_some()
            && self
                .exchange
                .ledger()
                .free_margin(self.exchange.unrealized_pnl())
                < 0.0
        {
            return Some(TerminalStop::InsufficientMargin);
        }

        None
    }
}

/// Lower this bar's intents onto the exchange: MOVE_STOP and ALERT act immediately;
/// entries and exits become order requests filled from the next bar.
fn lower_intents(
    play: &Play,
    exchange: &mut SimExchange,
    counts: &mut EventCounts,
    intents: &[Intent],
) -> Vec<OrderRequest> {
    let mut requests = Vec::new();

    for intent in intents {
        match intent.action {
            IntentAction::Alert => {
                counts.alerts += 1;
                info!(group = %intent.group, "alert");
            }
            IntentAction::MoveStop => {
                let Some(sl) = intent.sl else {
                    warn!(group = %intent.group, "move_stop without sl; dropped");
                    continue;
                };
                if let Err(error) = exchange.move_stop(sl) {
                    debug!(%error, "move_stop dropped");
                }
            }
            IntentAction::EnterLong | IntentAction::EnterShort => {
                if exchange.position().is_some() {
                    debug!(group = %intent.group, "entry intent dropped: position open");
                    continue;
                }
                let Some(size_usdt) = resolve_size(play, exchange, intent) else {
                    continue;
                };
                if size_usdt < play.instrument.min_notional_usdt {
                    warn!(size_usdt, "entry below min notional; dropped");
                    continue;
                }
                let side = match intent.action {
                    IntentAction::EnterLong => Side::Buy,
                    _ => Side::Sell,
                };
                let tick = |price: f64| play.instrument.round_price(price);
                requests.push(OrderRequest {
                    side,
                    kind: intent.order_kind,
                    size_usdt,
                    limit_price: intent.limit_price.map(tick),
                    trigger_price: intent.trigger_price.map(tick),
                    trigger_direction: intent.trigger_direction,
                    time_in_force: intent.time_in_force,
                    attached_sl: intent.sl.map(tick),
                    attached_tp: intent.tp.map(tick),
                    reduce_only: false,
                });
            }
            IntentAction::ExitLong | IntentAction::ExitShort => {
                let Some(position) = exchange.position() else {
                    debug!(group = %intent.group, "exit intent dropped: no position");
                    continue;
                };
                let wants_long = intent.action == IntentAction::ExitLong;
                let is_long = position.side == playbook_instrument::PositionSide::Long;
                if wants_long != is_long {
                    debug!(group = %intent.group, "exit intent dropped: side mismatch");
                    continue;
                }
                let percent = intent.percent.unwrap_or(100.0);
                requests.push(OrderRequest {
                    side: position.side.exit_side(),
                    kind: intent.order_kind,
                    size_usdt: position.size_usdt * percent / 100.0,
                    limit_price: intent.limit_price,
                    trigger_price: intent.trigger_price,
                    trigger_direction: intent.trigger_direction,
                    time_in_force: intent.time_in_force,
                    attached_sl: None,
                    attached_tp: None,
                    reduce_only: true,
                });
            }
            IntentAction::PartialTp => {
                let Some(position) = exchange.position() else {
                    debug!(group = %intent.group, "partial_tp dropped: no position");
                    continue;
                };
                let Some(percent) = intent.percent else {
                    warn!(group = %intent.group, "partial_tp without percent; dropped");
                    continue;
                };
                requests.push(OrderRequest {
                    side: position.side.exit_side(),
                    kind: playbook_execution::order::OrderKind::Market,
                    size_usdt: position.size_usdt * percent / 100.0,
                    limit_price: None,
                    trigger_price: None,
                    trigger_direction: None,
                    time_in_force: playbook_execution::order::TimeInForce::Gtc,
                    attached_sl: None,
                    attached_tp: None,
                    reduce_only: true,
                });
            }
        }
    }

    requests
}

/// Resolve intent sizing to a notional, falling back to the Play default.
fn resolve_size(play: &Play, exchange: &SimExchange, intent: &Intent) -> Option<f64> {
    let sizing = intent.sizing.unwrap_or(play.sizing);
    match sizing {
        Sizing::FixedUsdt { usdt } => Some(usdt),
        Sizing::PercentEquity { percent } => Some(exchange.equity() * percent / 100.0),
        Sizing::RiskPct { percent } => {
            let Some(sl) = intent.sl else {
                warn!("risk_pct sizing requires an sl expression; intent dropped");
                return None;
            };
            let entry = intent
                .limit_price
                .or(intent.trigger_price)
                .unwrap_or(exchange.last_mark());
            let risk_per_unit = (entry - sl).abs() / entry;
            if risk_per_unit <= f64::EPSILON {
                warn!("risk_pct sizing with sl at entry; intent dropped");
                return None;
            }
            Some(exchange.equity() * percent / 100.0 / risk_per_unit)
        }
    }
}
