use crate::{
    book::OrderBook,
    config::ExchangeConfig,
    error::ExecutionError,
    fill::{apply_slippage, fills_at_open, limit_fill_price, stop_trigger_price},
    ledger::Ledger,
    order::{Order, OrderId, OrderKind, OrderRequest, TimeInForce},
    position::{Position, PositionId},
    trade::{EquityPoint, ExitReason, TradeRecord},
};
use playbook_data::{bar::Bar, funding::FundingSeries};
use playbook_instrument::{PositionSide, Side};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// What a fill did to the account.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub enum FillKind {
    Entry,
    Reduce,
    Exit(ExitReason),
}

/// One executed fill.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Fill {
    pub order_id: Option<OrderId>,
    pub side: Side,
    pub price: f64,
    pub notional_usdt: f64,
    pub fee_usdt: f64,
    pub ts_ms: i64,
    pub kind: FillKind,
}

/// Output of the pre-evaluation half of a bar step: everything the strategy snapshot
/// needs, most importantly the canonical mark price.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StepResult {
    pub mark_price: f64,
    pub fills: Vec<Fill>,
    pub closed_trades: Vec<TradeRecord>,
    pub liquidated: bool,
}

/// Closing level crossed by a 1-minute sub-bar, in check priority order.
#[derive(Debug, Copy, Clone, PartialEq)]
enum MinuteExit {
    Liquidation { bankruptcy: f64 },
    AttachedStop { price: f64, moved: bool },
    AttachedTp { price: f64 },
}

/// Deterministic simulated exchange for a single linear USDT perpetual.
///
/// Owns the pending [`OrderBook`], the single open [`Position`] (one-way mode), the
/// [`Ledger`], closed [`TradeRecord`]s and the per-bar equity curve. Driven by the
/// engine via [`SimExchange::process_bar_pre`] / [`SimExchange::process_bar_post`].
#[derive(Debug)]
pub struct SimExchange {
    config: ExchangeConfig,
    funding: FundingSeries,
    book: OrderBook,
    position: Option<Position>,
    ledger: Ledger,
    trades: Vec<TradeRecord>,
    equity_curve: Vec<EquityPoint>,
    order_seq: u64,
    position_seq: u64,
    last_mark: f64,
}

impl SimExchange {
    pub fn new(config: ExchangeConfig, funding: FundingSeries) -> Self {
        let ledger = Ledger::new(config.starting_equity_usdt);
        let book = OrderBook::new(config.max_pending_orders);
        Self {
            config,
            funding,
            book,
            position: None,
            ledger,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            order_seq: 0,
            position_seq: 0,
            last_mark: f64::NAN,
        }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn pending_orders(&self) -> usize {
        self.book.len()
    }

    /// Canonical mark of the most recent bar step.
    pub fn last_mark(&self) -> f64 {
        self.last_mark
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.position
            .as_ref()
            .map(|position| position.unrealized_pnl(self.last_mark))
            .unwrap_or(0.0)
    }

    pub fn equity(&self) -> f64 {
        self.ledger.equity(self.unrealized_pnl())
    }

    /// Consume the exchange, yielding closed trades, the equity curve and the ledger.
    pub fn into_results(self) -> (Vec<TradeRecord>, Vec<EquityPoint>, Ledger) {
        (self.trades, self.equity_curve, self.ledger)
    }

    /// Submit an order request for the *next* bar's fill step.
    ///
    /// Non-reduce-only requests are margin-checked against the current available
    /// balance; a failed check is the recoverable `MarginReject`.
    pub fn submit(
        &mut self,
        request: OrderRequest,
        ts_submit: i64,
    ) -> Result<OrderId, ExecutionError> {
        request.validate()?;

        if !request.reduce_only {
            let required_usdt = request.size_usdt / self.config.leverage
                + request.size_usdt * self.config.fees.taker_rate();
            let available_usdt = self.ledger.available_balance(self.unrealized_pnl());
            if required_usdt > available_usdt {
                return Err(ExecutionError::MarginReject {
                    required_usdt,
                    available_usdt,
                });
            }
        }

        self.order_seq += 1;
        let id = OrderId::from_seq(self.order_seq);
        let order = Order::from_request(request, id.clone(), ts_submit);
        self.book.insert(order)?;
        debug!(%id, ts_submit, "order accepted");
        Ok(id)
    }

    /// Rewrite the open position's stop level (MOVE_STOP); later SL fills report
    /// `TrailingStop`.
    pub fn move_stop(&mut self, new_sl: f64) -> Result<(), ExecutionError> {
        let position = self.position.as_mut().ok_or(ExecutionError::NoOpenPosition)?;
        position.attached_sl = Some(new_sl);
        position.stop_moved = true;
        debug!(new_sl, "stop moved");
        Ok(())
    }

    /// Steps 1-3 of the bar protocol: funding accrual, pending order fills, and the
    /// 1-minute intra-bar subloop. Returns fills plus the canonical mark.
    pub fn process_bar_pre(&mut self, bar: &Bar, minutes: &[Bar]) -> StepResult {
        let mut fills = Vec::new();
        let trades_before = self.trades.len();

        self.accrue_funding(bar, minutes);
        self.fill_pending_orders(bar, &mut fills);
        let liquidated = self.run_minute_subloop(bar, minutes, &mut fills);

        self.last_mark = self.config.mark_price_source.mark(bar);

        StepResult {
            mark_price: self.last_mark,
            fills,
            closed_trades: self.trades[trades_before..].to_vec(),
            liquidated,
        }
    }

    /// Steps 4-6 of the bar protocol: mark-to-market (identity asserts included), new
    /// order enqueueing for the next bar, and equity point emission.
    ///
    /// Returns the recoverable rejections encountered while enqueueing.
    pub fn process_bar_post(
        &mut self,
        bar: &Bar,
        bar_idx: usize,
        requests: Vec<OrderRequest>,
    ) -> Vec<ExecutionError> {
        if let Some(position) = self.position.as_mut() {
            position.update_excursions(bar.low);
            position.update_excursions(bar.high);
        }

        let unrealized = self.unrealized_pnl();
        let position_margin = self
            .position
            .as_ref()
            .map(Position::initial_margin)
            .unwrap_or(0.0);
        self.ledger
            .assert_identities(unrealized, position_margin, bar_idx);

        let mut rejections = Vec::new();
        for request in requests {
            if let Err(error) = self.submit(request, bar.ts_close) {
                warn!(%error, bar_idx, "order rejected");
                rejections.push(error);
            }
        }

        self.record_equity_point(bar.ts_close);
        rejections
    }

    /// Record the per-bar account snapshot. Also used directly by the engine while
    /// the readiness gate is still closed.
    pub fn record_equity_point(&mut self, ts_ms: i64) {
        let unrealized = self.unrealized_pnl();
        self.equity_curve.push(EquityPoint::new(
            ts_ms,
            self.ledger.equity(unrealized),
            self.ledger.cash_balance_usdt,
            unrealized,
            self.ledger.realized_pnl(),
        ));
    }

    /// Force-close any open position at `price` (terminal stops, end of data).
    pub fn force_close(
        &mut self,
        price: f64,
        reason: ExitReason,
        ts_ms: i64,
    ) -> Option<TradeRecord> {
        self.position.as_ref()?;
        Some(self.close_position(price, reason, ts_ms, true))
    }

    /// Rewrite the most recent equity point so the curve's last row reflects a
    /// settlement (terminal force-close) that happened after step 6 already ran.
    pub fn restate_last_equity_point(&mut self) {
        if let Some(last) = self.equity_curve.pop() {
            self.record_equity_point(last.ts_ms);
        }
    }

    /// Step 1: apply funding for every 8h boundary inside `[ts_open, ts_close)`.
    ///
    /// The funding basis is the 1-minute open at the boundary (the mark as of
    /// settlement), not the bar-level mark.
    fn accrue_funding(&mut self, bar: &Bar, minutes: &[Bar]) {
        if !self.config.funding_enabled {
            return;
        }
        let Some(position) = self.position.as_mut() else {
            return;
        };

        for boundary_ts in FundingSeries::boundaries_in(bar.ts_open, bar.ts_close) {
            let rate = self
                .funding
                .rate_at(boundary_ts)
                .unwrap_or_else(|| panic!("funding gap at {boundary_ts}: preflight missed"));

            let minute_idx = ((boundary_ts - bar.ts_open) / 60_000) as usize;
            let basis = minutes
                .get(minute_idx)
                .map(|minute| minute.open)
                .unwrap_or(bar.open);

            let transfer = position.qty() * rate * basis;
            // Longs pay positive rates, shorts receive them; mirrored for negative.
            let paid_by_account = match position.side {
                PositionSide::Long => transfer,
                PositionSide::Short => -transfer,
            };

            self.ledger.apply_funding(paid_by_account);
            if paid_by_account >= 0.0 {
                position.funding_paid_usdt += paid_by_account;
            } else {
                position.funding_received_usdt += -paid_by_account;
            }
            debug!(boundary_ts, rate, basis, paid_by_account, "funding accrued");
        }
    }

    /// Step 2: evaluate pending orders against the new bar, enforcing time-in-force.
    ///
    /// Entry orders open the position; reduce-only market/limit orders close or
    /// shrink it. Reduce-only *stop* orders are the 1-minute subloop's business.
    fn fill_pending_orders(&mut self, bar: &Bar, fills: &mut Vec<Fill>) {
        for id in self.book.ids() {
            let Some(order) = self.book.get_mut(&id) else {
                continue;
            };
            if order.ts_submit > bar.ts_open || (order.reduce_only && order.kind.is_stop()) {
                continue;
            }

            let order = order.clone();
            match order.kind {
                OrderKind::Market => {
                    let price = apply_slippage(order.side, bar.open, self.config.slippage_rate());
                    self.book.remove(&id);
                    self.apply_fill(&order, price, bar.ts_close, false, fills);
                }
                OrderKind::Limit => self.fill_pending_limit(&order, bar, fills),
                OrderKind::StopMarket => {
                    let Some(trigger_price) = stop_trigger_price(
                        order.trigger_direction.expect("validated on submit"),
                        order.trigger_price.expect("validated on submit"),
                        bar.open,
                        bar.low,
                        bar.high,
                    ) else {
                        continue;
                    };
                    let price =
                        apply_slippage(order.side, trigger_price, self.config.slippage_rate());
                    self.book.remove(&id);
                    self.apply_fill(&order, price, bar.ts_close, false, fills);
                }
                OrderKind::StopLimit => {
                    let triggered = stop_trigger_price(
                        order.trigger_direction.expect("validated on submit"),
                        order.trigger_price.expect("validated on submit"),
                        bar.open,
                        bar.low,
                        bar.high,
                    )
                    .is_some();
                    if triggered {
                        self.demote_stop_limit(&id, bar.ts_close);
                    }
                }
            }
        }
    }

    fn fill_pending_limit(&mut self, order: &Order, bar: &Bar, fills: &mut Vec<Fill>) {
        let limit = order.limit_price.expect("validated on submit");
        match order.time_in_force {
            TimeInForce::PostOnly => {
                if fills_at_open(order.side, limit, bar.open) {
                    self.book.remove(&order.id);
                    warn!(id = %order.id, "post-only rejected: would fill immediately");
                    return;
                }
                if let Some(price) =
                    limit_fill_price(order.side, limit, bar.open, bar.low, bar.high)
                {
                    self.book.remove(&order.id);
                    self.apply_fill(order, price, bar.ts_close, true, fills);
                }
            }
            TimeInForce::Ioc | TimeInForce::Fok => {
                self.book.remove(&order.id);
                if fills_at_open(order.side, limit, bar.open) {
                    self.apply_fill(order, bar.open, bar.ts_close, false, fills);
                } else {
                    debug!(id = %order.id, tif = ?order.time_in_force, "cancelled unfilled");
                }
            }
            TimeInForce::Gtc => {
                if let Some(price) =
                    limit_fill_price(order.side, limit, bar.open, bar.low, bar.high)
                {
                    self.book.remove(&order.id);
                    self.apply_fill(order, price, bar.ts_close, false, fills);
                }
            }
        }
    }

    /// Route a bar-level fill: entries open the position, reduce-only fills close or
    /// shrink it.
    fn apply_fill(
        &mut self,
        order: &Order,
        price: f64,
        ts_ms: i64,
        is_maker: bool,
        fills: &mut Vec<Fill>,
    ) {
        if order.reduce_only {
            self.reduce_position(order, price, ts_ms, fills);
        } else {
            self.try_open_position(order, price, ts_ms, is_maker, fills);
        }
    }

    /// Open the one-way position from an entry fill. Margin is re-checked at fill
    /// time; a shortfall cancels the order (recoverable).
    fn try_open_position(
        &mut self,
        order: &Order,
        fill_price: f64,
        ts_ms: i64,
        is_maker: bool,
        fills: &mut Vec<Fill>,
    ) {
        if self.position.is_some() {
            warn!(id = %order.id, "entry fill dropped: a position is already open");
            return;
        }

        let fee_rate = if is_maker {
            self.config.fees.maker_rate()
        } else {
            self.config.fees.taker_rate()
        };
        let fee = order.size_usdt * fee_rate;
        let margin = order.size_usdt / self.config.leverage;

        if margin + fee > self.ledger.available_balance(0.0) {
            warn!(id = %order.id, margin, "entry fill dropped: insufficient margin");
            return;
        }

        self.position_seq += 1;
        let side = match order.side {
            Side::Buy => PositionSide::Long,
            Side::Sell => PositionSide::Short,
        };
        self.position = Some(Position {
            id: PositionId::from_seq(self.position_seq),
            side,
            entry_price: fill_price,
            size_usdt: order.size_usdt,
            original_size_usdt: order.size_usdt,
            entry_ts: ts_ms,
            leverage: self.config.leverage,
            mmr: self.config.maintenance_margin_rate,
            attached_sl: order.attached_sl,
            attached_tp: order.attached_tp,
            stop_moved: false,
            fees_usdt: fee,
            funding_paid_usdt: 0.0,
            funding_received_usdt: 0.0,
            partial_realized_usdt: 0.0,
            mae_usdt: 0.0,
            mfe_usdt: 0.0,
        });
        self.ledger.charge_fee(fee);
        self.ledger.reserve_margin(margin);

        info!(
            id = %order.id, %side, fill_price, size_usdt = order.size_usdt, fee,
            "position opened"
        );
        fills.push(Fill {
            order_id: Some(order.id.clone()),
            side: order.side,
            price: fill_price,
            notional_usdt: order.size_usdt,
            fee_usdt: fee,
            ts_ms,
            kind: FillKind::Entry,
        });
    }

    /// Step 3: walk the 1-minute sub-bars checking, in order: liquidation, stop-loss
    /// (SL wins ties), take-profit, then reduce-only stop triggers. The first closing
    /// fill ends the subloop for this bar. Returns true on liquidation.
    fn run_minute_subloop(&mut self, bar: &Bar, minutes: &[Bar], fills: &mut Vec<Fill>) -> bool {
        for minute in minutes {
            let Some(position) = self.position.as_ref() else {
                break;
            };

            let exit = first_minute_exit(position, minute, self.config.fees.taker_rate());
            match exit {
                Some(MinuteExit::Liquidation { bankruptcy }) => {
                    let side = position.side;
                    let trade = self.close_position(
                        bankruptcy,
                        ExitReason::Liquidation,
                        minute.ts_close,
                        false,
                    );
                    self.ledger.floor_after_liquidation();
                    warn!(%side, bankruptcy, "position liquidated");
                    fills.push(Fill {
                        order_id: None,
                        side: side.exit_side(),
                        price: bankruptcy,
                        notional_usdt: trade.size_usdt,
                        fee_usdt: 0.0,
                        ts_ms: minute.ts_close,
                        kind: FillKind::Exit(ExitReason::Liquidation),
                    });
                    return true;
                }
                Some(MinuteExit::AttachedStop { price, moved }) => {
                    let reason = if moved {
                        ExitReason::TrailingStop
                    } else {
                        ExitReason::Sl
                    };
                    self.close_at(price, reason, minute.ts_close, fills);
                    break;
                }
                Some(MinuteExit::AttachedTp { price }) => {
                    self.close_at(price, ExitReason::Tp, minute.ts_close, fills);
                    break;
                }
                None => {
                    if self.fill_reduce_only_stops(bar, minute, fills) {
                        break;
                    }
                }
            }
        }

        false
    }

    /// Reduce-only stop orders checked at minute resolution. Returns true if a fill
    /// closed or reduced the position.
    fn fill_reduce_only_stops(&mut self, bar: &Bar, minute: &Bar, fills: &mut Vec<Fill>) -> bool {
        for id in self.book.ids() {
            let Some(order) = self.book.get_mut(&id) else {
                continue;
            };
            if !order.reduce_only || !order.kind.is_stop() || order.ts_submit > bar.ts_open {
                continue;
            }

            let Some(trigger_price) = stop_trigger_price(
                order.trigger_direction.expect("validated on submit"),
                order.trigger_price.expect("validated on submit"),
                minute.open,
                minute.low,
                minute.high,
            ) else {
                continue;
            };

            match order.kind {
                OrderKind::StopMarket => {
                    let order = self.book.remove(&id).expect("order still pending");
                    let price =
                        apply_slippage(order.side, trigger_price, self.config.slippage_rate());
                    self.reduce_position(&order, price, minute.ts_close, fills);
                    return true;
                }
                OrderKind::StopLimit => {
                    self.demote_stop_limit(&id, bar.ts_close);
                }
                _ => unreachable!("filtered to stop kinds"),
            }
        }
        false
    }

    /// Triggered stop-limit rests in the book as an ordinary limit, fill-eligible
    /// from the next bar.
    fn demote_stop_limit(&mut self, id: &OrderId, ts_rest: i64) {
        let pending = self.book.get_mut(id).expect("order still pending");
        pending.kind = OrderKind::Limit;
        pending.trigger_price = None;
        pending.trigger_direction = None;
        pending.ts_submit = ts_rest;
        debug!(%id, "stop-limit triggered, resting as limit");
    }

    /// Close or shrink the position from a reduce-only fill.
    fn reduce_position(&mut self, order: &Order, price: f64, ts_ms: i64, fills: &mut Vec<Fill>) {
        let Some(position) = self.position.as_mut() else {
            warn!(id = %order.id, "reduce-only fill dropped: no open position");
            return;
        };

        let close_size = order.size_usdt.min(position.size_usdt);
        let full_close = close_size >= position.size_usdt - 1e-9;

        if full_close {
            let side = position.side;
            let trade = self.close_position(price, ExitReason::Signal, ts_ms, true);
            fills.push(Fill {
                order_id: Some(order.id.clone()),
                side: side.exit_side(),
                price,
                notional_usdt: trade.size_usdt,
                fee_usdt: trade.fees_usdt,
                ts_ms,
                kind: FillKind::Exit(ExitReason::Signal),
            });
            return;
        }

        // Partial close: realize proportional PnL, free proportional margin.
        let qty_closed = close_size / position.entry_price;
        let pnl = match position.side {
            PositionSide::Long => qty_closed * (price - position.entry_price),
            PositionSide::Short => qty_closed * (position.entry_price - price),
        };
        let fee = qty_closed * price * self.config.fees.taker_rate();
        let margin_released = close_size * position.imr();

        position.size_usdt -= close_size;
        position.partial_realized_usdt += pnl;
        position.fees_usdt += fee;
        let side = position.side;

        self.ledger.settle_pnl(pnl);
        self.ledger.charge_fee(fee);
        self.ledger.release_margin(margin_released);

        info!(id = %order.id, close_size, pnl, "position reduced");
        fills.push(Fill {
            order_id: Some(order.id.clone()),
            side: side.exit_side(),
            price,
            notional_usdt: close_size,
            fee_usdt: fee,
            ts_ms,
            kind: FillKind::Reduce,
        });
    }

    fn close_at(&mut self, price: f64, reason: ExitReason, ts_ms: i64, fills: &mut Vec<Fill>) {
        let side = self
            .position
            .as_ref()
            .map(|position| position.side)
            .expect("close_at requires an open position");
        let trade = self.close_position(price, reason, ts_ms, true);
        fills.push(Fill {
            order_id: None,
            side: side.exit_side(),
            price,
            notional_usdt: trade.size_usdt,
            fee_usdt: trade.fees_usdt,
            ts_ms,
            kind: FillKind::Exit(reason),
        });
    }

    /// Fully close the open position at `price`, realizing PnL and emitting the
    /// [`TradeRecord`]. Liquidations pass `charge_fee = false` (fee baked into the
    /// bankruptcy price).
    fn close_position(
        &mut self,
        price: f64,
        reason: ExitReason,
        ts_ms: i64,
        charge_fee: bool,
    ) -> TradeRecord {
        let mut position = self.position.take().expect("close requires an open position");

        let qty = position.qty();
        let pnl = match position.side {
            PositionSide::Long => qty * (price - position.entry_price),
            PositionSide::Short => qty * (position.entry_price - price),
        };
        let fee = if charge_fee {
            qty * price * self.config.fees.taker_rate()
        } else {
            0.0
        };

        position.update_excursions(price);
        self.ledger.settle_pnl(pnl);
        if charge_fee {
            self.ledger.charge_fee(fee);
        }
        self.ledger.release_margin(position.initial_margin());

        let trade = TradeRecord {
            id: position.id.clone(),
            side: position.side,
            entry_ts_ms: position.entry_ts,
            exit_ts_ms: ts_ms,
            entry_price: position.entry_price,
            exit_price: price,
            size_usdt: position.original_size_usdt,
            pnl_usdt: pnl + position.partial_realized_usdt,
            fees_usdt: position.fees_usdt + fee,
            funding_paid_usdt: position.funding_paid_usdt,
            funding_received_usdt: position.funding_received_usdt,
            exit_reason: reason,
            mae_usdt: position.mae_usdt,
            mfe_usdt: position.mfe_usdt,
        };

        info!(
            id = %trade.id, side = %trade.side, exit_reason = %reason,
            pnl = trade.pnl_usdt, "position closed"
        );
        self.trades.push(trade.clone());
        trade
    }
}

/// Highest-priority closing level a minute bar crosses: liquidation, then stop-loss,
/// then take-profit (the conservative SL-over-TP tie-break).
fn first_minute_exit(position: &Position, minute: &Bar, taker_rate: f64) -> Option<MinuteExit> {
    let liquidation = position.liquidation_price(taker_rate);
    let breached = match position.side {
        PositionSide::Long => minute.low <= liquidation,
        PositionSide::Short => minute.high >= liquidation,
    };
    if breached {
        return Some(MinuteExit::Liquidation {
            bankruptcy: position.bankruptcy_price(),
        });
    }

    if let Some(sl) = position.attached_sl
        && let Some(price) = adverse_cross(position.side, sl, minute)
    {
        return Some(MinuteExit::AttachedStop {
            price,
            moved: position.stop_moved,
        });
    }

    if let Some(tp) = position.attached_tp
        && let Some(price) = favourable_cross(position.side, tp, minute)
    {
        return Some(MinuteExit::AttachedTp { price });
    }

    None
}

/// Crossing price of an adverse level (long SL / short SL mirror): gap opens fill at
/// the open, intra-bar touches at the level.
fn adverse_cross(side: PositionSide, level: f64, minute: &Bar) -> Option<f64> {
    match side {
        PositionSide::Long => {
            if minute.open <= level {
                Some(minute.open)
            } else if minute.low <= level {
                Some(level)
            } else {
                None
            }
        }
        PositionSide::Short => {
            if minute.open >= level {
                Some(minute.open)
            } else if minute.high >= level {
                Some(level)
            } else {
                None
            }
        }
    }
}

/// Crossing price of a favourable level (take-profit side).
fn favourable_cross(side: PositionSide, level: f64, minute: &Bar) -> Option<f64> {
    match side {
        PositionSide::Long => {
            if minute.open >= level {
                Some(minute.open)
            } else if minute.high >= level {
                Some(level)
            } else {
                None
            }
        }
        PositionSide::Short => {
            if minute.open <= level {
                Some(minute.open)
            } else if minute.low <= level {
                Some(level)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeeModel, MarkPriceSource};
    use approx::assert_relative_eq;

    fn config() -> ExchangeConfig {
        ExchangeConfig {
            starting_equity_usdt: 10_000.0,
            leverage: 10.0,
            fees: FeeModel::new(6.0, 1.0),
            slippage_bps: 0.0,
            mark_price_source: MarkPriceSource::Close,
            funding_enabled: false,
            maintenance_margin_rate: 0.005,
            max_pending_orders: ExchangeConfig::DEFAULT_MAX_PENDING_ORDERS,
        }
    }

    fn exchange() -> SimExchange {
        SimExchange::new(config(), FundingSeries::default())
    }

    fn hour_bar(idx: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        let ts_open = idx * 3_600_000;
        Bar::new(ts_open, ts_open + 3_600_000, open, high, low, close, 1.0)
    }

    /// 60 flat 1-minute bars matching the hour bar's range on its first minute.
    fn minutes_for(bar: &Bar) -> Vec<Bar> {
        (0..60)
            .map(|i| {
                let ts_open = bar.ts_open + i * 60_000;
                if i == 0 {
                    Bar::new(ts_open, ts_open + 60_000, bar.open, bar.high, bar.low, bar.close, 1.0)
                } else {
                    Bar::new(
                        ts_open,
                        ts_open + 60_000,
                        bar.close,
                        bar.close,
                        bar.close,
                        bar.close,
                        1.0,
                    )
                }
            })
            .collect()
    }

    fn step(exchange: &mut SimExchange, bar: &Bar, bar_idx: usize) -> StepResult {
        let minutes = minutes_for(bar);
        let result = exchange.process_bar_pre(bar, &minutes);
        exchange.process_bar_post(bar, bar_idx, vec![]);
        result
    }

    #[test]
    fn test_market_order_fills_next_bar_open() {
        let mut exchange = exchange();
        let bar0 = hour_bar(0, 99.0, 101.0, 98.0, 100.0);
        step(&mut exchange, &bar0, 0);

        // submitted at bar0 close
        let mut request = OrderRequest::market(Side::Buy, 1_000.0);
        request.attached_sl = Some(95.0);
        request.attached_tp = Some(110.0);
        exchange.submit(request, bar0.ts_close).unwrap();

        let bar1 = hour_bar(1, 100.0, 102.0, 99.0, 101.0);
        let result = step(&mut exchange, &bar1, 1);

        assert_eq!(result.fills.len(), 1);
        assert_eq!(result.fills[0].kind, FillKind::Entry);
        assert_relative_eq!(result.fills[0].price, 100.0);
        let position = exchange.position().unwrap();
        assert_eq!(position.side, PositionSide::Long);
        assert_relative_eq!(position.qty(), 10.0);
        // entry fee 0.06% of 1000
        assert_relative_eq!(exchange.ledger().total_fees_usdt, 0.6);
        assert_relative_eq!(exchange.ledger().used_margin_usdt, 100.0);
    }

    #[test]
    fn test_take_profit_fills_intra_bar() {
        let mut exchange = exchange();
        let bar0 = hour_bar(0, 99.0, 101.0, 98.0, 100.0);
        step(&mut exchange, &bar0, 0);

        let mut request = OrderRequest::market(Side::Buy, 1_000.0);
        request.attached_sl = Some(95.0);
        request.attached_tp = Some(110.0);
        exchange.submit(request, bar0.ts_close).unwrap();

        let bar1 = hour_bar(1, 100.0, 102.0, 99.0, 101.0);
        step(&mut exchange, &bar1, 1);
        let bar2 = hour_bar(2, 101.0, 112.0, 100.0, 111.0);
        let result = step(&mut exchange, &bar2, 2);

        assert!(exchange.position().is_none());
        let trade = &result.closed_trades[0];
        assert_eq!(trade.exit_reason, ExitReason::Tp);
        assert_relative_eq!(trade.exit_price, 110.0);
        // gross 100, entry fee 0.6, exit fee 10 * 110 * 0.0006 = 0.66
        assert_relative_eq!(trade.net_pnl_usdt(), 98.74, epsilon = 1e-9);
    }

    #[test]
    fn test_sl_wins_tie_break() {
        let mut exchange = exchange();
        let bar0 = hour_bar(0, 99.0, 101.0, 98.0, 100.0);
        step(&mut exchange, &bar0, 0);

        let mut request = OrderRequest::market(Side::Buy, 1_000.0);
        request.attached_sl = Some(98.0);
        request.attached_tp = Some(102.0);
        exchange.submit(request, bar0.ts_close).unwrap();

        let bar1 = hour_bar(1, 100.0, 100.5, 99.5, 100.0);
        step(&mut exchange, &bar1, 1);

        // both levels crossed in the same sub-bar
        let bar2 = hour_bar(2, 99.0, 103.0, 97.0, 101.0);
        let result = step(&mut exchange, &bar2, 2);

        let trade = &result.closed_trades[0];
        assert_eq!(trade.exit_reason, ExitReason::Sl);
        assert_relative_eq!(trade.exit_price, 98.0);
    }

    #[test]
    fn test_liquidation_exits_at_bankruptcy_and_floors_equity() {
        let mut exchange = exchange();
        let bar0 = hour_bar(0, 99.0, 101.0, 98.0, 100.0);
        step(&mut exchange, &bar0, 0);

        exchange
            .submit(OrderRequest::market(Side::Buy, 1_000.0), bar0.ts_close)
            .unwrap();
        let bar1 = hour_bar(1, 100.0, 101.0, 99.0, 100.0);
        step(&mut exchange, &bar1, 1);

        let bar2 = hour_bar(2, 98.0, 99.0, 85.0, 86.0);
        let result = step(&mut exchange, &bar2, 2);

        assert!(result.liquidated);
        let trade = &result.closed_trades[0];
        assert_eq!(trade.exit_reason, ExitReason::Liquidation);
        assert_relative_eq!(trade.exit_price, 90.0);
        assert_relative_eq!(trade.pnl_usdt, -100.0);
        assert!(exchange.equity() >= 0.0);
    }

    #[test]
    fn test_post_only_rejects_when_crossing() {
        let mut exchange = exchange();
        let bar0 = hour_bar(0, 99.0, 101.0, 98.0, 100.0);
        step(&mut exchange, &bar0, 0);

        let request = OrderRequest {
            kind: OrderKind::Limit,
            limit_price: Some(105.0),
            time_in_force: TimeInForce::PostOnly,
            ..OrderRequest::market(Side::Buy, 1_000.0)
        };
        exchange.submit(request, bar0.ts_close).unwrap();

        // opens at 100 <= 105: would fill immediately, rejected instead
        let bar1 = hour_bar(1, 100.0, 102.0, 99.0, 101.0);
        let result = step(&mut exchange, &bar1, 1);
        assert!(result.fills.is_empty());
        assert!(exchange.position().is_none());
        assert_eq!(exchange.pending_orders(), 0);
    }

    #[test]
    fn test_ioc_cancels_when_not_marketable() {
        let mut exchange = exchange();
        let bar0 = hour_bar(0, 99.0, 101.0, 98.0, 100.0);
        step(&mut exchange, &bar0, 0);

        let request = OrderRequest {
            kind: OrderKind::Limit,
            limit_price: Some(95.0),
            time_in_force: TimeInForce::Ioc,
            ..OrderRequest::market(Side::Buy, 1_000.0)
        };
        exchange.submit(request, bar0.ts_close).unwrap();

        // opens at 100 > 95: not marketable, cancelled even though low touches 95
        let bar1 = hour_bar(1, 100.0, 102.0, 95.0, 101.0);
        let result = step(&mut exchange, &bar1, 1);
        assert!(result.fills.is_empty());
        assert_eq!(exchange.pending_orders(), 0);
    }

    #[test]
    fn test_gtc_limit_fills_on_touch() {
        let mut exchange = exchange();
        let bar0 = hour_bar(0, 99.0, 101.0, 98.0, 100.0);
        step(&mut exchange, &bar0, 0);

        let request = OrderRequest {
            kind: OrderKind::Limit,
            limit_price: Some(99.5),
            ..OrderRequest::market(Side::Buy, 1_000.0)
        };
        exchange.submit(request, bar0.ts_close).unwrap();

        let bar1 = hour_bar(1, 100.0, 102.0, 99.0, 101.0);
        let result = step(&mut exchange, &bar1, 1);
        assert_eq!(result.fills.len(), 1);
        assert_relative_eq!(result.fills[0].price, 99.5);
    }

    #[test]
    fn test_funding_accrual_signs() {
        let mut config = config();
        config.funding_enabled = true;
        let funding = FundingSeries::new(vec![playbook_data::funding::FundingRate::new(
            8 * 3_600_000,
            0.0001,
        )]);
        let mut exchange = SimExchange::new(config, funding);

        let bar0 = hour_bar(6, 100.0, 101.0, 99.0, 100.0);
        step(&mut exchange, &bar0, 0);
        exchange
            .submit(OrderRequest::market(Side::Buy, 1_000.0), bar0.ts_close)
            .unwrap();
        let bar1 = hour_bar(7, 100.0, 101.0, 99.0, 100.0);
        step(&mut exchange, &bar1, 1);

        // bar spanning the 08:00 boundary: long pays positive rate on 10 qty * 100
        let bar2 = hour_bar(8, 100.0, 101.0, 99.0, 100.0);
        step(&mut exchange, &bar2, 2);

        assert_relative_eq!(exchange.ledger().total_funding_paid_usdt, 0.1);
        assert_relative_eq!(exchange.ledger().total_funding_received_usdt, 0.0);
    }

    #[test]
    fn test_partial_reduce_banks_proportional_pnl() {
        let mut exchange = exchange();
        let bar0 = hour_bar(0, 99.0, 101.0, 98.0, 100.0);
        step(&mut exchange, &bar0, 0);
        exchange
            .submit(OrderRequest::market(Side::Buy, 1_000.0), bar0.ts_close)
            .unwrap();
        let bar1 = hour_bar(1, 100.0, 101.0, 99.0, 100.0);
        step(&mut exchange, &bar1, 1);

        let reduce = OrderRequest {
            reduce_only: true,
            ..OrderRequest::market(Side::Sell, 400.0)
        };
        exchange.submit(reduce, bar1.ts_close).unwrap();

        let bar2 = hour_bar(2, 105.0, 106.0, 104.0, 105.0);
        let result = step(&mut exchange, &bar2, 2);

        assert_eq!(result.fills[0].kind, FillKind::Reduce);
        let position = exchange.position().unwrap();
        assert_relative_eq!(position.size_usdt, 600.0);
        // 4 qty closed at +5 = 20 USDT banked
        assert_relative_eq!(position.partial_realized_usdt, 20.0);
        assert_relative_eq!(exchange.ledger().used_margin_usdt, 60.0);
    }

    #[test]
    fn test_margin_reject_on_submit() {
        let mut exchange = exchange();
        let bar0 = hour_bar(0, 99.0, 101.0, 98.0, 100.0);
        step(&mut exchange, &bar0, 0);

        let request = OrderRequest::market(Side::Buy, 2_000_000.0);
        let actual = exchange.submit(request, bar0.ts_close);
        assert!(matches!(actual, Err(ExecutionError::MarginReject { .. })));
    }

    #[test]
    fn test_order_and_position_ids_are_sequential() {
        let mut exchange = exchange();
        let bar0 = hour_bar(0, 99.0, 101.0, 98.0, 100.0);
        step(&mut exchange, &bar0, 0);

        let id_a = exchange
            .submit(OrderRequest::market(Side::Buy, 100.0), bar0.ts_close)
            .unwrap();
        let id_b = exchange
            .submit(OrderRequest::market(Side::Buy, 100.0), bar0.ts_close)
            .unwrap();
        assert_eq!(id_a.to_string(), "order_0001");
        assert_eq!(id_b.to_string(), "order_0002");
    }
}
