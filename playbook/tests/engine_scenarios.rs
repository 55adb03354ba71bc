//! End-to-end engine scenarios: a Play, bar frames and a 1-minute stream go in; the
//! artifact set and its hash chain come out.

use approx::assert_relative_eq;
use playbook::artifact::{VerifyOutcome, verify};
use playbook::run;
use playbook_data::{
    bar::Bar, frame::BarFrame, funding::FundingSeries, minute::MinuteStream,
    provider::InMemoryProvider,
};
use playbook_execution::config::MarkPriceSource;
use playbook_instrument::{spec::InstrumentSpec, timeframe::Timeframe};
use playbook_strategy::{
    FeatureDef, Play, RiskConfig, Sizing, TimeframeSet, WarmupBars,
    dsl::def::{ExprDef, OperandDef},
    intent::IntentAction,
    play::{ActionGroup, Case, IntentDef},
};
use smol_str::SmolStr;

const HOUR_MS: i64 = 3_600_000;

fn hour_bars(ohlc: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    ohlc.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| {
            let ts_open = i as i64 * HOUR_MS;
            Bar::new(ts_open, ts_open + HOUR_MS, open, high, low, close, 1.0)
        })
        .collect()
}

/// 60 one-minute sub-bars per hour bar: the first minute sweeps the full hour range,
/// the rest sit flat at the close.
fn minutes_for(bars: &[Bar]) -> MinuteStream {
    let mut minutes = Vec::new();
    for bar in bars {
        for i in 0..60 {
            let ts_open = bar.ts_open + i * 60_000;
            let minute = if i == 0 {
                Bar::new(
                    ts_open,
                    ts_open + 60_000,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    1.0,
                )
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
            };
            minutes.push(minute);
        }
    }
    MinuteStream::new(minutes).unwrap()
}

fn provider(bars: Vec<Bar>) -> InMemoryProvider {
    let minutes = minutes_for(&bars);
    let frame = BarFrame::from_bars(Timeframe::H1, bars).unwrap();
    InMemoryProvider::new()
        .with_frame(Timeframe::H1, frame)
        .with_minute_stream(minutes)
        .with_funding(FundingSeries::default())
}

fn intent(action: IntentAction) -> IntentDef {
    IntentDef {
        action,
        order_kind: None,
        limit_price: None,
        trigger_price: None,
        trigger_direction: None,
        time_in_force: None,
        sizing: None,
        sl: None,
        tp: None,
        percent: None,
    }
}

fn close_above(threshold: f64) -> ExprDef {
    ExprDef::Compare {
        op: SmolStr::new(">"),
        lhs: OperandDef::Path {
            path: SmolStr::new("price.close"),
            offset: 0,
        },
        rhs: OperandDef::Literal(threshold),
        extra: None,
    }
}

/// Entry trigger bounded above so a take-profit exit does not immediately re-arm.
fn close_between(lo: f64, hi: f64) -> ExprDef {
    ExprDef::Compare {
        op: SmolStr::new("between"),
        lhs: OperandDef::Path {
            path: SmolStr::new("price.close"),
            offset: 0,
        },
        rhs: OperandDef::Literal(lo),
        extra: Some(OperandDef::Literal(hi)),
    }
}

fn play(actions: Vec<ActionGroup>) -> Play {
    Play {
        name: SmolStr::new("scenario"),
        instrument: InstrumentSpec::new(SmolStr::new("BTCUSDT"), 0.01, 5.0, 0.005),
        timeframes: TimeframeSet {
            exec: Timeframe::H1,
            med: None,
            high: None,
        },
        warmup_bars: WarmupBars::default(),
        features: Vec::new(),
        actions,
        risk: RiskConfig {
            starting_equity_usdt: 10_000.0,
            max_leverage: 10.0,
            fee_taker_bps: 6.0,
            fee_maker_bps: 1.0,
            slippage_bps: 0.0,
            mark_price_source: MarkPriceSource::Close,
            funding_enabled: false,
            max_drawdown_pct: None,
            equity_floor_usdt: None,
        },
        sizing: Sizing::FixedUsdt { usdt: 1_000.0 },
        rolling_windows: Vec::new(),
    }
}

fn entry_play(sl: f64, tp: f64) -> Play {
    play(vec![ActionGroup {
        id: SmolStr::new("entry"),
        cases: vec![Case {
            when: close_between(99.5, 105.0),
            emit: vec![IntentDef {
                sl: Some(OperandDef::Literal(sl)),
                tp: Some(OperandDef::Literal(tp)),
                ..intent(IntentAction::EnterLong)
            }],
        }],
    }])
}

/// Trivial long hitting its take-profit: entry on the second bar's open at 100,
/// exit at 110, net PnL 100 - 0.6 - 0.66.
#[test]
fn test_trivial_long_take_profit() {
    let bars = hour_bars(&[
        (99.0, 101.0, 98.0, 100.0),
        (100.0, 102.0, 99.0, 101.0),
        (101.0, 112.0, 100.0, 111.0),
        (111.0, 112.0, 108.0, 109.0),
    ]);
    let out = tempfile::tempdir().unwrap();

    let artifacts = run(
        entry_play(95.0, 110.0),
        &provider(bars),
        0,
        4 * HOUR_MS,
        out.path(),
    )
    .unwrap();

    assert_eq!(artifacts.manifest.trade_count, 1);
    assert_eq!(artifacts.summary.total_trades, 1);
    assert_relative_eq!(artifacts.summary.net_pnl_usdt, 98.74, epsilon = 1e-9);
    assert_relative_eq!(
        artifacts.summary.final_equity_usdt,
        10_098.74,
        epsilon = 1e-9
    );
    assert_eq!(artifacts.manifest.terminal_stop.as_str(), "end_of_data");
    for name in [
        "result.json",
        "trades.parquet",
        "equity.parquet",
        "run_manifest.json",
        "pipeline_signature.json",
    ] {
        assert!(out.path().join(name).exists(), "{name} missing");
    }
}

/// Both SL and TP crossed in the same sub-bar: the stop-loss wins.
#[test]
fn test_stop_loss_wins_tie_break() {
    let bars = hour_bars(&[
        (99.0, 101.0, 98.5, 100.0),
        (100.0, 100.5, 99.5, 100.0),
        (99.0, 103.0, 97.0, 101.0),
    ]);
    let out = tempfile::tempdir().unwrap();

    let artifacts = run(
        entry_play(98.0, 102.0),
        &provider(bars),
        0,
        3 * HOUR_MS,
        out.path(),
    )
    .unwrap();

    assert_eq!(artifacts.manifest.trade_count, 1);
    // qty 10, exit at 98: gross -20
    assert_relative_eq!(
        artifacts.summary.net_pnl_usdt,
        -20.0 - 0.6 - 10.0 * 98.0 * 0.0006,
        epsilon = 1e-9
    );
}

/// 10x long liquidates at its bankruptcy price and equity stays non-negative.
#[test]
fn test_liquidation_floors_equity() {
    let bars = hour_bars(&[
        (99.0, 101.0, 98.0, 100.0),
        (100.0, 101.0, 99.0, 100.0),
        (98.0, 99.0, 85.0, 86.0),
    ]);
    let out = tempfile::tempdir().unwrap();

    let play = play(vec![ActionGroup {
        id: SmolStr::new("entry"),
        cases: vec![Case {
            when: close_above(99.5),
            emit: vec![intent(IntentAction::EnterLong)],
        }],
    }]);
    let artifacts = run(play, &provider(bars), 0, 3 * HOUR_MS, out.path()).unwrap();

    assert_eq!(artifacts.manifest.trade_count, 1);
    // bankruptcy = 100 * (1 - 1/10); position qty 10 loses exactly its margin
    assert_relative_eq!(artifacts.summary.net_pnl_usdt, -100.0 - 0.6, epsilon = 1e-9);
    assert!(artifacts.summary.final_equity_usdt >= 0.0);
    assert_relative_eq!(artifacts.summary.liquidation_loss_usdt, 0.0);
}

/// `fast cross_above slow` fires exactly on the crossing bar (alert counted once).
#[test]
fn test_crossover_fires_once() {
    let bars = hour_bars(&[
        (99.0, 101.0, 98.0, 100.0),
        (100.0, 102.0, 99.0, 101.0),
        (101.0, 103.0, 100.0, 102.0),
    ]);
    let minutes = minutes_for(&bars);
    let frame = BarFrame::from_bars(Timeframe::H1, bars)
        .unwrap()
        .with_indicator("fast", vec![10.0, 10.6, 10.7])
        .unwrap()
        .with_indicator("slow", vec![10.5, 10.4, 10.3])
        .unwrap();
    let provider = InMemoryProvider::new()
        .with_frame(Timeframe::H1, frame)
        .with_minute_stream(minutes)
        .with_funding(FundingSeries::default());

    let mut play = play(vec![ActionGroup {
        id: SmolStr::new("signal"),
        cases: vec![Case {
            when: ExprDef::Compare {
                op: SmolStr::new("cross_above"),
                lhs: OperandDef::Feature {
                    id: SmolStr::new("fast"),
                    offset: 0,
                },
                rhs: OperandDef::Feature {
                    id: SmolStr::new("slow"),
                    offset: 0,
                },
                extra: None,
            },
            emit: vec![intent(IntentAction::Alert)],
        }],
    }]);
    play.features = vec![
        FeatureDef {
            id: SmolStr::new("fast"),
            path: SmolStr::new("indicator.exec.fast"),
        },
        FeatureDef {
            id: SmolStr::new("slow"),
            path: SmolStr::new("indicator.exec.slow"),
        },
    ];

    let out = tempfile::tempdir().unwrap();
    let artifacts = run(play, &provider, 0, 3 * HOUR_MS, out.path()).unwrap();

    assert_eq!(artifacts.manifest.counts.alerts, 1);
    assert_eq!(artifacts.manifest.trade_count, 0);
}

/// Two identical runs produce bit-identical run hashes; a different Play does not.
#[test]
fn test_determinism_rerun_and_verify() {
    let bars = hour_bars(&[
        (99.0, 101.0, 98.0, 100.0),
        (100.0, 102.0, 99.0, 101.0),
        (101.0, 112.0, 100.0, 111.0),
        (111.0, 112.0, 108.0, 109.0),
    ]);
    let provider = provider(bars);

    let out_a = tempfile::tempdir().unwrap();
    let out_b = tempfile::tempdir().unwrap();
    let a = run(entry_play(95.0, 110.0), &provider, 0, 4 * HOUR_MS, out_a.path()).unwrap();
    let b = run(entry_play(95.0, 110.0), &provider, 0, 4 * HOUR_MS, out_b.path()).unwrap();

    assert_eq!(a.manifest.run_hash, b.manifest.run_hash);
    assert_eq!(
        verify(out_a.path(), out_b.path()).unwrap(),
        VerifyOutcome::Ok
    );

    // a different stop level changes the play canonical json, so full_hash differs
    let out_c = tempfile::tempdir().unwrap();
    run(entry_play(94.0, 110.0), &provider, 0, 4 * HOUR_MS, out_c.path()).unwrap();
    assert_eq!(
        verify(out_a.path(), out_c.path()).unwrap(),
        VerifyOutcome::HashMismatch {
            which: SmolStr::new("full_hash")
        }
    );
}

/// Warmup bars gate trading: the same signal with a 2-bar warmup enters later.
#[test]
fn test_warmup_gates_trading() {
    let bars = hour_bars(&[
        (99.0, 101.0, 98.0, 100.0),
        (100.0, 102.0, 99.0, 101.0),
        (101.0, 103.0, 100.0, 102.0),
        (102.0, 104.0, 101.0, 103.0),
    ]);
    let out = tempfile::tempdir().unwrap();

    let mut gated = entry_play(90.0, 200.0);
    gated.warmup_bars = WarmupBars {
        exec: 3,
        med: 0,
        high: 0,
    };
    let artifacts = run(gated, &provider(bars), 0, 4 * HOUR_MS, out.path()).unwrap();

    // signal can only fire from bar index 2; entry fills on bar 3 open, closed at
    // end of data
    assert_eq!(artifacts.manifest.trade_count, 1);
    assert_eq!(artifacts.summary.time_in_market_pct, 25.0);
    // equity is recorded for every bar, warmup included
    assert_eq!(artifacts.manifest.equity_point_count, 4);
}
