use crate::{
    artifact::{
        ArtifactError, ENGINE_VERSION, HashChain, PipelineSignature, RunManifest,
        canonical::canonical,
    },
    engine::RunOutcome,
    statistic::summary::RunSummary,
};
use playbook_execution::{
    ledger::Ledger,
    trade::{EquityPoint, TradeRecord},
};
use playbook_strategy::Play;
use polars::prelude::*;
use smol_str::SmolStr;
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tracing::info;

/// Everything a finished run leaves on disk.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub out_dir: PathBuf,
    pub summary: RunSummary,
    pub manifest: RunManifest,
}

/// Write the full artifact set for one run:
/// `result.json`, `trades.parquet`, `equity.parquet`, `run_manifest.json`,
/// `pipeline_signature.json`.
pub fn write_run(
    out_dir: &Path,
    play: &Play,
    summary: &RunSummary,
    trades: &[TradeRecord],
    equity: &[EquityPoint],
    outcome: &RunOutcome,
    ledger: &Ledger,
    data_fingerprint: &str,
) -> Result<RunArtifacts, ArtifactError> {
    std::fs::create_dir_all(out_dir)?;

    let play_canonical = canonical(play)?;
    let summary_canonical = canonical(summary)?;
    let chain = HashChain::compute(
        &play_canonical,
        data_fingerprint,
        ENGINE_VERSION,
        trades,
        equity,
        &summary_canonical,
    )?;

    let manifest = RunManifest {
        engine_version: SmolStr::new(ENGINE_VERSION),
        play_name: play.name.clone(),
        seed: 0,
        data_fingerprint: SmolStr::new(data_fingerprint),
        full_hash: chain.full_hash.clone(),
        trades_hash: chain.trades_hash.clone(),
        equity_hash: chain.equity_hash.clone(),
        run_hash: chain.run_hash.clone(),
        terminal_stop: outcome.terminal,
        bars: outcome.bars,
        trade_count: trades.len(),
        equity_point_count: equity.len(),
        counts: outcome.counts,
        liquidation_loss_usdt: ledger.liquidation_loss_usdt,
    };

    std::fs::write(
        out_dir.join("result.json"),
        serde_json::to_string_pretty(summary)?,
    )?;
    write_trades_parquet(&out_dir.join("trades.parquet"), trades)?;
    write_equity_parquet(&out_dir.join("equity.parquet"), equity)?;
    std::fs::write(
        out_dir.join("run_manifest.json"),
        serde_json::to_string_pretty(&manifest)?,
    )?;
    std::fs::write(
        out_dir.join("pipeline_signature.json"),
        serde_json::to_string_pretty(&PipelineSignature::core())?,
    )?;

    info!(out_dir = %out_dir.display(), run_hash = %manifest.run_hash, "artifacts written");

    Ok(RunArtifacts {
        out_dir: out_dir.to_path_buf(),
        summary: summary.clone(),
        manifest,
    })
}

fn write_trades_parquet(path: &Path, trades: &[TradeRecord]) -> Result<(), ArtifactError> {
    let mut ids = Vec::with_capacity(trades.len());
    let mut sides = Vec::with_capacity(trades.len());
    let mut entry_ts = Vec::with_capacity(trades.len());
    let mut exit_ts = Vec::with_capacity(trades.len());
    let mut entry_prices = Vec::with_capacity(trades.len());
    let mut exit_prices = Vec::with_capacity(trades.len());
    let mut sizes = Vec::with_capacity(trades.len());
    let mut pnls = Vec::with_capacity(trades.len());
    let mut net_pnls = Vec::with_capacity(trades.len());
    let mut fees = Vec::with_capacity(trades.len());
    let mut funding_paid = Vec::with_capacity(trades.len());
    let mut funding_received = Vec::with_capacity(trades.len());
    let mut exit_reasons = Vec::with_capacity(trades.len());
    let mut maes = Vec::with_capacity(trades.len());
    let mut mfes = Vec::with_capacity(trades.len());

    for trade in trades {
        ids.push(trade.id.to_string());
        sides.push(trade.side.to_string());
        entry_ts.push(trade.entry_ts_ms);
        exit_ts.push(trade.exit_ts_ms);
        entry_prices.push(trade.entry_price);
        exit_prices.push(trade.exit_price);
        sizes.push(trade.size_usdt);
        pnls.push(trade.pnl_usdt);
        net_pnls.push(trade.net_pnl_usdt());
        fees.push(trade.fees_usdt);
        funding_paid.push(trade.funding_paid_usdt);
        funding_received.push(trade.funding_received_usdt);
        exit_reasons.push(trade.exit_reason.to_string());
        maes.push(trade.mae_usdt);
        mfes.push(trade.mfe_usdt);
    }

    let mut df = df!(
        "id" => ids,
        "side" => sides,
        "entry_ts_ms" => entry_ts,
        "exit_ts_ms" => exit_ts,
        "entry_price" => entry_prices,
        "exit_price" => exit_prices,
        "size_usdt" => sizes,
        "pnl_usdt" => pnls,
        "net_pnl_usdt" => net_pnls,
        "fees_usdt" => fees,
        "funding_paid_usdt" => funding_paid,
        "funding_received_usdt" => funding_received,
        "exit_reason" => exit_reasons,
        "mae_usdt" => maes,
        "mfe_usdt" => mfes,
    )?;

    let mut file = File::create(path)?;
    ParquetWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}

fn write_equity_parquet(path: &Path, equity: &[EquityPoint]) -> Result<(), ArtifactError> {
    let mut ts = Vec::with_capacity(equity.len());
    let mut equity_col = Vec::with_capacity(equity.len());
    let mut cash = Vec::with_capacity(equity.len());
    let mut unrealized = Vec::with_capacity(equity.len());
    let mut realized = Vec::with_capacity(equity.len());

    for point in equity {
        ts.push(point.ts_ms);
        equity_col.push(point.equity_usdt);
        cash.push(point.cash_balance_usdt);
        unrealized.push(point.unrealized_pnl_usdt);
        realized.push(point.realized_pnl_usdt);
    }

    let mut df = df!(
        "ts_ms" => ts,
        "equity_usdt" => equity_col,
        "cash_balance_usdt" => cash,
        "unrealized_pnl_usdt" => unrealized,
        "realized_pnl_usdt" => realized,
    )?;

    let mut file = File::create(path)?;
    ParquetWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}
