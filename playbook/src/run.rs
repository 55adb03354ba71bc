use crate::{
    artifact::{hash::fingerprint_feed, writer},
    engine::Engine,
    error::PlaybookError,
    statistic::summary::RunSummary,
};
use playbook_data::{feed::BarFeed, provider::DataProvider, structure::StructureSet};
use playbook_strategy::Play;
use std::path::Path;
use tracing::info;

pub use crate::artifact::writer::RunArtifacts;

/// Load inputs, drive a full backtest and write the artifact set.
///
/// Structure detectors are external collaborators; this entry runs with an empty
/// registry. Use [`run_with_structures`] to plug detectors in.
pub fn run(
    play: Play,
    provider: &dyn DataProvider,
    start_ts: i64,
    end_ts: i64,
    out_dir: &Path,
) -> Result<RunArtifacts, PlaybookError> {
    run_with_structures(play, provider, StructureSet::new(), start_ts, end_ts, out_dir)
}

pub fn run_with_structures(
    play: Play,
    provider: &dyn DataProvider,
    structures: StructureSet,
    start_ts: i64,
    end_ts: i64,
    out_dir: &Path,
) -> Result<RunArtifacts, PlaybookError> {
    let symbol = play.instrument.symbol.clone();

    let mut exec = provider.load_frame(&symbol, play.timeframes.exec, start_ts, end_ts)?;
    exec.precompute_rolling_extremes(&play.rolling_windows);

    let med = play
        .timeframes
        .med
        .map(|tf| provider.load_frame(&symbol, tf, start_ts, end_ts))
        .transpose()?
        .map(|mut frame| {
            frame.precompute_rolling_extremes(&play.rolling_windows);
            frame
        });
    let high = play
        .timeframes
        .high
        .map(|tf| provider.load_frame(&symbol, tf, start_ts, end_ts))
        .transpose()?
        .map(|mut frame| {
            frame.precompute_rolling_extremes(&play.rolling_windows);
            frame
        });

    let feed = BarFeed::new(exec, med, high);
    let funding = provider.load_funding(&symbol, start_ts, end_ts)?;
    let minutes = provider.load_minute_stream(&symbol, start_ts, end_ts)?;

    let data_fingerprint = fingerprint_feed(&feed);

    let mut engine = Engine::new(play.clone(), feed, minutes, structures, funding)?;
    let outcome = engine.run();

    let (trades, equity, ledger) = engine.into_exchange().into_results();
    let summary = RunSummary::generate(&trades, &equity, &ledger, &outcome, play.timeframes.exec);

    info!(
        play = %play.name,
        terminal = %outcome.terminal,
        trades = trades.len(),
        "run complete"
    );

    let artifacts = writer::write_run(
        out_dir,
        &play,
        &summary,
        &trades,
        &equity,
        &outcome,
        &ledger,
        &data_fingerprint,
    )?;
    Ok(artifacts)
}
