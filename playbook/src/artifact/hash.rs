use crate::artifact::{ArtifactError, canonical::canonical};
use playbook_data::feed::BarFeed;
use playbook_execution::trade::{EquityPoint, TradeRecord};
use playbook_instrument::timeframe::TimeframeRole;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use smol_str::SmolStr;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Deterministic fingerprint of the run's market data: every frame's timeframe,
/// timestamps, OHLCV and indicator columns, in fixed role order.
pub fn fingerprint_feed(feed: &BarFeed) -> String {
    let mut hasher = Sha256::new();
    for role in [TimeframeRole::Exec, TimeframeRole::Med, TimeframeRole::High] {
        let Some(frame) = feed.frame(role) else {
            continue;
        };
        hasher.update(role.as_str().as_bytes());
        hasher.update(frame.timeframe().as_str().as_bytes());
        hasher.update((frame.len() as u64).to_le_bytes());
        for idx in 0..frame.len() {
            let bar = frame.bar(idx);
            hasher.update(bar.ts_open.to_le_bytes());
            hasher.update(bar.open.to_le_bytes());
            hasher.update(bar.high.to_le_bytes());
            hasher.update(bar.low.to_le_bytes());
            hasher.update(bar.close.to_le_bytes());
            hasher.update(bar.volume.to_le_bytes());
        }
        let keys: Vec<_> = frame.indicator_keys().cloned().collect();
        for key in keys {
            hasher.update(key.as_bytes());
            let slot = frame.indicator_slot(&key).expect("key just listed");
            for idx in 0..frame.len() {
                let value = frame.indicator(slot, idx).unwrap_or(f64::NAN);
                hasher.update(value.to_le_bytes());
            }
        }
    }
    hex::encode(hasher.finalize())
}

/// The run's hash chain:
/// `full_hash = H(play || data_fingerprint || engine_version)`,
/// `trades_hash` / `equity_hash` over canonical record concatenations,
/// `run_hash = H(full_hash || trades_hash || equity_hash || summary)`.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct HashChain {
    pub full_hash: SmolStr,
    pub trades_hash: SmolStr,
    pub equity_hash: SmolStr,
    pub run_hash: SmolStr,
}

impl HashChain {
    pub fn compute(
        play_canonical: &str,
        data_fingerprint: &str,
        engine_version: &str,
        trades: &[TradeRecord],
        equity: &[EquityPoint],
        summary_canonical: &str,
    ) -> Result<Self, ArtifactError> {
        let full_hash = sha256_hex(
            format!("{play_canonical}{data_fingerprint}{engine_version}").as_bytes(),
        );

        let mut trades_bytes = String::new();
        for trade in trades {
            trades_bytes.push_str(&canonical(trade)?);
            trades_bytes.push('\n');
        }
        let trades_hash = sha256_hex(trades_bytes.as_bytes());

        let mut equity_bytes = String::new();
        for point in equity {
            equity_bytes.push_str(&canonical(point)?);
            equity_bytes.push('\n');
        }
        let equity_hash = sha256_hex(equity_bytes.as_bytes());

        let run_hash = sha256_hex(
            format!("{full_hash}{trades_hash}{equity_hash}{summary_canonical}").as_bytes(),
        );

        Ok(Self {
            full_hash: SmolStr::new(full_hash),
            trades_hash: SmolStr::new(trades_hash),
            equity_hash: SmolStr::new(equity_hash),
            run_hash: SmolStr::new(run_hash),
        })
    }
}
