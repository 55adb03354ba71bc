use crate::engine::{EventCounts, TerminalStop};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Canonical JSON rendering (sorted keys, fixed float precision).
pub mod canonical;

/// SHA-256 helpers, the input fingerprint and the run hash chain.
pub mod hash;

/// The determinism verifier over two run directories.
pub mod verify;

/// Filesystem output of a run: json + parquet artifacts.
pub mod writer;

pub use hash::HashChain;
pub use verify::{VerifyOutcome, verify};
pub use writer::{RunArtifacts, write_run};

/// Engine version folded into `full_hash`; bumping it intentionally changes every
/// run hash.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialisation: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parquet: {0}")]
    Parquet(String),

    #[error("missing artifact: {path}")]
    MissingArtifact { path: String },
}

impl From<polars::error::PolarsError> for ArtifactError {
    fn from(error: polars::error::PolarsError) -> Self {
        Self::Parquet(error.to_string())
    }
}

/// `run_manifest.json`: the inputs fingerprint, the hash chain and run-level counts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunManifest {
    pub engine_version: SmolStr,
    pub play_name: SmolStr,
    /// Reserved for seeded stochastic extensions; the core uses no randomness.
    pub seed: u64,
    pub data_fingerprint: SmolStr,
    pub full_hash: SmolStr,
    pub trades_hash: SmolStr,
    pub equity_hash: SmolStr,
    pub run_hash: SmolStr,
    pub terminal_stop: TerminalStop,
    pub bars: usize,
    pub trade_count: usize,
    pub equity_point_count: usize,
    pub counts: EventCounts,
    pub liquidation_loss_usdt: f64,
}

/// `pipeline_signature.json`: identifies the producing pipeline so a validator can
/// reject artifacts from non-production shortcut paths.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineSignature {
    pub pipeline: SmolStr,
    pub engine_version: SmolStr,
    pub entry_point: SmolStr,
}

impl PipelineSignature {
    pub fn core() -> Self {
        Self {
            pipeline: SmolStr::new("playbook-core"),
            engine_version: SmolStr::new(ENGINE_VERSION),
            entry_point: SmolStr::new("playbook::run"),
        }
    }
}
