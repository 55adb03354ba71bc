use crate::artifact::{ArtifactError, RunManifest};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::path::Path;

/// Result of comparing two run directories.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum VerifyOutcome {
    Ok,
    HashMismatch { which: SmolStr },
}

/// Compare the hash chains of two finished runs.
///
/// Two runs with identical inputs and engine version must produce bit-identical
/// `run_hash`; the first differing link is reported by name.
pub fn verify(run_dir_a: &Path, run_dir_b: &Path) -> Result<VerifyOutcome, ArtifactError> {
    let a = read_manifest(run_dir_a)?;
    let b = read_manifest(run_dir_b)?;

    let links = [
        ("full_hash", &a.full_hash, &b.full_hash),
        ("trades_hash", &a.trades_hash, &b.trades_hash),
        ("equity_hash", &a.equity_hash, &b.equity_hash),
        ("run_hash", &a.run_hash, &b.run_hash),
    ];

    for (which, left, right) in links {
        if left != right {
            return Ok(VerifyOutcome::HashMismatch {
                which: SmolStr::new(which),
            });
        }
    }

    Ok(VerifyOutcome::Ok)
}

fn read_manifest(run_dir: &Path) -> Result<RunManifest, ArtifactError> {
    let path = run_dir.join("run_manifest.json");
    if !path.exists() {
        return Err(ArtifactError::MissingArtifact {
            path: path.display().to_string(),
        });
    }
    let raw = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&raw)?)
}
