use crate::artifact::ArtifactError;
use playbook_data::error::DataError;
use playbook_execution::error::ExecutionError;
use playbook_strategy::error::ConfigError;
use thiserror::Error;

/// Top-level error for a Playbook run.
///
/// Everything here surfaces before or outside the hot loop: Play compilation and
/// data preflight fail the run before bar zero, artifact errors after the last bar.
/// In-loop invariant violations panic with the bar index instead of returning.
#[derive(Debug, Error)]
pub enum PlaybookError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("data: {0}")]
    Data(#[from] DataError),

    #[error("execution: {0}")]
    Execution(#[from] ExecutionError),

    #[error("artifact: {0}")]
    Artifact(#[from] ArtifactError),
}
