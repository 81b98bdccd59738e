//! Error types shared by the engine.
//!
//! Per-target failures ([`AnalysisError`]) never escape the orchestrator;
//! they are stored in the target's [`Outcome`](crate::model::Outcome).
//! [`SetupError`] and [`ExportError`] are fatal to a run.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a single target could not be analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The analyzer ran but failed (non-zero exit, bad output, HTTP error).
    #[error("analysis failed: {0}")]
    Execution(String),

    /// The analyzer did not finish within the per-target timeout.
    #[error("analysis took longer than {}s, abandoned", .0.as_secs())]
    Timeout(Duration),

    /// The analyzer backend is missing or misconfigured.
    #[error("analyzer unavailable: {0}")]
    Unavailable(String),
}

impl AnalysisError {
    /// Short label used in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Execution(_) => "error",
            AnalysisError::Timeout(_) => "timeout",
            AnalysisError::Unavailable(_) => "unavailable",
        }
    }
}

/// Errors raised before any target is dispatched.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("no usable analyzer backend: {0}")]
    NoBackend(String),

    #[error("invalid analyzer command: {0}")]
    InvalidCommand(String),

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Errors raised while writing the output artifact.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no records to export")]
    NoRecords,

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("xlsx export failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("json export failed: {0}")]
    Json(#[from] serde_json::Error),
}
