//! Progress events emitted by the batch runners.

use std::path::PathBuf;

use crate::models::UnitStatus;

/// Events emitted while a window is processed.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// The window's work list is known.
    WindowSelected { total: usize },
    AssetStarted { path: PathBuf },
    AssetCompleted {
        path: PathBuf,
        units: usize,
        errors: usize,
    },
    /// The whole file failed (conversion or preflight).
    AssetFailed { path: PathBuf, error: String },
    /// The file was not handed to the OCR backend.
    AssetSkipped { path: PathBuf, status: UnitStatus },
    /// Rows were committed to the ledger.
    WindowPersisted { rows: usize },
}

/// Counts for one processed window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub assets: usize,
    pub units: usize,
    /// Units with a text artifact.
    pub written: usize,
    /// Units processed without any text.
    pub blank: usize,
    pub errors: usize,
    pub failed_assets: usize,
    pub skipped_assets: usize,
    pub rows_persisted: usize,
}
