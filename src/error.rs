//! Pipeline-wide error type.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::ValidationError;
use crate::ocr::OcrError;
use crate::repository::LedgerError;

/// Errors surfaced by the pipeline services.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid input: {0}")]
    Input(String),
}

/// Attach a path to an IO error.
pub fn io_at(path: &Path) -> impl FnOnce(io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}
