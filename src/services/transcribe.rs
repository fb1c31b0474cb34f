//! Resumable batch transcription over the ledger.
//!
//! Each window runs `select pending -> process each -> persist batch`:
//! pending assets are chosen by the absence of an output file, processed
//! one after another, and all produced rows are committed in a single
//! transaction at the end. A crash before the commit leaves every asset
//! of the window pending, so rerunning the same window is safe. Text files
//! written before a crash are simply overwritten on the rerun.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::events::{BatchEvent, BatchSummary};
use super::sink::OutputSink;
use super::strategy::ExtractedUnit;
use crate::error::PipelineError;
use crate::models::{ExtractionResult, Granularity, SourceAsset, UnitRecord, UnitStatus, Window};
use crate::ocr::{OcrBackend, OcrError};
use crate::repository::LedgerSession;

/// Status for a source file that must not reach the OCR backend, if any.
pub fn preflight(path: &Path) -> Option<UnitStatus> {
    match fs::metadata(path) {
        Err(_) => Some(UnitStatus::FileNotFound),
        Ok(meta) if meta.len() == 0 => Some(UnitStatus::FileEmpty),
        Ok(_) => None,
    }
}

/// Drives ledger assets through a granularity strategy.
pub struct TranscriptionService<'a, B: OcrBackend + ?Sized> {
    backend: &'a B,
    sink: OutputSink,
}

impl<'a, B: OcrBackend + ?Sized> TranscriptionService<'a, B> {
    pub fn new(backend: &'a B, output_root: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            sink: OutputSink::new(output_root),
        }
    }

    /// Process one window of pending assets of `document_type`.
    ///
    /// Per-file failures become `error` rows. Only ledger and validation
    /// failures are returned, and then nothing of the window is committed.
    pub fn run_window(
        &self,
        ledger: &mut LedgerSession,
        document_type: Granularity,
        window: Window,
        observer: &mut dyn FnMut(BatchEvent),
    ) -> Result<BatchSummary, PipelineError> {
        let pending = ledger.select_pending(document_type, window)?;
        info!(
            "Selected {} pending {} asset(s) at offset {}",
            pending.len(),
            document_type,
            window.offset
        );
        observer(BatchEvent::WindowSelected {
            total: pending.len(),
        });

        let mut summary = BatchSummary::default();
        let mut rows = Vec::new();

        for asset in &pending {
            summary.assets += 1;
            observer(BatchEvent::AssetStarted {
                path: asset.input_file.clone(),
            });

            match self.process_asset(asset, document_type) {
                Ok(results) => {
                    let errors = results
                        .iter()
                        .filter(|r| r.status == UnitStatus::Error)
                        .count();
                    summary.units += results.len();
                    summary.errors += errors;
                    summary.written += results
                        .iter()
                        .filter(|r| r.ocr_output_file.is_some())
                        .count();
                    summary.blank += results
                        .iter()
                        .filter(|r| r.status == UnitStatus::Processed && r.ocr_output_file.is_none())
                        .count();
                    observer(BatchEvent::AssetCompleted {
                        path: asset.input_file.clone(),
                        units: results.len(),
                        errors,
                    });
                    rows.extend(results);
                }
                Err(PipelineError::Ocr(e)) => {
                    warn!("Failed to process {}: {}", asset.input_file.display(), e);
                    summary.failed_assets += 1;
                    summary.units += 1;
                    summary.errors += 1;
                    observer(BatchEvent::AssetFailed {
                        path: asset.input_file.clone(),
                        error: e.to_string(),
                    });
                    rows.push(ExtractionResult::new(asset.id, 0, 0, UnitStatus::Error));
                }
                Err(e) => return Err(e),
            }
        }

        summary.rows_persisted = ledger.persist_results(&rows)?;
        info!(
            "Persisted {} row(s) for {} asset(s)",
            summary.rows_persisted, summary.assets
        );
        observer(BatchEvent::WindowPersisted {
            rows: summary.rows_persisted,
        });

        Ok(summary)
    }

    /// Run the strategy on one asset and write its text units.
    ///
    /// Conversion failures (including missing or empty files, which never
    /// reach the backend) come back as `PipelineError::Ocr`.
    fn process_asset(
        &self,
        asset: &SourceAsset,
        granularity: Granularity,
    ) -> Result<Vec<ExtractionResult>, PipelineError> {
        let path = &asset.input_file;
        match preflight(path) {
            Some(UnitStatus::FileNotFound) => {
                return Err(OcrError::conversion(path, "file does not exist").into())
            }
            Some(UnitStatus::FileEmpty) => {
                return Err(OcrError::conversion(path, "file is empty").into())
            }
            _ => {}
        }

        let units = granularity.process(self.backend, path)?;
        let origin = UnitRecord::from_origin(path);

        units
            .into_iter()
            .map(|unit| self.persistable(asset, granularity, &origin, unit))
            .collect()
    }

    fn persistable(
        &self,
        asset: &SourceAsset,
        granularity: Granularity,
        origin: &UnitRecord,
        unit: ExtractedUnit,
    ) -> Result<ExtractionResult, PipelineError> {
        let mut result = ExtractionResult::new(asset.id, unit.page, unit.block, unit.status);
        result.ocr_confidence = unit.confidence;

        if unit.has_text() {
            let mut record = origin.for_unit(granularity, unit.page, unit.block);
            match self.sink.write(granularity, &mut record, &unit.text) {
                Ok(path) => result.ocr_output_file = path,
                Err(e @ PipelineError::Io { .. }) => {
                    warn!(
                        "Could not write text for {} page {} block {}: {}",
                        asset.input_file.display(),
                        unit.page,
                        unit.block,
                        e
                    );
                    result.status = UnitStatus::Error;
                    result.ocr_confidence = None;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(result)
    }
}
