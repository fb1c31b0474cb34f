//! File-map driven OCR: a JSON array of Unit Records in, one out.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::events::{BatchEvent, BatchSummary};
use super::scrub::{Redactor, ScrubSink};
use super::sink::OutputSink;
use super::strategy::ExtractedUnit;
use super::transcribe::preflight;
use crate::error::{io_at, PipelineError};
use crate::models::{Granularity, UnitRecord, UnitStatus, ValidationError, Window};
use crate::ocr::OcrBackend;

/// Read a JSON file map. Records with keys outside the schema are rejected.
pub fn load_file_map(path: &Path) -> Result<Vec<UnitRecord>, PipelineError> {
    let contents = fs::read_to_string(path).map_err(io_at(path))?;
    serde_json::from_str(&contents)
        .map_err(|e| PipelineError::Input(format!("invalid file map {}: {}", path.display(), e)))
}

/// `<output_root>/filemap_confidence-<offset>-<offset+chunk_size>.json`
pub fn results_path(output_root: &Path, window: Window) -> PathBuf {
    output_root.join(format!(
        "filemap_confidence-{}-{}.json",
        window.offset,
        window.end()
    ))
}

pub fn write_results(path: &Path, records: &[UnitRecord]) -> Result<(), PipelineError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(io_at(dir))?;
    }
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| PipelineError::Input(format!("cannot encode results: {}", e)))?;
    fs::write(path, json).map_err(io_at(path))
}

/// Optional scrub step applied to every written unit.
pub struct ScrubStage<'a> {
    pub redactor: &'a dyn Redactor,
    pub threshold: f64,
}

/// Runs the records of one window through OCR (and optionally scrubbing).
pub struct FileMapRunner<'a, B: OcrBackend + ?Sized> {
    backend: &'a B,
    sink: OutputSink,
    scrub: Option<ScrubStage<'a>>,
}

impl<'a, B: OcrBackend + ?Sized> FileMapRunner<'a, B> {
    pub fn new(backend: &'a B, output_root: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            sink: OutputSink::new(output_root),
            scrub: None,
        }
    }

    pub fn with_scrub(mut self, stage: ScrubStage<'a>) -> Self {
        self.scrub = Some(stage);
        self
    }

    pub fn output_root(&self) -> &Path {
        self.sink.output_root()
    }

    /// Process the records inside `window`, in order.
    ///
    /// Non-PDF, missing and empty files are recorded with their status and
    /// never reach the backend. A file that fails conversion yields one
    /// `error` record; otherwise every unit yields one record.
    pub fn run(
        &self,
        records: &[UnitRecord],
        granularity: Granularity,
        window: Window,
        observer: &mut dyn FnMut(BatchEvent),
    ) -> Result<(Vec<UnitRecord>, BatchSummary), PipelineError> {
        let selected: Vec<&UnitRecord> = records
            .iter()
            .enumerate()
            .filter(|(i, _)| window.contains(*i as u64))
            .map(|(_, r)| r)
            .collect();
        info!(
            "Processing {} of {} file map item(s) at {} granularity",
            selected.len(),
            records.len(),
            granularity
        );
        observer(BatchEvent::WindowSelected {
            total: selected.len(),
        });

        let scrub_sink = self
            .scrub
            .as_ref()
            .map(|_| ScrubSink::new(self.sink.output_root(), granularity.as_str()));

        let mut summary = BatchSummary::default();
        let mut output = Vec::new();

        for record in selected {
            summary.assets += 1;
            let path = record.origin_filepath.as_deref().map(PathBuf::from);

            let skip_status = if record.origin_ext.as_deref() != Some("pdf") {
                Some(UnitStatus::Skipped)
            } else {
                let path = path
                    .as_deref()
                    .ok_or(ValidationError::Unset("origin_filepath"))?;
                preflight(path)
            };
            if let Some(status) = skip_status {
                summary.skipped_assets += 1;
                observer(BatchEvent::AssetSkipped {
                    path: path.unwrap_or_default(),
                    status,
                });
                let mut skipped = record.clone();
                skipped.status = Some(status);
                output.push(skipped);
                continue;
            }
            let path = path.ok_or(ValidationError::Unset("origin_filepath"))?;

            observer(BatchEvent::AssetStarted { path: path.clone() });
            match granularity.process(self.backend, &path) {
                Ok(units) => {
                    let errors = units
                        .iter()
                        .filter(|u| u.status == UnitStatus::Error)
                        .count();
                    let count = units.len();
                    for unit in units {
                        let out = self.unit_record(
                            record,
                            granularity,
                            unit,
                            scrub_sink.as_ref(),
                            &mut summary,
                        )?;
                        output.push(out);
                    }
                    summary.units += count;
                    summary.errors += errors;
                    observer(BatchEvent::AssetCompleted {
                        path,
                        units: count,
                        errors,
                    });
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", path.display(), e);
                    summary.failed_assets += 1;
                    summary.units += 1;
                    summary.errors += 1;
                    observer(BatchEvent::AssetFailed {
                        path,
                        error: e.to_string(),
                    });
                    let mut failed = record.clone();
                    failed.granularity = Some(granularity);
                    failed.status = Some(UnitStatus::Error);
                    output.push(failed);
                }
            }
        }

        Ok((output, summary))
    }

    fn unit_record(
        &self,
        origin: &UnitRecord,
        granularity: Granularity,
        unit: ExtractedUnit,
        scrub_sink: Option<&ScrubSink>,
        summary: &mut BatchSummary,
    ) -> Result<UnitRecord, PipelineError> {
        let mut record = origin.for_unit(granularity, unit.page, unit.block);
        record.status = Some(unit.status);
        record.confidence = unit.confidence;

        if !unit.has_text() {
            if unit.status == UnitStatus::Processed {
                summary.blank += 1;
            }
            return Ok(record);
        }

        let written = match self.sink.write(granularity, &mut record, &unit.text) {
            Ok(written) => written,
            Err(e @ PipelineError::Io { .. }) => {
                warn!("Could not write text for {:?}: {}", record.origin_filepath, e);
                record.status = Some(UnitStatus::Error);
                record.confidence = None;
                summary.errors += 1;
                return Ok(record);
            }
            Err(e) => return Err(e),
        };
        summary.written += 1;

        if let (Some(stage), Some(sink), Some(path)) = (&self.scrub, scrub_sink, written) {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let redaction = stage.redactor.redact(&unit.text, stage.threshold);
            match sink.write(&stem, &redaction) {
                Ok(files) => {
                    record.scrubbed_output_filepath =
                        Some(files.text_file.to_string_lossy().into_owned());
                    record.scrubbed_confidence_filepath =
                        Some(files.confidence_file.to_string_lossy().into_owned());
                }
                Err(e) => warn!("Could not scrub {}: {}", path.display(), e),
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_results_path_names_window() {
        assert_eq!(
            results_path(Path::new("/out"), Window::new(2000, 1000)),
            PathBuf::from("/out/filemap_confidence-2000-3000.json")
        );
    }

    #[test]
    fn test_load_file_map_rejects_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.json");
        fs::write(
            &path,
            r#"[{"origin_filepath": "/a.pdf", "origin_ext": "pdf", "site": "north"}]"#,
        )
        .unwrap();
        let err = load_file_map(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Input(ref m) if m.contains("site")));
    }

    #[test]
    fn test_write_then_load_results() {
        let dir = tempdir().unwrap();
        let path = results_path(dir.path(), Window::new(0, 10));
        let mut record = UnitRecord::from_origin("/r/094-000001/a.pdf");
        record.status = Some(UnitStatus::FileEmpty);

        write_results(&path, &[record.clone()]).unwrap();
        assert_eq!(load_file_map(&path).unwrap(), vec![record]);
    }
}
