//! Confidence histogram over file-map results.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{io_at, PipelineError};
use crate::models::UnitRecord;

use super::filemap::load_file_map;

/// Bin labels; each bin includes its upper edge, so "0" covers every
/// confidence up to and including 1.
pub const BIN_LABELS: [&str; 8] = ["0", "1-60", "60-70", "70-80", "80-85", "85-90", "90-95", "95+"];

const BIN_UPPER_EDGES: [f64; 7] = [1.0, 60.0, 70.0, 80.0, 85.0, 90.0, 95.0];

/// Index into [`BIN_LABELS`] for a confidence value.
pub fn bin_index(confidence: f64) -> usize {
    BIN_UPPER_EDGES
        .iter()
        .position(|edge| confidence <= *edge)
        .unwrap_or(BIN_LABELS.len() - 1)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfidenceReport {
    pub bins: [usize; 8],
    /// Records carrying no confidence (skipped, missing, failed).
    pub without_confidence: usize,
    /// Record count per status.
    pub statuses: BTreeMap<String, usize>,
    pub files: Vec<PathBuf>,
}

impl ConfidenceReport {
    pub fn add(&mut self, record: &UnitRecord) {
        match record.confidence {
            Some(c) => self.bins[bin_index(c)] += 1,
            None => self.without_confidence += 1,
        }
        let status = record
            .status
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        *self.statuses.entry(status).or_default() += 1;
    }

    pub fn total(&self) -> usize {
        self.bins.iter().sum::<usize>() + self.without_confidence
    }

    /// (label, count) pairs in bin order.
    pub fn rows(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        BIN_LABELS.iter().copied().zip(self.bins.iter().copied())
    }
}

/// Build a report from every `filemap_confidence-*.json` directly in `dir`.
pub fn build_report(dir: &Path) -> Result<ConfidenceReport, PipelineError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_at(dir))? {
        let path = entry.map_err(io_at(dir))?.path();
        let is_result = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("filemap_confidence-") && n.ends_with(".json"));
        if is_result && path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let mut report = ConfidenceReport::default();
    for file in &files {
        for record in load_file_map(file)? {
            report.add(&record);
        }
    }
    report.files = files;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UnitStatus;
    use tempfile::tempdir;

    #[test]
    fn test_bins_include_upper_edge() {
        assert_eq!(BIN_LABELS[bin_index(0.0)], "0");
        assert_eq!(BIN_LABELS[bin_index(-1.0)], "0");
        assert_eq!(BIN_LABELS[bin_index(0.5)], "0");
        assert_eq!(BIN_LABELS[bin_index(1.0)], "0");
        assert_eq!(BIN_LABELS[bin_index(1.5)], "1-60");
        assert_eq!(BIN_LABELS[bin_index(60.0)], "1-60");
        assert_eq!(BIN_LABELS[bin_index(60.1)], "60-70");
        assert_eq!(BIN_LABELS[bin_index(85.0)], "80-85");
        assert_eq!(BIN_LABELS[bin_index(87.5)], "85-90");
        assert_eq!(BIN_LABELS[bin_index(95.0)], "90-95");
        assert_eq!(BIN_LABELS[bin_index(95.01)], "95+");
    }

    #[test]
    fn test_build_report_reads_result_files_only() {
        let dir = tempdir().unwrap();
        let mut a = UnitRecord::from_origin("/r/a.pdf");
        a.status = Some(UnitStatus::Processed);
        a.confidence = Some(91.0);
        let mut b = UnitRecord::from_origin("/r/b.pdf");
        b.status = Some(UnitStatus::FileEmpty);

        fs::write(
            dir.path().join("filemap_confidence-0-1000.json"),
            serde_json::to_string(&vec![a, b]).unwrap(),
        )
        .unwrap();
        fs::write(dir.path().join("other.json"), "not json").unwrap();

        let report = build_report(dir.path()).unwrap();
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.total(), 2);
        assert_eq!(report.bins[bin_index(91.0)], 1);
        assert_eq!(report.without_confidence, 1);
        assert_eq!(report.statuses.get("file-empty"), Some(&1));
    }
}
