//! List replacement: swap every string from a CSV/TSV column for a token.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{io_at, PipelineError};
use crate::models::{Granularity, Window};
use crate::repository::{LedgerSession, OutputWithAsset, ReplacementUpdate};

/// Read the values of `column` from a `.csv` file, or a tab separated file
/// for any other extension. Empty cells are dropped.
pub fn read_target_strings(path: &Path, column: &str) -> Result<Vec<String>, PipelineError> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let delimiter = if is_csv { b',' } else { b'\t' };

    let data = fs::read(path).map_err(io_at(path))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(data.as_slice());

    let bad_data =
        |e: csv::Error| PipelineError::Input(format!("cannot read {}: {}", path.display(), e));

    let index = reader
        .headers()
        .map_err(bad_data)?
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| {
            PipelineError::Input(format!("column '{}' not found in {}", column, path.display()))
        })?;

    let mut targets = Vec::new();
    for record in reader.records() {
        let record = record.map_err(bad_data)?;
        if let Some(value) = record.get(index).map(str::trim).filter(|v| !v.is_empty()) {
            targets.push(value.to_string());
        }
    }
    Ok(targets)
}

/// Replaces every target string with a single token.
#[derive(Debug, Clone)]
pub struct StringReplacer {
    targets: Vec<String>,
    replacement: String,
}

impl StringReplacer {
    /// Longer targets are applied first so a name is not split by one of
    /// its own prefixes.
    pub fn new(targets: impl IntoIterator<Item = String>, replacement: impl Into<String>) -> Self {
        let mut targets: Vec<String> = targets.into_iter().filter(|t| !t.is_empty()).collect();
        targets.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        targets.dedup();
        Self {
            targets,
            replacement: replacement.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Replaced text and the number of replacements made.
    pub fn replace(&self, text: &str) -> (String, usize) {
        let mut out = text.to_string();
        let mut count = 0;
        for target in &self.targets {
            let hits = out.matches(target.as_str()).count();
            if hits > 0 {
                out = out.replace(target.as_str(), &self.replacement);
                count += hits;
            }
        }
        (out, count)
    }
}

/// Counts for one replacement window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplacementSummary {
    pub files: usize,
    pub replacements: usize,
    pub failed: usize,
}

/// Applies a [`StringReplacer`] to ledger outputs.
pub struct ListReplacementService {
    replacer: StringReplacer,
    output_dir: PathBuf,
}

impl ListReplacementService {
    pub fn new(replacer: StringReplacer, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            replacer,
            output_dir: output_dir.into(),
        }
    }

    /// Where a first replacement of `ocr_file` goes.
    pub fn target_path(&self, document_type: Granularity, ocr_file: &Path) -> PathBuf {
        let stem = ocr_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.output_dir
            .join("list_replacement_output_file")
            .join(document_type.as_str())
            .join(format!("{}.txt", stem))
    }

    /// Process one window. An existing replacement file is rewritten in
    /// place, otherwise the OCR output is copied with replacements applied.
    pub fn run_window(
        &self,
        ledger: &mut LedgerSession,
        document_type: Granularity,
        window: Window,
    ) -> Result<ReplacementSummary, PipelineError> {
        let outputs = ledger.outputs_with_text(document_type, window)?;
        let mut summary = ReplacementSummary::default();
        let mut updates = Vec::new();

        for item in &outputs {
            match self.replace_one(document_type, item) {
                Ok(Some((path, count))) => {
                    summary.files += 1;
                    summary.replacements += count;
                    updates.push(ReplacementUpdate {
                        output_id: item.output.id,
                        replaced_file: path,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "List replacement failed for output {} of {}: {}",
                        item.output.id,
                        item.asset.input_file.display(),
                        e
                    );
                    summary.failed += 1;
                }
            }
        }

        ledger.record_list_replacements(&updates)?;
        info!(
            "Replaced {} string(s) across {} file(s)",
            summary.replacements, summary.files
        );
        Ok(summary)
    }

    fn replace_one(
        &self,
        document_type: Granularity,
        item: &OutputWithAsset,
    ) -> Result<Option<(PathBuf, usize)>, PipelineError> {
        let (source, target) = match (
            &item.output.list_replacement_output_file,
            &item.output.ocr_output_file,
        ) {
            (Some(existing), _) => (existing.clone(), existing.clone()),
            (None, Some(ocr)) => (ocr.clone(), self.target_path(document_type, ocr)),
            (None, None) => return Ok(None),
        };

        let text = fs::read_to_string(&source).map_err(io_at(&source))?;
        let (replaced, count) = self.replacer.replace(&text);

        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).map_err(io_at(dir))?;
        }
        fs::write(&target, replaced).map_err(io_at(&target))?;
        debug!("{} replacement(s) into {}", count, target.display());

        Ok(Some((target, count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_csv_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("names.csv");
        fs::write(&path, "id,name\n1,Jane Doe\n2,\n3,\"Smith, John\"\n").unwrap();
        assert_eq!(
            read_target_strings(&path, "name").unwrap(),
            vec!["Jane Doe".to_string(), "Smith, John".to_string()]
        );
    }

    #[test]
    fn test_read_tsv_for_other_extensions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("names.txt");
        fs::write(&path, "id\tname\n1\tJane, Doe\n").unwrap();
        assert_eq!(
            read_target_strings(&path, "name").unwrap(),
            vec!["Jane, Doe".to_string()]
        );
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("names.csv");
        fs::write(&path, "id,name\n1,Jane\n").unwrap();
        let err = read_target_strings(&path, "surname").unwrap_err();
        assert!(err.to_string().contains("surname"));
    }

    #[test]
    fn test_replace_longest_first() {
        let replacer = StringReplacer::new(
            vec!["Jane".to_string(), "Jane Doe".to_string(), String::new()],
            "<NAME>",
        );
        assert_eq!(replacer.len(), 2);
        let (text, count) = replacer.replace("Jane Doe called; Jane will return.");
        assert_eq!(text, "<NAME> called; <NAME> will return.");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_target_path() {
        let service = ListReplacementService::new(StringReplacer::new(vec![], "X"), "/out");
        assert_eq!(
            service.target_path(Granularity::Page, Path::new("/o/unstructured_text/page/a-1-0.txt")),
            PathBuf::from("/out/list_replacement_output_file/page/a-1-0.txt")
        );
    }
}
