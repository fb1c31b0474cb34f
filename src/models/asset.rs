//! Ledger-backed models: source assets and the text units extracted from them.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The unit at which OCR output is reported.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One unit per source file, pages concatenated.
    #[serde(alias = "doc")]
    #[value(alias = "doc")]
    Document,
    /// One unit per page.
    Page,
    /// One unit per detected text line.
    Block,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Page => "page",
            Self::Block => "block",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "document" | "doc" => Some(Self::Document),
            "page" => Some(Self::Page),
            "block" => Some(Self::Block),
            _ => None,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing status of a unit record or extraction result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitStatus {
    /// OCR ran; the unit may still be blank.
    Processed,
    /// OCR failed for this unit.
    Error,
    /// Not a PDF.
    Skipped,
    FileNotFound,
    FileEmpty,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Error => "error",
            Self::Skipped => "skipped",
            Self::FileNotFound => "file-not-found",
            Self::FileEmpty => "file-empty",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "processed" => Some(Self::Processed),
            "error" => Some(Self::Error),
            "skipped" => Some(Self::Skipped),
            "file-not-found" => Some(Self::FileNotFound),
            "file-empty" => Some(Self::FileEmpty),
            _ => None,
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical input file registered in the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceAsset {
    /// Database row ID.
    pub id: i32,
    /// Requested granularity for this asset.
    pub document_type: Granularity,
    /// Absolute path of the source file.
    pub input_file: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// One produced text unit, tracked in the ledger.
///
/// At most one result with a non-null `ocr_output_file` exists per
/// (asset, page, block). Downstream stages only fill in their own path
/// columns and never touch the OCR fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    /// Database row ID (0 until persisted).
    pub id: i32,
    /// Owning source asset.
    pub input_id: i32,
    pub page: u32,
    pub block: u32,
    pub status: UnitStatus,
    /// Text artifact, absent for blank or failed units.
    pub ocr_output_file: Option<PathBuf>,
    /// Mean text confidence (0-100), absent for failed units.
    pub ocr_confidence: Option<f64>,
    pub list_replacement_output_file: Option<PathBuf>,
    pub pii_scrubber_output_file: Option<PathBuf>,
    pub pii_scrubber_confidence_file: Option<PathBuf>,
}

impl ExtractionResult {
    /// Create an unsaved result for a unit of the given asset.
    pub fn new(input_id: i32, page: u32, block: u32, status: UnitStatus) -> Self {
        Self {
            id: 0,
            input_id,
            page,
            block,
            status,
            ocr_output_file: None,
            ocr_confidence: None,
            list_replacement_output_file: None,
            pii_scrubber_output_file: None,
            pii_scrubber_confidence_file: None,
        }
    }

    /// The file downstream text stages should read: the list replacement
    /// output when present, otherwise the OCR output.
    pub fn current_text_file(&self) -> Option<&PathBuf> {
        self.list_replacement_output_file
            .as_ref()
            .or(self.ocr_output_file.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granularity_accepts_doc_alias() {
        assert_eq!(Granularity::from_str("doc"), Some(Granularity::Document));
        assert_eq!(Granularity::from_str("page"), Some(Granularity::Page));
        assert_eq!(Granularity::from_str("line"), None);

        let parsed: Granularity = serde_json::from_str("\"doc\"").unwrap();
        assert_eq!(parsed, Granularity::Document);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"document\"");
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            UnitStatus::Processed,
            UnitStatus::Error,
            UnitStatus::Skipped,
            UnitStatus::FileNotFound,
            UnitStatus::FileEmpty,
        ] {
            assert_eq!(UnitStatus::from_str(status.as_str()), Some(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_current_text_file_prefers_replacement() {
        let mut result = ExtractionResult::new(1, 1, 0, UnitStatus::Processed);
        assert!(result.current_text_file().is_none());

        result.ocr_output_file = Some(PathBuf::from("/out/a-1-0.txt"));
        assert_eq!(
            result.current_text_file(),
            Some(&PathBuf::from("/out/a-1-0.txt"))
        );

        result.list_replacement_output_file = Some(PathBuf::from("/out/r/a-1-0.txt"));
        assert_eq!(
            result.current_text_file(),
            Some(&PathBuf::from("/out/r/a-1-0.txt"))
        );
    }
}
