//! PII scrubbing of OCR text.
//!
//! A [`Redactor`] finds entity spans and replaces them with `<TYPE>`
//! placeholders. The scrubbed text and a JSON report of what was removed
//! are written next to each other under
//! `<output_root>/scrubbed_text/<tag>/`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ScrubConfig;
use crate::error::{io_at, PipelineError};
use crate::models::{Granularity, Window};
use crate::repository::{LedgerSession, ScrubUpdate};

/// A detected entity. Offsets are character positions in the input text.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySpan {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub score: f64,
    pub text: String,
}

/// Redacted text and the spans that were replaced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Redaction {
    pub text: String,
    pub spans: Vec<EntitySpan>,
}

/// Something that can find and redact PII.
pub trait Redactor {
    /// Redact every entity scoring at least `threshold`.
    fn redact(&self, text: &str, threshold: f64) -> Redaction;
}

/// (entity type, pattern, score)
static PATTERNS: LazyLock<Vec<(&'static str, Regex, f64)>> = LazyLock::new(|| {
    vec![
        (
            "EMAIL_ADDRESS",
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
            1.0,
        ),
        (
            "URL",
            Regex::new(r#"\b(?:https?://|www\.)[^\s<>"]+"#).unwrap(),
            0.6,
        ),
        (
            "US_SSN",
            Regex::new(r"\b[0-9]{3}-[0-9]{2}-[0-9]{4}\b").unwrap(),
            0.85,
        ),
        (
            "PHONE_NUMBER",
            Regex::new(
                r"(?:\+1[-.\s]?)?(?:\([0-9]{3}\)\s?|\b[0-9]{3}[-.\s])[0-9]{3}[-.\s][0-9]{4}\b",
            )
            .unwrap(),
            0.75,
        ),
        (
            "DATE_TIME",
            Regex::new(
                r"(?i)\b(?:[0-9]{1,2}[/-][0-9]{1,2}[/-](?:[0-9]{4}|[0-9]{2})|[0-9]{4}-[0-9]{2}-[0-9]{2}|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+[0-9]{1,2},?\s+[0-9]{4})\b",
            )
            .unwrap(),
            0.6,
        ),
    ]
});

/// Regex-based redactor for common structured identifiers.
#[derive(Debug, Clone, Default)]
pub struct PatternRedactor {
    excluded: HashSet<String>,
}

impl PatternRedactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ScrubConfig) -> Self {
        Self::with_excluded(config.exclude_types.iter().cloned())
    }

    pub fn with_excluded(types: impl IntoIterator<Item = String>) -> Self {
        Self {
            excluded: types.into_iter().collect(),
        }
    }

    /// Candidate byte ranges that survive the threshold and exclusions,
    /// with overlaps resolved in favor of the higher score (then the
    /// earlier, then the longer span).
    fn select_spans(&self, text: &str, threshold: f64) -> Vec<(usize, usize, &'static str, f64)> {
        let mut candidates: Vec<(usize, usize, &'static str, f64)> = PATTERNS
            .iter()
            .filter(|(kind, _, score)| *score >= threshold && !self.excluded.contains(*kind))
            .flat_map(|(kind, re, score)| {
                re.find_iter(text)
                    .map(move |m| (m.start(), m.end(), *kind, *score))
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.3.total_cmp(&a.3)
                .then(a.0.cmp(&b.0))
                .then((b.1 - b.0).cmp(&(a.1 - a.0)))
        });

        let mut kept: Vec<(usize, usize, &'static str, f64)> = Vec::new();
        for candidate in candidates {
            let overlaps = kept
                .iter()
                .any(|k| candidate.0 < k.1 && k.0 < candidate.1);
            if !overlaps {
                kept.push(candidate);
            }
        }
        kept.sort_by_key(|k| k.0);
        kept
    }
}

impl Redactor for PatternRedactor {
    fn redact(&self, text: &str, threshold: f64) -> Redaction {
        let mut out = String::with_capacity(text.len());
        let mut spans = Vec::new();
        let mut cursor = 0;

        for (start, end, kind, score) in self.select_spans(text, threshold) {
            out.push_str(&text[cursor..start]);
            out.push('<');
            out.push_str(kind);
            out.push('>');
            spans.push(EntitySpan {
                entity_type: kind.to_string(),
                start: text[..start].chars().count(),
                end: text[..end].chars().count(),
                score,
                text: text[start..end].to_string(),
            });
            cursor = end;
        }
        out.push_str(&text[cursor..]);

        Redaction { text: out, spans }
    }
}

/// One entry of the JSON confidence report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRecord {
    #[serde(rename = "Original Text")]
    pub original_text: String,
    #[serde(rename = "Type")]
    pub entity_type: String,
    #[serde(rename = "Start")]
    pub start: usize,
    #[serde(rename = "End")]
    pub end: usize,
    #[serde(rename = "Score")]
    pub score: f64,
}

impl From<&EntitySpan> for ConfidenceRecord {
    fn from(span: &EntitySpan) -> Self {
        Self {
            original_text: span.text.replace(['\n', '\r'], ""),
            entity_type: span.entity_type.clone(),
            start: span.start,
            end: span.end,
            score: span.score,
        }
    }
}

/// Files written for one scrubbed unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrubbedFiles {
    pub text_file: PathBuf,
    pub confidence_file: PathBuf,
    pub entities: usize,
}

/// Writes scrubbed text and reports for one tag (granularity).
#[derive(Debug, Clone)]
pub struct ScrubSink {
    base: PathBuf,
    tag: String,
}

impl ScrubSink {
    pub fn new(output_root: &Path, tag: &str) -> Self {
        Self {
            base: output_root.join("scrubbed_text").join(tag),
            tag: tag.to_string(),
        }
    }

    pub fn text_path(&self, stem: &str) -> PathBuf {
        self.base
            .join(format!("scrubbed_{}", self.tag))
            .join(format!("{}.txt", stem))
    }

    pub fn confidence_path(&self, stem: &str) -> PathBuf {
        self.base
            .join("scrubbed_confidence")
            .join(format!("confidence-{}.json", stem))
    }

    pub fn write(&self, stem: &str, redaction: &Redaction) -> Result<ScrubbedFiles, PipelineError> {
        let text_file = self.text_path(stem);
        let confidence_file = self.confidence_path(stem);

        for path in [&text_file, &confidence_file] {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).map_err(io_at(dir))?;
            }
        }

        fs::write(&text_file, &redaction.text).map_err(io_at(&text_file))?;

        let report: Vec<ConfidenceRecord> =
            redaction.spans.iter().map(ConfidenceRecord::from).collect();
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| PipelineError::Input(format!("cannot encode scrub report: {}", e)))?;
        fs::write(&confidence_file, json).map_err(io_at(&confidence_file))?;

        debug!(
            "Scrubbed {} entities into {}",
            report.len(),
            text_file.display()
        );
        Ok(ScrubbedFiles {
            text_file,
            confidence_file,
            entities: report.len(),
        })
    }
}

/// Redact a text file and write the scrub outputs for it.
pub fn scrub_file(
    redactor: &dyn Redactor,
    threshold: f64,
    sink: &ScrubSink,
    source: &Path,
) -> Result<ScrubbedFiles, PipelineError> {
    let text = fs::read_to_string(source).map_err(io_at(source))?;
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| PipelineError::Input(format!("no file name in {}", source.display())))?;
    sink.write(&stem, &redactor.redact(&text, threshold))
}

/// Counts for one scrub window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrubSummary {
    pub scrubbed: usize,
    pub failed: usize,
    pub entities: usize,
}

/// Scrubs ledger outputs that have not been scrubbed yet.
pub struct ScrubService<'a> {
    redactor: &'a dyn Redactor,
    threshold: f64,
    output_root: PathBuf,
}

impl<'a> ScrubService<'a> {
    pub fn new(redactor: &'a dyn Redactor, threshold: f64, output_root: impl Into<PathBuf>) -> Self {
        Self {
            redactor,
            threshold,
            output_root: output_root.into(),
        }
    }

    /// Scrub one window. Reads the list replacement output when there is
    /// one, otherwise the OCR output. Unreadable files are logged and left
    /// for the next run; all updates commit together.
    pub fn run_window(
        &self,
        ledger: &mut LedgerSession,
        document_type: Granularity,
        window: Window,
    ) -> Result<ScrubSummary, PipelineError> {
        let todo = ledger.outputs_needing_scrub(document_type, window)?;
        let sink = ScrubSink::new(&self.output_root, document_type.as_str());
        let mut summary = ScrubSummary::default();
        let mut updates = Vec::new();

        for item in &todo {
            let Some(source) = item.output.current_text_file() else {
                continue;
            };
            match scrub_file(self.redactor, self.threshold, &sink, source) {
                Ok(files) => {
                    summary.scrubbed += 1;
                    summary.entities += files.entities;
                    updates.push(ScrubUpdate {
                        output_id: item.output.id,
                        scrubbed_file: files.text_file,
                        confidence_file: files.confidence_file,
                    });
                }
                Err(e) => {
                    warn!("Failed to scrub {}: {}", source.display(), e);
                    summary.failed += 1;
                }
            }
        }

        ledger.record_scrub_outputs(&updates)?;
        info!(
            "Scrubbed {} output(s), {} entities redacted",
            summary.scrubbed, summary.entities
        );
        Ok(summary)
    }
}
