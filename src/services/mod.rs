//! Service layer for recordscribe pipeline logic.
//!
//! Services hold no UI code; progress is reported through events so the
//! CLI can render it however it likes.

pub mod events;
pub mod filemap;
pub mod replace;
pub mod report;
pub mod scrub;
pub mod sink;
pub mod strategy;
pub mod transcribe;

pub use events::{BatchEvent, BatchSummary};
pub use filemap::{load_file_map, results_path, write_results, FileMapRunner, ScrubStage};
pub use replace::{read_target_strings, ListReplacementService, ReplacementSummary, StringReplacer};
pub use report::{build_report, ConfidenceReport, BIN_LABELS};
pub use scrub::{
    ConfidenceRecord, EntitySpan, PatternRedactor, Redaction, Redactor, ScrubService, ScrubSink,
    ScrubSummary,
};
pub use sink::OutputSink;
pub use strategy::ExtractedUnit;
pub use transcribe::{preflight, TranscriptionService};
