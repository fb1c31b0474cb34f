//! recordscribe - resumable OCR transcription for scanned medical records.
//!
//! Converts archives of scanned PDFs into text at a chosen granularity
//! (whole document, page, or text line block), records per-unit confidence
//! in a SQLite ledger, and chains optional PII scrubbing and list
//! replacement stages over the results.

pub mod config;
pub mod discovery;
pub mod error;
pub mod models;
pub mod ocr;
pub mod repository;
pub mod schema;
pub mod services;

pub use error::PipelineError;
