//! Diesel records for the ledger tables.

use std::path::PathBuf;

use diesel::prelude::*;

use super::parse_datetime;
use crate::models::{ExtractionResult, Granularity, SourceAsset, UnitStatus};
use crate::schema;

/// Source asset row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::transcription_input)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct InputRecord {
    pub id: i32,
    pub document_type: String,
    pub input_file: String,
    pub created_at: String,
}

/// New source asset for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::transcription_input)]
pub struct NewInput<'a> {
    pub document_type: &'a str,
    pub input_file: &'a str,
    pub created_at: &'a str,
}

/// Extraction result row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::transcription_output)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OutputRecord {
    pub id: i32,
    pub input_id: i32,
    pub page: i32,
    pub block: i32,
    pub status: String,
    pub ocr_output_file: Option<String>,
    pub ocr_confidence: Option<f64>,
    pub list_replacement_output_file: Option<String>,
    pub pii_scrubber_output_file: Option<String>,
    pub pii_scrubber_confidence_file: Option<String>,
    pub created_at: String,
}

/// New extraction result for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::transcription_output)]
pub struct NewOutput<'a> {
    pub input_id: i32,
    pub page: i32,
    pub block: i32,
    pub status: &'a str,
    pub ocr_output_file: Option<String>,
    pub ocr_confidence: Option<f64>,
    pub list_replacement_output_file: Option<String>,
    pub pii_scrubber_output_file: Option<String>,
    pub pii_scrubber_confidence_file: Option<String>,
    pub created_at: &'a str,
}

/// Metadata row written by discovery.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::transcription_metadata)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MetadataRecord {
    pub id: i32,
    pub input_id: i32,
    pub subject_id: Option<String>,
    pub year_in_study: Option<i32>,
    pub visit_date: Option<String>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::transcription_metadata)]
pub struct NewMetadata<'a> {
    pub input_id: i32,
    pub subject_id: Option<&'a str>,
    pub year_in_study: Option<i32>,
    pub visit_date: Option<&'a str>,
}

fn path_string(path: &Option<PathBuf>) -> Option<String> {
    path.as_ref().map(|p| p.to_string_lossy().into_owned())
}

impl<'a> NewOutput<'a> {
    pub fn from_result(result: &'a ExtractionResult, created_at: &'a str) -> Self {
        Self {
            input_id: result.input_id,
            page: result.page as i32,
            block: result.block as i32,
            status: result.status.as_str(),
            ocr_output_file: path_string(&result.ocr_output_file),
            ocr_confidence: result.ocr_confidence,
            list_replacement_output_file: path_string(&result.list_replacement_output_file),
            pii_scrubber_output_file: path_string(&result.pii_scrubber_output_file),
            pii_scrubber_confidence_file: path_string(&result.pii_scrubber_confidence_file),
            created_at,
        }
    }
}

impl From<InputRecord> for SourceAsset {
    fn from(record: InputRecord) -> Self {
        Self {
            id: record.id,
            document_type: Granularity::from_str(&record.document_type)
                .unwrap_or(Granularity::Document),
            input_file: PathBuf::from(record.input_file),
            created_at: parse_datetime(&record.created_at),
        }
    }
}

impl From<OutputRecord> for ExtractionResult {
    fn from(record: OutputRecord) -> Self {
        Self {
            id: record.id,
            input_id: record.input_id,
            page: record.page.max(0) as u32,
            block: record.block.max(0) as u32,
            status: UnitStatus::from_str(&record.status).unwrap_or(UnitStatus::Error),
            ocr_output_file: record.ocr_output_file.map(PathBuf::from),
            ocr_confidence: record.ocr_confidence,
            list_replacement_output_file: record.list_replacement_output_file.map(PathBuf::from),
            pii_scrubber_output_file: record.pii_scrubber_output_file.map(PathBuf::from),
            pii_scrubber_confidence_file: record.pii_scrubber_confidence_file.map(PathBuf::from),
        }
    }
}
