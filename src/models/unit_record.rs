//! The Unit Record: per-file metadata carried between pipeline stages.
//!
//! A Unit Record is a fixed-field structure restricted to a closed set of
//! keys. It is what gets read from and written to the JSON file maps, so
//! deserialization rejects any key outside the set. Stage code that needs
//! to address fields by name goes through [`UnitRecord::get`] and
//! [`UnitRecord::set`], which fail on unknown keys and (for `get`) on keys
//! that were never set.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{Granularity, UnitStatus};

/// Unit Record schema violations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid data key: {0}")]
    UnknownKey(String),

    #[error("Data key is not set: {0}")]
    Unset(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// The closed set of keys a Unit Record may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitField {
    SubjectId,
    OriginFilepath,
    OriginFilename,
    OriginExt,
    Status,
    Granularity,
    Confidence,
    OutputFilepath,
    OutputFilename,
    OutputExt,
    Page,
    Block,
    ScrubbedOutputFilepath,
    ScrubbedConfidenceFilepath,
}

impl UnitField {
    pub const ALL: [UnitField; 14] = [
        Self::SubjectId,
        Self::OriginFilepath,
        Self::OriginFilename,
        Self::OriginExt,
        Self::Status,
        Self::Granularity,
        Self::Confidence,
        Self::OutputFilepath,
        Self::OutputFilename,
        Self::OutputExt,
        Self::Page,
        Self::Block,
        Self::ScrubbedOutputFilepath,
        Self::ScrubbedConfidenceFilepath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubjectId => "subject_id",
            Self::OriginFilepath => "origin_filepath",
            Self::OriginFilename => "origin_filename",
            Self::OriginExt => "origin_ext",
            Self::Status => "status",
            Self::Granularity => "granularity",
            Self::Confidence => "confidence",
            Self::OutputFilepath => "output_filepath",
            Self::OutputFilename => "output_filename",
            Self::OutputExt => "output_ext",
            Self::Page => "page",
            Self::Block => "block",
            Self::ScrubbedOutputFilepath => "scrubbed_output_filepath",
            Self::ScrubbedConfidenceFilepath => "scrubbed_confidence_filepath",
        }
    }
}

impl FromStr for UnitField {
    type Err = ValidationError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == key)
            .ok_or_else(|| ValidationError::UnknownKey(key.to_string()))
    }
}

impl fmt::Display for UnitField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-file metadata flowing through the pipeline.
///
/// Only fields that are set are serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UnitRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_filepath: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_ext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UnitStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<Granularity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_filepath: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_ext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrubbed_output_filepath: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrubbed_confidence_filepath: Option<String>,
}

impl UnitRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record describing a source file.
    pub fn from_origin(path: impl AsRef<Path>) -> Self {
        let mut record = Self::default();
        record.set_origin_file(path);
        record
    }

    /// Read a field by key.
    pub fn get(&self, key: &str) -> Result<Value, ValidationError> {
        let field: UnitField = key.parse()?;
        self.value_of(field)
            .ok_or(ValidationError::Unset(field.as_str()))
    }

    /// Write a field by key. The value must deserialize into the field's type.
    pub fn set(&mut self, key: &str, value: Value) -> Result<&mut Self, ValidationError> {
        let field: UnitField = key.parse()?;
        match field {
            UnitField::SubjectId => self.subject_id = Some(convert(field, value)?),
            UnitField::OriginFilepath => self.origin_filepath = Some(convert(field, value)?),
            UnitField::OriginFilename => self.origin_filename = Some(convert(field, value)?),
            UnitField::OriginExt => self.origin_ext = Some(convert(field, value)?),
            UnitField::Status => self.status = Some(convert(field, value)?),
            UnitField::Granularity => self.granularity = Some(convert(field, value)?),
            UnitField::Confidence => self.confidence = Some(convert(field, value)?),
            UnitField::OutputFilepath => self.output_filepath = Some(convert(field, value)?),
            UnitField::OutputFilename => self.output_filename = Some(convert(field, value)?),
            UnitField::OutputExt => self.output_ext = Some(convert(field, value)?),
            UnitField::Page => self.page = Some(convert(field, value)?),
            UnitField::Block => self.block = Some(convert(field, value)?),
            UnitField::ScrubbedOutputFilepath => {
                self.scrubbed_output_filepath = Some(convert(field, value)?)
            }
            UnitField::ScrubbedConfidenceFilepath => {
                self.scrubbed_confidence_filepath = Some(convert(field, value)?)
            }
        }
        Ok(self)
    }

    /// Whether a field currently holds a value.
    pub fn is_set(&self, field: UnitField) -> bool {
        self.value_of(field).is_some()
    }

    /// Fields that currently hold a value, in schema order.
    pub fn set_fields(&self) -> Vec<UnitField> {
        UnitField::ALL
            .into_iter()
            .filter(|field| self.is_set(*field))
            .collect()
    }

    /// Set `origin_filepath`, `origin_filename` and `origin_ext` from a path.
    pub fn set_origin_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        let (filepath, filename, ext) = file_parts(path.as_ref());
        self.origin_filepath = Some(filepath);
        self.origin_filename = Some(filename);
        self.origin_ext = Some(ext);
        self
    }

    /// Set `output_filepath`, `output_filename` and `output_ext` from a path.
    pub fn set_output_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        let (filepath, filename, ext) = file_parts(path.as_ref());
        self.output_filepath = Some(filepath);
        self.output_filename = Some(filename);
        self.output_ext = Some(ext);
        self
    }

    /// Origin filename without its extension.
    pub fn origin_stem(&self) -> Result<String, ValidationError> {
        let filename = self
            .origin_filename
            .as_deref()
            .ok_or(ValidationError::Unset("origin_filename"))?;
        Ok(Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string()))
    }

    /// Derive the record for one extracted unit of this source file.
    ///
    /// Carries the subject and origin fields over; everything produced by
    /// OCR starts unset.
    pub fn for_unit(&self, granularity: Granularity, page: u32, block: u32) -> Self {
        Self {
            subject_id: self.subject_id.clone(),
            origin_filepath: self.origin_filepath.clone(),
            origin_filename: self.origin_filename.clone(),
            origin_ext: self.origin_ext.clone(),
            granularity: Some(granularity),
            page: Some(page),
            block: Some(block),
            ..Self::default()
        }
    }

    fn value_of(&self, field: UnitField) -> Option<Value> {
        match field {
            UnitField::SubjectId => to_json(&self.subject_id),
            UnitField::OriginFilepath => to_json(&self.origin_filepath),
            UnitField::OriginFilename => to_json(&self.origin_filename),
            UnitField::OriginExt => to_json(&self.origin_ext),
            UnitField::Status => to_json(&self.status),
            UnitField::Granularity => to_json(&self.granularity),
            UnitField::Confidence => to_json(&self.confidence),
            UnitField::OutputFilepath => to_json(&self.output_filepath),
            UnitField::OutputFilename => to_json(&self.output_filename),
            UnitField::OutputExt => to_json(&self.output_ext),
            UnitField::Page => to_json(&self.page),
            UnitField::Block => to_json(&self.block),
            UnitField::ScrubbedOutputFilepath => to_json(&self.scrubbed_output_filepath),
            UnitField::ScrubbedConfidenceFilepath => to_json(&self.scrubbed_confidence_filepath),
        }
    }
}

fn to_json<T: Serialize>(value: &Option<T>) -> Option<Value> {
    value.as_ref().and_then(|v| serde_json::to_value(v).ok())
}

fn convert<T: DeserializeOwned>(field: UnitField, value: Value) -> Result<T, ValidationError> {
    serde_json::from_value(value).map_err(|e| ValidationError::InvalidValue {
        key: field.as_str(),
        reason: e.to_string(),
    })
}

/// Split a path into (full path, file name, extension without the dot).
fn file_parts(path: &Path) -> (String, String, String) {
    let filepath = path.to_string_lossy().into_owned();
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    (filepath, filename, ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get_known_keys() {
        let mut record = UnitRecord::new();
        record
            .set("subject_id", json!("094-000123"))
            .unwrap()
            .set("confidence", json!(87.5))
            .unwrap()
            .set("status", json!("file-empty"))
            .unwrap();

        assert_eq!(record.get("subject_id").unwrap(), json!("094-000123"));
        assert_eq!(record.get("confidence").unwrap(), json!(87.5));
        assert_eq!(record.status, Some(UnitStatus::FileEmpty));
    }

    #[test]
    fn test_unknown_key_rejected_both_ways() {
        let mut record = UnitRecord::new();
        assert_eq!(
            record.set("dog_id", json!("x")).unwrap_err(),
            ValidationError::UnknownKey("dog_id".to_string())
        );
        assert_eq!(
            record.get("dog_id").unwrap_err(),
            ValidationError::UnknownKey("dog_id".to_string())
        );
    }

    #[test]
    fn test_get_unset_key_fails() {
        let record = UnitRecord::new();
        assert_eq!(
            record.get("page").unwrap_err(),
            ValidationError::Unset("page")
        );
    }

    #[test]
    fn test_set_rejects_mistyped_value() {
        let mut record = UnitRecord::new();
        let err = record.set("page", json!("one")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { key: "page", .. }));
        assert!(!record.is_set(UnitField::Page));
    }

    #[test]
    fn test_deserialize_rejects_unknown_keys() {
        let err = serde_json::from_str::<UnitRecord>(
            r#"{"origin_filepath": "/a.pdf", "enrollment_status": "withdrawn"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("enrollment_status"));
    }

    #[test]
    fn test_json_round_trip_keeps_only_set_keys() {
        let mut record = UnitRecord::from_origin("/records/094-000123/visit.pdf");
        record.subject_id = Some("094-000123".to_string());
        record.page = Some(2);
        record.confidence = Some(90.0);

        let json = serde_json::to_value(&record).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys.len(), 6);
        assert!(!keys.contains(&"block"));

        let back: UnitRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.set_fields(), record.set_fields());
    }

    #[test]
    fn test_origin_and_output_file_parts() {
        let mut record = UnitRecord::from_origin("/records/094-000123/Visit Notes.pdf");
        assert_eq!(record.origin_filename.as_deref(), Some("Visit Notes.pdf"));
        assert_eq!(record.origin_ext.as_deref(), Some("pdf"));
        assert_eq!(record.origin_stem().unwrap(), "Visit Notes");

        record.set_output_file("/out/unstructured_text/page/Visit Notes-1-0.txt");
        assert_eq!(record.output_filename.as_deref(), Some("Visit Notes-1-0.txt"));
        assert_eq!(record.output_ext.as_deref(), Some("txt"));

        let bare = UnitRecord::from_origin("/records/README");
        assert_eq!(bare.origin_ext.as_deref(), Some(""));
    }

    #[test]
    fn test_for_unit_carries_origin_only() {
        let mut record = UnitRecord::from_origin("/records/a.pdf");
        record.subject_id = Some("094-000001".to_string());
        record.status = Some(UnitStatus::Processed);
        record.confidence = Some(50.0);

        let unit = record.for_unit(Granularity::Block, 3, 7);
        assert_eq!(unit.subject_id, record.subject_id);
        assert_eq!(unit.origin_filepath, record.origin_filepath);
        assert_eq!(unit.page, Some(3));
        assert_eq!(unit.block, Some(7));
        assert_eq!(unit.granularity, Some(Granularity::Block));
        assert!(unit.status.is_none());
        assert!(unit.confidence.is_none());
    }
}
