//! Source file discovery.
//!
//! Walks a records tree and picks up every file sitting below a directory
//! whose path contains a subject ID. The result feeds either a JSON file
//! map (`scan`) or the ledger (`register`).

use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::PipelineError;
use crate::models::UnitRecord;
use crate::repository::AssetRegistration;

/// A file found under a subject directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub subject_id: String,
}

impl DiscoveredFile {
    pub fn to_unit_record(&self) -> UnitRecord {
        let mut record = UnitRecord::from_origin(&self.path);
        record.subject_id = Some(self.subject_id.clone());
        record
    }

    pub fn to_registration(&self) -> AssetRegistration {
        AssetRegistration {
            input_file: self.path.clone(),
            subject_id: Some(self.subject_id.clone()),
        }
    }
}

/// Subject-ID aware directory scanner.
#[derive(Debug, Clone)]
pub struct Discovery {
    pattern: Regex,
}

impl Discovery {
    /// `pattern` is matched against directory paths; its first capture
    /// group (or the whole match when it has none) is the subject ID.
    pub fn new(pattern: &str) -> Result<Self, PipelineError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| PipelineError::Input(format!("invalid subject ID pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Subject ID from the directory part of a path. The innermost match wins.
    pub fn subject_id(&self, dir: &Path) -> Option<String> {
        let dir = dir.to_string_lossy();
        self.pattern.captures_iter(&dir).last().and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.as_str().to_string())
        })
    }

    /// All files under `root` whose parent directory carries a subject ID,
    /// in sorted path order.
    pub fn scan(&self, root: &Path) -> Result<Vec<DiscoveredFile>, PipelineError> {
        if !root.is_dir() {
            return Err(PipelineError::Io {
                path: root.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "not a directory"),
            });
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(subject_id) = path.parent().and_then(|dir| self.subject_id(dir)) else {
                continue;
            };
            debug!("Found {} for subject {}", path.display(), subject_id);
            found.push(DiscoveredFile {
                path: path.to_path_buf(),
                subject_id,
            });
        }

        Ok(found)
    }
}
