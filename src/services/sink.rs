//! Output sink for recognized text.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{io_at, PipelineError};
use crate::models::{Granularity, UnitRecord, ValidationError};

/// Writes text units under `<output_root>/unstructured_text/<granularity>/`.
#[derive(Debug, Clone)]
pub struct OutputSink {
    output_root: PathBuf,
}

impl OutputSink {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn granularity_dir(&self, granularity: Granularity) -> PathBuf {
        self.output_root
            .join("unstructured_text")
            .join(granularity.as_str())
    }

    /// `<stem>-<page>-<block>.txt` in the granularity directory.
    pub fn unit_path(&self, granularity: Granularity, stem: &str, page: u32, block: u32) -> PathBuf {
        self.granularity_dir(granularity)
            .join(format!("{}-{}-{}.txt", stem, page, block))
    }

    /// Write `text` for the unit described by `record` and record the
    /// output path on it. Empty text writes nothing and returns `None`.
    /// Existing files are overwritten.
    pub fn write(
        &self,
        granularity: Granularity,
        record: &mut UnitRecord,
        text: &str,
    ) -> Result<Option<PathBuf>, PipelineError> {
        if text.is_empty() {
            return Ok(None);
        }

        let stem = record.origin_stem()?;
        let page = record.page.ok_or(ValidationError::Unset("page"))?;
        let block = record.block.ok_or(ValidationError::Unset("block"))?;

        let dir = self.granularity_dir(granularity);
        fs::create_dir_all(&dir).map_err(io_at(&dir))?;

        let path = self.unit_path(granularity, &stem, page, block);
        fs::write(&path, text).map_err(io_at(&path))?;
        debug!("Wrote {} bytes to {}", text.len(), path.display());

        record.set_output_file(&path);
        Ok(Some(path))
    }
}
