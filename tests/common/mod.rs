//! Shared fixtures for the pipeline integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use recordscribe::ocr::{OcrBackend, OcrError, PageImage, PageImages, Recognition, Region};
use recordscribe::repository::LedgerSession;

/// Backend answering every PDF with the same scripted pages.
///
/// Each page lists its text lines; page recognition joins them and
/// averages their confidences, region recognition returns line `x`.
pub struct ScriptedBackend {
    pages: Vec<Vec<(&'static str, f64)>>,
    failing_page: Option<u32>,
    pub rasterize_calls: Cell<usize>,
    pub recognize_calls: Cell<usize>,
}

impl ScriptedBackend {
    pub fn new(pages: Vec<Vec<(&'static str, f64)>>) -> Self {
        Self {
            pages,
            failing_page: None,
            rasterize_calls: Cell::new(0),
            recognize_calls: Cell::new(0),
        }
    }

    /// Page recognition of `number` fails with a recognition error.
    pub fn failing_on(mut self, number: u32) -> Self {
        self.failing_page = Some(number);
        self
    }

    /// One line per page.
    pub fn single_lines(pages: &[(&'static str, f64)]) -> Self {
        Self::new(pages.iter().map(|p| vec![*p]).collect())
    }
}

impl OcrBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn rasterize(&self, pdf: &Path) -> Result<PageImages, OcrError> {
        self.rasterize_calls.set(self.rasterize_calls.get() + 1);
        if fs::read(pdf)?.starts_with(b"garbage") {
            return Err(OcrError::conversion(pdf, "not a PDF"));
        }
        Ok(PageImages::new(
            (1..=self.pages.len() as u32)
                .map(|number| PageImage {
                    number,
                    path: PathBuf::from(format!("page-{}.png", number)),
                })
                .collect(),
        ))
    }

    fn recognize(&self, image: &PageImage, region: Option<Region>) -> Result<Recognition, OcrError> {
        self.recognize_calls.set(self.recognize_calls.get() + 1);
        if self.failing_page == Some(image.number) {
            return Err(OcrError::recognition(image.number, "engine crashed"));
        }
        let lines = &self.pages[image.number as usize - 1];
        match region {
            Some(r) => {
                let (text, conf) = lines[r.x as usize];
                Ok(Recognition::new(text, conf))
            }
            None => {
                let text = lines.iter().map(|(t, _)| *t).collect::<Vec<_>>().join("\n");
                let conf = lines.iter().map(|(_, c)| c).sum::<f64>() / lines.len() as f64;
                Ok(Recognition::new(text, conf))
            }
        }
    }

    fn segment_lines(&self, image: &PageImage) -> Result<Vec<Region>, OcrError> {
        let lines = &self.pages[image.number as usize - 1];
        Ok((0..lines.len() as u32)
            .map(|i| Region::new(i, 0, 100, 20))
            .collect())
    }
}

/// Write a placeholder PDF under `<root>/094-000123/`.
pub fn write_pdf(root: &Path, name: &str) -> PathBuf {
    write_file(root, name, b"%PDF-1.4 scripted")
}

pub fn write_file(root: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let dir = root.join("094-000123");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

pub fn ledger_url(dir: &TempDir) -> String {
    format!("sqlite:{}", dir.path().join("ledger.db").display())
}

/// Fresh ledger with the schema installed.
pub fn ledger(dir: &TempDir) -> LedgerSession {
    let mut ledger = LedgerSession::open(&ledger_url(dir)).unwrap();
    ledger.install_schema().unwrap();
    ledger
}
