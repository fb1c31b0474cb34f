//! OCR backend abstraction.
//!
//! A backend turns a PDF into page images and recognizes text on a page or
//! on a rectangular region of a page. Granularity strategies only talk to
//! this trait, so tests can drive them with a scripted backend.

use std::path::{Path, PathBuf};
use std::vec;

use tempfile::TempDir;
use thiserror::Error;

/// Errors that can occur during rasterization or recognition.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The source file is unreadable or corrupt; no page can be produced.
    #[error("Conversion failed for {path}: {reason}")]
    Conversion { path: PathBuf, reason: String },

    /// A single page or region could not be recognized.
    #[error("Recognition failed on page {page}: {reason}")]
    Recognition { page: u32, reason: String },

    #[error("OCR backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcrError {
    pub fn conversion(path: &Path, reason: impl Into<String>) -> Self {
        Self::Conversion {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn recognition(page: u32, reason: impl Into<String>) -> Self {
        Self::Recognition {
            page,
            reason: reason.into(),
        }
    }
}

/// Pixel rectangle on a page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One rasterized page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    /// 1-based page number.
    pub number: u32,
    pub path: PathBuf,
}

/// Ordered, single-pass sequence of page images.
///
/// Owns the scratch directory the images live in, so the files are removed
/// once the sequence is dropped.
#[derive(Debug)]
pub struct PageImages {
    pages: vec::IntoIter<PageImage>,
    _scratch: Option<TempDir>,
}

impl PageImages {
    /// Pages whose files are managed elsewhere.
    pub fn new(pages: Vec<PageImage>) -> Self {
        Self {
            pages: pages.into_iter(),
            _scratch: None,
        }
    }

    /// Pages living in a scratch directory that is removed on drop.
    pub fn in_scratch(scratch: TempDir, pages: Vec<PageImage>) -> Self {
        Self {
            pages: pages.into_iter(),
            _scratch: Some(scratch),
        }
    }
}

impl Iterator for PageImages {
    type Item = PageImage;

    fn next(&mut self) -> Option<Self::Item> {
        self.pages.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pages.size_hint()
    }
}

impl ExactSizeIterator for PageImages {}

/// Recognized text and its mean confidence (0-100).
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub text: String,
    pub confidence: f64,
}

impl Recognition {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    /// Whether the result carries usable text. A confidence of zero or
    /// below means nothing was read, even if the engine emitted characters.
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty() && self.confidence > 0.0
    }
}

/// Trait for OCR backends.
pub trait OcrBackend {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether the external tools the backend needs are installed.
    fn is_available(&self) -> bool;

    /// Rasterize every page of a PDF, in page order.
    fn rasterize(&self, pdf: &Path) -> Result<PageImages, OcrError>;

    /// Recognize text on a page, or on one region of it.
    fn recognize(&self, image: &PageImage, region: Option<Region>)
        -> Result<Recognition, OcrError>;

    /// Text-line layout of a page, in reading order.
    fn segment_lines(&self, image: &PageImage) -> Result<Vec<Region>, OcrError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_content_requires_text_and_positive_confidence() {
        assert!(Recognition::new("Patient seen", 91.0).has_content());
        assert!(!Recognition::new("", 91.0).has_content());
        assert!(!Recognition::new("  \n", 91.0).has_content());
        assert!(!Recognition::new("noise", 0.0).has_content());
        assert!(!Recognition::new("noise", -1.0).has_content());
    }

    #[test]
    fn test_page_images_removes_scratch_on_drop() {
        let scratch = TempDir::new().unwrap();
        let dir = scratch.path().to_path_buf();
        let page = dir.join("page-1.png");
        std::fs::write(&page, b"png").unwrap();

        let mut pages = PageImages::in_scratch(
            scratch,
            vec![PageImage {
                number: 1,
                path: page,
            }],
        );
        assert_eq!(pages.len(), 1);
        assert_eq!(pages.next().map(|p| p.number), Some(1));
        assert!(pages.next().is_none());
        assert!(dir.exists());

        drop(pages);
        assert!(!dir.exists());
    }
}
