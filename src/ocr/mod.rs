//! OCR module.
//!
//! Rasterizes PDFs into page images and recognizes text with word-level
//! confidence. Tesseract (driven through its CLI) is the shipped backend;
//! anything implementing [`OcrBackend`] can be plugged into the
//! granularity strategies.

mod backend;
mod tesseract;
pub mod tsv;

pub use backend::{OcrBackend, OcrError, PageImage, PageImages, Recognition, Region};
pub use tesseract::{TesseractBackend, TesseractConfig};
