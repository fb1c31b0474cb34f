//! Tesseract OCR backend.
//!
//! Uses `pdftoppm` (Poppler) to rasterize PDFs and the `tesseract` CLI in
//! TSV mode for recognition, so word confidences are available. Every
//! recognition call spawns its own tesseract process.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::debug;

use super::backend::{OcrBackend, OcrError, PageImage, PageImages, Recognition, Region};
use super::tsv;

/// Tesseract settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Language code(s) passed to `-l`, e.g. "eng" or "eng+spa".
    pub language: String,
    /// Optional tessdata directory.
    pub tessdata_dir: Option<PathBuf>,
    /// Rasterization resolution.
    pub dpi: u32,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            tessdata_dir: None,
            dpi: 300,
        }
    }
}

/// Map a finished command to its stdout, or to the error `on_failure` builds
/// from stderr.
fn handle_cmd_output(
    result: std::io::Result<Output>,
    tool_name: &str,
    on_failure: impl FnOnce(String) -> OcrError,
) -> Result<String, OcrError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(on_failure(stderr.trim().to_string()))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
            OcrError::BackendNotAvailable(format!("{} not found in PATH", tool_name)),
        ),
        Err(e) => Err(OcrError::Io(e)),
    }
}

/// Page number from a pdftoppm output name such as `page-07.png`.
fn page_number(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("page-")?.parse().ok()
}

/// Tesseract OCR backend.
#[derive(Debug, Clone, Default)]
pub struct TesseractBackend {
    config: TesseractConfig,
}

impl TesseractBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TesseractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }

    /// Human-readable hint about missing tools.
    pub fn availability_hint(&self) -> String {
        if which::which("tesseract").is_err() {
            "Tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        } else if which::which("pdftoppm").is_err() {
            "pdftoppm not installed. Install with: apt install poppler-utils".to_string()
        } else {
            "Tesseract is available".to_string()
        }
    }

    /// Run tesseract in TSV mode on an image file.
    fn run_tsv(&self, image_path: &Path, page: u32) -> Result<String, OcrError> {
        let dpi = self.config.dpi.to_string();
        let mut cmd = Command::new("tesseract");
        cmd.arg(image_path)
            .arg("stdout")
            .args(["-l", &self.config.language]);
        if let Some(ref dir) = self.config.tessdata_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.args(["--dpi", &dpi, "tsv"]);

        debug!("Running tesseract on {} (page {})", image_path.display(), page);
        handle_cmd_output(cmd.output(), "tesseract", |stderr| {
            OcrError::recognition(page, format!("tesseract failed: {}", stderr))
        })
    }

    /// Crop a region of a page into its own image file.
    fn crop(
        &self,
        image: &PageImage,
        region: Region,
        scratch: &TempDir,
    ) -> Result<PathBuf, OcrError> {
        let page = image::open(&image.path).map_err(|e| {
            OcrError::recognition(image.number, format!("cannot open page image: {}", e))
        })?;
        let cropped = page.crop_imm(region.x, region.y, region.width, region.height);
        let out = scratch.path().join("region.png");
        cropped.save(&out).map_err(|e| {
            OcrError::recognition(image.number, format!("cannot write region image: {}", e))
        })?;
        Ok(out)
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        which::which("tesseract").is_ok() && which::which("pdftoppm").is_ok()
    }

    fn rasterize(&self, pdf: &Path) -> Result<PageImages, OcrError> {
        let meta = std::fs::metadata(pdf)
            .map_err(|e| OcrError::conversion(pdf, format!("cannot read file: {}", e)))?;
        if meta.len() == 0 {
            return Err(OcrError::conversion(pdf, "file is empty"));
        }

        let scratch = TempDir::new()?;
        let prefix = scratch.path().join("page");
        let dpi = self.config.dpi.to_string();

        handle_cmd_output(
            Command::new("pdftoppm")
                .args(["-png", "-r", &dpi])
                .arg(pdf)
                .arg(&prefix)
                .output(),
            "pdftoppm",
            |stderr| OcrError::conversion(pdf, format!("pdftoppm failed: {}", stderr)),
        )?;

        let mut pages = Vec::new();
        for entry in std::fs::read_dir(scratch.path())? {
            let path = entry?.path();
            if let Some(number) = page_number(&path) {
                pages.push(PageImage { number, path });
            }
        }
        if pages.is_empty() {
            return Err(OcrError::conversion(pdf, "no pages rendered"));
        }
        pages.sort_by_key(|p| p.number);

        debug!("Rasterized {} page(s) from {}", pages.len(), pdf.display());
        Ok(PageImages::in_scratch(scratch, pages))
    }

    fn recognize(
        &self,
        image: &PageImage,
        region: Option<Region>,
    ) -> Result<Recognition, OcrError> {
        let output = match region {
            Some(region) => {
                let scratch = TempDir::new()?;
                let cropped = self.crop(image, region, &scratch)?;
                self.run_tsv(&cropped, image.number)?
            }
            None => self.run_tsv(&image.path, image.number)?,
        };
        Ok(tsv::parse_recognition(&output))
    }

    fn segment_lines(&self, image: &PageImage) -> Result<Vec<Region>, OcrError> {
        let output = self.run_tsv(&image.path, image.number)?;
        Ok(tsv::line_regions(&output))
    }
}
