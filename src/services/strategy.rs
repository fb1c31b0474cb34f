//! Granularity strategies: how a PDF is cut into text units.
//!
//! - Document: one unit for the whole file, pages joined by newlines.
//! - Page: one unit per page.
//! - Block: one unit per text line the engine's layout analysis finds.
//!
//! A failed rasterization fails the whole file. A failed page or region
//! only marks that unit as an error.

use std::path::Path;

use tracing::{debug, warn};

use crate::models::{Granularity, UnitStatus};
use crate::ocr::{OcrBackend, OcrError, PageImage, PageImages, Recognition, Region};

/// One text unit produced from a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedUnit {
    pub page: u32,
    /// 0 for document and page units, 1-based region index for blocks.
    pub block: u32,
    /// Empty for blank and failed units.
    pub text: String,
    /// Mean confidence; 0 for blank units, `None` for failed ones.
    pub confidence: Option<f64>,
    pub status: UnitStatus,
    pub error: Option<String>,
}

impl ExtractedUnit {
    /// A successfully recognized unit. Anything without usable content is
    /// normalized to the blank state: empty text, confidence 0.
    pub fn recognized(page: u32, block: u32, recognition: Recognition) -> Self {
        let (text, confidence) = if recognition.has_content() {
            (recognition.text, recognition.confidence)
        } else {
            (String::new(), 0.0)
        };
        Self {
            page,
            block,
            text,
            confidence: Some(confidence),
            status: UnitStatus::Processed,
            error: None,
        }
    }

    pub fn failed(page: u32, block: u32, error: &OcrError) -> Self {
        Self {
            page,
            block,
            text: String::new(),
            confidence: None,
            status: UnitStatus::Error,
            error: Some(error.to_string()),
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}

impl Granularity {
    /// Rasterize `pdf` and recognize it at this granularity.
    ///
    /// Units come back in page order, then block order.
    pub fn process<B: OcrBackend + ?Sized>(
        self,
        backend: &B,
        pdf: &Path,
    ) -> Result<Vec<ExtractedUnit>, OcrError> {
        let pages = backend.rasterize(pdf)?;
        debug!(
            "Processing {} ({} page(s)) at {} granularity with {}",
            pdf.display(),
            pages.len(),
            self,
            backend.name()
        );

        Ok(match self {
            Granularity::Document => vec![process_document(backend, pdf, pages)],
            Granularity::Page => pages
                .map(|page| recognize_unit(backend, pdf, &page, 0, None))
                .collect(),
            Granularity::Block => pages
                .flat_map(|page| process_blocks(backend, pdf, &page))
                .collect(),
        })
    }
}

fn recognize_unit<B: OcrBackend + ?Sized>(
    backend: &B,
    pdf: &Path,
    page: &PageImage,
    block: u32,
    region: Option<Region>,
) -> ExtractedUnit {
    match backend.recognize(page, region) {
        Ok(recognition) => ExtractedUnit::recognized(page.number, block, recognition),
        Err(e) => {
            warn!(
                "Recognition failed for {} page {} block {}: {}",
                pdf.display(),
                page.number,
                block,
                e
            );
            ExtractedUnit::failed(page.number, block, &e)
        }
    }
}

/// Single unit tagged page 1, block 0. Only pages with content contribute
/// text and confidence; with none the unit is blank. A failed page fails
/// the whole unit, so no partial document text is ever written.
fn process_document<B: OcrBackend + ?Sized>(
    backend: &B,
    pdf: &Path,
    pages: PageImages,
) -> ExtractedUnit {
    let mut texts = Vec::new();
    let mut confidences = Vec::new();

    for page in pages {
        match backend.recognize(&page, None) {
            Ok(recognition) if recognition.has_content() => {
                texts.push(recognition.text);
                confidences.push(recognition.confidence);
            }
            Ok(_) => debug!("Page {} of {} is blank", page.number, pdf.display()),
            Err(e) => {
                warn!(
                    "Recognition failed for {} page {}, dropping document unit: {}",
                    pdf.display(),
                    page.number,
                    e
                );
                return ExtractedUnit::failed(1, 0, &e);
            }
        }
    }

    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };

    ExtractedUnit {
        page: 1,
        block: 0,
        text: texts.join("\n"),
        confidence: Some(confidence),
        status: UnitStatus::Processed,
        error: None,
    }
}

fn process_blocks<B: OcrBackend + ?Sized>(
    backend: &B,
    pdf: &Path,
    page: &PageImage,
) -> Vec<ExtractedUnit> {
    let regions = match backend.segment_lines(page) {
        Ok(regions) => regions,
        Err(e) => {
            warn!(
                "Layout analysis failed for {} page {}: {}",
                pdf.display(),
                page.number,
                e
            );
            return vec![ExtractedUnit::failed(page.number, 0, &e)];
        }
    };

    regions
        .into_iter()
        .enumerate()
        .map(|(i, region)| recognize_unit(backend, pdf, page, i as u32 + 1, Some(region)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// Pages scripted by number; regions carry their index in `x`.
    #[derive(Default)]
    struct FakeBackend {
        pages: Vec<Result<(&'static str, f64), &'static str>>,
        regions: HashMap<u32, Result<Vec<(&'static str, f64)>, &'static str>>,
        fail_rasterize: bool,
        calls: Cell<usize>,
    }

    impl OcrBackend for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn rasterize(&self, pdf: &Path) -> Result<PageImages, OcrError> {
            if self.fail_rasterize {
                return Err(OcrError::conversion(pdf, "corrupt"));
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

        fn recognize(
            &self,
            image: &PageImage,
            region: Option<Region>,
        ) -> Result<Recognition, OcrError> {
            self.calls.set(self.calls.get() + 1);
            let scripted = match region {
                None => self.pages[image.number as usize - 1],
                Some(r) => match &self.regions[&image.number] {
                    Ok(lines) => Ok(lines[r.x as usize]),
                    Err(e) => Err(*e),
                },
            };
            scripted
                .map(|(text, conf)| Recognition::new(text, conf))
                .map_err(|e| OcrError::recognition(image.number, e))
        }

        fn segment_lines(&self, image: &PageImage) -> Result<Vec<Region>, OcrError> {
            match self.regions.get(&image.number) {
                Some(Ok(lines)) => Ok((0..lines.len() as u32)
                    .map(|i| Region::new(i, 0, 10, 10))
                    .collect()),
                Some(Err(e)) => Err(OcrError::recognition(image.number, *e)),
                None => Ok(Vec::new()),
            }
        }
    }

    fn pdf() -> &'static Path {
        Path::new("/records/094-000123/visit.pdf")
    }

    #[test]
    fn test_document_mean_of_content_pages_only() {
        let backend = FakeBackend {
            pages: vec![
                Ok(("first", 85.0)),
                Ok(("", 40.0)),
                Ok(("noise", 0.0)),
                Ok(("second", 90.0)),
            ],
            ..Default::default()
        };
        let units = Granularity::Document.process(&backend, pdf()).unwrap();
        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!((unit.page, unit.block), (1, 0));
        assert_eq!(unit.text, "first\nsecond");
        assert_eq!(unit.confidence, Some(87.5));
        assert_eq!(unit.status, UnitStatus::Processed);
    }

    #[test]
    fn test_document_without_content_is_blank_not_error() {
        let backend = FakeBackend {
            pages: vec![Ok(("", 0.0)), Ok(("   ", 40.0))],
            ..Default::default()
        };
        let unit = &Granularity::Document.process(&backend, pdf()).unwrap()[0];
        assert_eq!(unit.text, "");
        assert_eq!(unit.confidence, Some(0.0));
        assert_eq!(unit.status, UnitStatus::Processed);
    }

    #[test]
    fn test_document_any_page_failed_is_error() {
        let backend = FakeBackend {
            pages: vec![Ok(("first", 85.0)), Err("engine crashed"), Ok(("third", 90.0))],
            ..Default::default()
        };
        let unit = &Granularity::Document.process(&backend, pdf()).unwrap()[0];
        assert_eq!((unit.page, unit.block), (1, 0));
        assert_eq!(unit.status, UnitStatus::Error);
        assert_eq!(unit.confidence, None);
        assert!(unit.text.is_empty());
        assert!(!unit.has_text());
        assert!(unit.error.as_deref().unwrap().contains("engine crashed"));
    }

    #[test]
    fn test_document_all_pages_failed_is_error() {
        let backend = FakeBackend {
            pages: vec![Err("bad"), Err("worse")],
            ..Default::default()
        };
        let unit = &Granularity::Document.process(&backend, pdf()).unwrap()[0];
        assert_eq!(unit.status, UnitStatus::Error);
        assert_eq!(unit.confidence, None);
        assert!(unit.error.as_deref().unwrap().contains("bad"));
        assert_eq!(backend.calls.get(), 1);
    }

    #[test]
    fn test_page_failure_is_isolated() {
        let backend = FakeBackend {
            pages: vec![Ok(("one", 85.0)), Err("smudge"), Ok(("", 0.0))],
            ..Default::default()
        };
        let units = Granularity::Page.process(&backend, pdf()).unwrap();
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].confidence, Some(85.0));
        assert_eq!(units[1].status, UnitStatus::Error);
        assert_eq!(units[1].confidence, None);
        assert_eq!(units[2].status, UnitStatus::Processed);
        assert_eq!(units[2].confidence, Some(0.0));
        assert!(!units[2].has_text());
        assert!(units.iter().all(|u| u.block == 0));
        assert_eq!(
            units.iter().map(|u| u.page).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_block_units_match_regions() {
        let mut regions = HashMap::new();
        regions.insert(1, Ok(vec![("Name", 95.0), ("Date", 70.0), ("", 0.0)]));
        regions.insert(2, Err("layout failed"));
        let backend = FakeBackend {
            pages: vec![Ok(("x", 1.0)), Ok(("y", 1.0)), Ok(("z", 1.0))],
            regions,
            ..Default::default()
        };

        let units = Granularity::Block.process(&backend, pdf()).unwrap();
        assert_eq!(units.len(), 4);
        assert_eq!(
            units
                .iter()
                .map(|u| (u.page, u.block, u.confidence))
                .collect::<Vec<_>>(),
            vec![
                (1, 1, Some(95.0)),
                (1, 2, Some(70.0)),
                (1, 3, Some(0.0)),
                (2, 0, None),
            ]
        );
        assert_eq!(units[3].status, UnitStatus::Error);
    }

    #[test]
    fn test_rasterize_failure_fails_whole_file() {
        let backend = FakeBackend {
            pages: vec![Ok(("never", 90.0))],
            fail_rasterize: true,
            ..Default::default()
        };
        for granularity in [Granularity::Document, Granularity::Page, Granularity::Block] {
            assert!(matches!(
                granularity.process(&backend, pdf()),
                Err(OcrError::Conversion { .. })
            ));
        }
        assert_eq!(backend.calls.get(), 0);
    }
}
