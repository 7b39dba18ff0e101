//! Blueprint analysis pipeline.
//!
//! A document flows through these stages:
//! - Rasterize every page at the configured DPI
//! - Build the rulebook (general notes + lighting schedule rows) from fixed regions
//! - Detect shaded-rectangle fixture glyphs
//! - Read and normalize the symbol printed next to each glyph
//! - Group detections per symbol, resolving descriptions rulebook-first
//!
//! Each successful stage leaves a JSON artifact behind. Any error aborts the
//! whole document; OCR failures are the exception and degrade to empty text.

pub mod annotate;
pub mod artifacts;
pub mod grouping;
pub mod ocr;
pub mod raster;
pub mod regions;
pub mod rulebook;
pub mod shapes;
pub mod symbols;

use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::ProcessingError;

use artifacts::ArtifactStore;
use grouping::{Summary, SymbolDescriptionMap, group_detections};
use ocr::TextRecognizer;
use rulebook::RulebookRecord;
use symbols::SymbolNormalizer;

/// One rasterized page of a blueprint
pub struct Page {
    /// 1-based
    pub page_number: u32,
    /// `<document-base>_page_<n>`
    pub sheet_name: String,
    pub image: RgbImage,
}

/// Axis-aligned box in page-pixel space, serialized as `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn center(&self) -> (u32, u32) {
        ((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }
}

impl From<[u32; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [u32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for [u32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// A located fixture glyph and the symbol read beside it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Normalized symbol (or `UNKNOWN`)
    pub symbol: String,
    /// Symbol as extracted, before normalization
    #[serde(default)]
    pub raw_symbol: String,
    pub bounding_box: BoundingBox,
    pub text_nearby: String,
    pub source_sheet: String,
}

/// Everything the pipeline produced for one document
#[derive(Debug)]
pub struct PipelineOutput {
    pub rulebook: Vec<RulebookRecord>,
    pub detections: Vec<Detection>,
    pub summary: Summary,
}

/// Run the whole pipeline on a PDF on disk.
///
/// Blocking: call from `spawn_blocking`.
pub fn process_blueprint(
    document_path: &Path,
    document_name: &str,
    config: &PipelineConfig,
    recognizer: &dyn TextRecognizer,
    store: &ArtifactStore,
    cancel: &CancellationToken,
) -> Result<PipelineOutput, ProcessingError> {
    let pages = raster::rasterize_document(document_path, document_name, config.raster.dpi)?;
    info!(job = %document_name, pages = pages.len(), "Document rasterized");
    analyze_pages(&pages, document_name, config, recognizer, store, cancel)
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), ProcessingError> {
    if cancel.is_cancelled() {
        return Err(ProcessingError::Cancelled);
    }
    Ok(())
}

/// Run every stage after rasterization, writing artifacts as stages complete.
///
/// Cancellation is checked between stages and pages; a cancelled run never
/// writes the result artifact.
pub fn analyze_pages(
    pages: &[Page],
    document_name: &str,
    config: &PipelineConfig,
    recognizer: &dyn TextRecognizer,
    store: &ArtifactStore,
    cancel: &CancellationToken,
) -> Result<PipelineOutput, ProcessingError> {
    ensure_active(cancel)?;
    let rulebook = rulebook::build_rulebook(pages, config, recognizer);
    store.write_rulebook(document_name, &rulebook)?;
    info!(job = %document_name, records = rulebook.len(), "Rulebook saved");

    let normalizer = SymbolNormalizer::new(&config.symbols, &config.grouping.fallback);
    let mut detections: Vec<Detection> = Vec::new();
    for page in pages {
        ensure_active(cancel)?;
        detections.extend(symbols::detect_fixtures(page, config, recognizer, &normalizer));
    }
    store.write_detections(document_name, &detections)?;
    info!(job = %document_name, detections = detections.len(), "Detections saved");

    if config.annotation.enabled
        && let Some(first_page) = pages.first()
        && !detections.is_empty()
    {
        let path = store.annotation_path(document_name);
        if let Err(e) = annotate::write_annotation(first_page, &detections, &config.annotation, &path)
        {
            warn!(job = %document_name, error = %e, "Failed to write annotation image");
        }
    }

    let table = SymbolDescriptionMap::from_rulebook(&rulebook, &normalizer);
    debug!(job = %document_name, schedule_symbols = table.len(), "Schedule table indexed");
    let summary = group_detections(&detections, &table, &config.grouping);
    ensure_active(cancel)?;
    store.write_result(document_name, &summary)?;
    info!(job = %document_name, symbols = summary.len(), "Result saved");

    Ok(PipelineOutput {
        rulebook,
        detections,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ocr::{RecognitionMode, scripted};
    use image::Rgb;

    /// White sheet with one filled 60x25 glyph at (400, 300)
    fn sheet_with_glyph() -> RgbImage {
        let mut image = RgbImage::from_pixel(1000, 800, Rgb([255, 255, 255]));
        for y in 300..325 {
            for x in 400..460 {
                image.put_pixel(x, y, Rgb([10, 10, 10]));
            }
        }
        image
    }

    #[test]
    fn test_bounding_box_serializes_as_array() {
        let bbox = BoundingBox {
            x1: 1,
            y1: 2,
            x2: 30,
            y2: 40,
        };
        assert_eq!(serde_json::to_string(&bbox).unwrap(), "[1,2,30,40]");
        let back: BoundingBox = serde_json::from_str("[1,2,30,40]").unwrap();
        assert_eq!(back, bbox);
        assert_eq!(bbox.center(), (15, 21));
    }

    #[test]
    fn test_analyze_pages_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf());
        let pages = vec![Page {
            page_number: 1,
            sheet_name: "E101_page_1".to_string(),
            image: sheet_with_glyph(),
        }];

        // The schedule table crop is the only large block-mode region here;
        // the notes crop is 550x350, the nearby crop is 100x100.
        let recognizer = scripted(|image, mode| {
            Ok(match (mode, image.width()) {
                (RecognitionMode::Line, _) => "(A1) 277V".to_string(),
                (RecognitionMode::Block, 550) => {
                    "GENERAL NOTE: ALL EMERGENCY FIXTURES ON UNSWITCHED POWER".to_string()
                }
                (RecognitionMode::Block, _) => "A1 Recessed 2x4 Troffer Emergency 277V".to_string(),
            })
        });

        let config = PipelineConfig::default();
        let output = analyze_pages(
            &pages,
            "E101.pdf",
            &config,
            &recognizer,
            &store,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(output.rulebook.len(), 2);
        assert!(matches!(output.rulebook[0], RulebookRecord::Note { .. }));
        assert_eq!(output.detections.len(), 1);
        assert_eq!(output.detections[0].symbol, "A1");

        let a1 = output.summary.get("A1").unwrap();
        assert_eq!(a1.count, 1);
        // Rulebook wins over the fallback "2x4 LED Emergency Fixture"
        assert_eq!(a1.description, "Recessed 2x4 Troffer Emergency");

        assert!(store.rulebook_path("E101.pdf").exists());
        assert!(store.detections_path("E101.pdf").exists());
        assert!(store.result_path("E101.pdf").exists());
    }

    #[test]
    fn test_blank_pages_produce_empty_summary() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf());
        let pages = vec![Page {
            page_number: 1,
            sheet_name: "blank_page_1".to_string(),
            image: RgbImage::from_pixel(800, 600, Rgb([255, 255, 255])),
        }];
        let recognizer = scripted(|_, _| Ok(String::new()));

        let output = analyze_pages(
            &pages,
            "blank.pdf",
            &PipelineConfig::default(),
            &recognizer,
            &store,
            &CancellationToken::new(),
        )
        .unwrap();

        assert!(output.detections.is_empty());
        assert!(output.summary.is_empty());
        assert!(!store.annotation_path("blank.pdf").exists());
    }

    #[test]
    fn test_cancelled_run_writes_no_result() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf());
        let pages = vec![Page {
            page_number: 1,
            sheet_name: "E101_page_1".to_string(),
            image: sheet_with_glyph(),
        }];
        let recognizer = scripted(|_, _| Ok("A1".to_string()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = analyze_pages(
            &pages,
            "E101.pdf",
            &PipelineConfig::default(),
            &recognizer,
            &store,
            &cancel,
        )
        .unwrap_err();

        assert!(matches!(err, ProcessingError::Cancelled));
        assert!(!store.result_path("E101.pdf").exists());
    }
}
