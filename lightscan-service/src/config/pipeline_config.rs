//! Detection pipeline configuration.
//!
//! Everything the pipeline tunes at runtime lives here: raster resolution,
//! shape thresholds, crop regions, rulebook parsing rules, symbol correction
//! tables, the fallback description table, OCR engine settings, and the
//! diagnostic annotation. The whole section can be replaced through the
//! settings API; each job works on the snapshot it started with.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Pipeline configuration (hot-reloadable)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub raster: RasterConfig,

    #[serde(default)]
    pub shapes: ShapeConfig,

    #[serde(default)]
    pub regions: RegionsConfig,

    #[serde(default)]
    pub rulebook: RulebookConfig,

    #[serde(default)]
    pub symbols: SymbolConfig,

    #[serde(default)]
    pub grouping: GroupingConfig,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub annotation: AnnotationConfig,
}

/// Page rasterization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterConfig {
    #[serde(default = "default_dpi")]
    pub dpi: f32,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self { dpi: default_dpi() }
    }
}

/// Shaded-rectangle detection thresholds.
///
/// Area and aspect-ratio bounds are exclusive on both ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeConfig {
    /// Pixels at or below this intensity are foreground
    #[serde(default = "default_intensity_threshold")]
    pub intensity_threshold: u8,

    #[serde(default = "default_min_area")]
    pub min_area: f64,

    #[serde(default = "default_max_area")]
    pub max_area: f64,

    #[serde(default = "default_min_aspect_ratio")]
    pub min_aspect_ratio: f64,

    #[serde(default = "default_max_aspect_ratio")]
    pub max_aspect_ratio: f64,

    /// Side of the square structuring element used for closing (odd)
    #[serde(default = "default_closing_kernel")]
    pub closing_kernel: u8,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            intensity_threshold: default_intensity_threshold(),
            min_area: default_min_area(),
            max_area: default_max_area(),
            min_aspect_ratio: default_min_aspect_ratio(),
            max_aspect_ratio: default_max_aspect_ratio(),
            closing_kernel: default_closing_kernel(),
        }
    }
}

/// One edge of a crop region.
///
/// `from_start` counts pixels from the left/top edge, `from_end` counts back
/// from the right/bottom edge, `fraction` is relative to the image extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    FromStart(u32),
    FromEnd(u32),
    Fraction(f64),
}

/// Crop region expressed as four independent edges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub left: Edge,
    pub top: Edge,
    pub right: Edge,
    pub bottom: Edge,
}

/// Named regions used by the rulebook builder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionsConfig {
    /// General notes block (top-left of the sheet)
    #[serde(default = "default_notes_region")]
    pub notes: RegionSpec,

    /// Lighting schedule table (bottom-right of the sheet)
    #[serde(default = "default_schedule_table_region")]
    pub schedule_table: RegionSpec,

    /// Crops narrower or shorter than this are skipped without OCR
    #[serde(default = "default_min_crop_side")]
    pub min_crop_side: u32,
}

impl Default for RegionsConfig {
    fn default() -> Self {
        Self {
            notes: default_notes_region(),
            schedule_table: default_schedule_table_region(),
            min_crop_side: default_min_crop_side(),
        }
    }
}

/// Rulebook line classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulebookConfig {
    /// A note line must contain one of these (case-insensitive)
    #[serde(default = "default_note_keywords")]
    pub note_keywords: Vec<String>,

    /// A note line must be strictly longer than this many characters
    #[serde(default = "default_min_note_length")]
    pub min_note_length: usize,

    #[serde(default = "default_min_table_tokens")]
    pub min_table_tokens: usize,

    #[serde(default = "default_max_symbol_length")]
    pub max_symbol_length: usize,

    #[serde(default = "default_max_description_tokens")]
    pub max_description_tokens: usize,

    /// Otsu-binarize the schedule table crop before recognition
    #[serde(default = "default_true")]
    pub binarize_table: bool,
}

impl Default for RulebookConfig {
    fn default() -> Self {
        Self {
            note_keywords: default_note_keywords(),
            min_note_length: default_min_note_length(),
            min_table_tokens: default_min_table_tokens(),
            max_symbol_length: default_max_symbol_length(),
            max_description_tokens: default_max_description_tokens(),
            binarize_table: true,
        }
    }
}

/// Single-character OCR correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharSubstitution {
    pub from: char,
    pub to: char,
}

/// Symbol extraction and normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    /// Pixels added on each side of a detection's center for the text crop
    #[serde(default = "default_nearby_padding")]
    pub nearby_padding: u32,

    /// Characters trimmed from both ends of each recognized token
    #[serde(default = "default_strip_chars")]
    pub strip_chars: String,

    #[serde(default = "default_min_symbol_length")]
    pub min_length: usize,

    #[serde(default = "default_max_symbol_length")]
    pub max_length: usize,

    /// Whole-token corrections, applied first
    #[serde(default = "default_corrections")]
    pub corrections: IndexMap<String, String>,

    /// Per-character corrections, tried only on tokens no table recognizes
    #[serde(default = "default_substitutions")]
    pub substitutions: Vec<CharSubstitution>,

    /// Reset over-long or letterless symbols to `UNKNOWN`
    #[serde(default = "default_true")]
    pub invalidate_malformed: bool,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            nearby_padding: default_nearby_padding(),
            strip_chars: default_strip_chars(),
            min_length: default_min_symbol_length(),
            max_length: default_max_symbol_length(),
            corrections: default_corrections(),
            substitutions: default_substitutions(),
            invalidate_malformed: true,
        }
    }
}

/// Description resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Well-known symbols used when the rulebook has no entry
    #[serde(default = "default_fallback_descriptions")]
    pub fallback: IndexMap<String, String>,

    #[serde(default = "default_description")]
    pub default_description: String,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            fallback: default_fallback_descriptions(),
            default_description: default_description(),
        }
    }
}

/// Which text recognizer backs the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrEngineKind {
    /// Spawn the `tesseract` executable per region
    TesseractCli,
    /// Link Tesseract in-process (requires the `leptess` feature)
    Leptess,
    /// Always recognize nothing
    Disabled,
}

/// OCR engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_engine")]
    pub engine: OcrEngineKind,

    #[serde(default = "default_tesseract_command")]
    pub command: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Page segmentation mode for block text (notes, schedule)
    #[serde(default = "default_psm")]
    pub block_psm: u8,

    /// Page segmentation mode for the text around a detection
    #[serde(default = "default_psm")]
    pub line_psm: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: default_ocr_engine(),
            command: default_tesseract_command(),
            language: default_language(),
            block_psm: default_psm(),
            line_psm: default_psm(),
        }
    }
}

/// Diagnostic annotation image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_annotation_max")]
    pub max_detections: usize,

    /// TrueType/OpenType font overriding the bundled label font
    #[serde(default)]
    pub font_path: Option<PathBuf>,

    #[serde(default = "default_font_size")]
    pub font_size: f32,

    #[serde(default = "default_line_thickness")]
    pub line_thickness: u32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_detections: default_annotation_max(),
            font_path: None,
            font_size: default_font_size(),
            line_thickness: default_line_thickness(),
        }
    }
}

impl PipelineConfig {
    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.raster.dpi > 0.0) {
            return Err(format!("raster.dpi must be positive, got {}", self.raster.dpi));
        }

        let shapes = &self.shapes;
        if shapes.min_area >= shapes.max_area {
            return Err(format!(
                "shapes.min_area ({}) must be below shapes.max_area ({})",
                shapes.min_area, shapes.max_area
            ));
        }
        if shapes.min_aspect_ratio >= shapes.max_aspect_ratio {
            return Err(format!(
                "shapes.min_aspect_ratio ({}) must be below shapes.max_aspect_ratio ({})",
                shapes.min_aspect_ratio, shapes.max_aspect_ratio
            ));
        }
        if shapes.closing_kernel == 0 || shapes.closing_kernel % 2 == 0 {
            return Err(format!(
                "shapes.closing_kernel must be odd, got {}",
                shapes.closing_kernel
            ));
        }

        for (name, region) in [
            ("notes", &self.regions.notes),
            ("schedule_table", &self.regions.schedule_table),
        ] {
            for edge in [region.left, region.top, region.right, region.bottom] {
                if let Edge::Fraction(f) = edge
                    && !(0.0..=1.0).contains(&f)
                {
                    return Err(format!("regions.{name}: fraction {f} outside [0, 1]"));
                }
            }
        }

        let symbols = &self.symbols;
        if symbols.min_length == 0 || symbols.min_length > symbols.max_length {
            return Err(format!(
                "symbols.min_length ({}) must be in 1..=max_length ({})",
                symbols.min_length, symbols.max_length
            ));
        }

        // A correction target that is itself rewritten would make normalization
        // depend on how many times it runs.
        for (from, to) in &symbols.corrections {
            if from != to
                && let Some(next) = symbols.corrections.get(to)
                && next != to
            {
                return Err(format!(
                    "symbols.corrections: {from} -> {to} chains into {to} -> {next}"
                ));
            }
        }

        let mut seen = HashSet::new();
        for sub in &symbols.substitutions {
            if !seen.insert(sub.from) {
                return Err(format!(
                    "symbols.substitutions: duplicate entry for '{}'",
                    sub.from
                ));
            }
        }

        Ok(())
    }
}

// ==================== Default Value Functions ====================

fn default_true() -> bool {
    true
}

fn default_dpi() -> f32 {
    200.0
}

fn default_intensity_threshold() -> u8 {
    60
}

fn default_min_area() -> f64 {
    500.0
}

fn default_max_area() -> f64 {
    5000.0
}

fn default_min_aspect_ratio() -> f64 {
    1.5
}

fn default_max_aspect_ratio() -> f64 {
    4.0
}

fn default_closing_kernel() -> u8 {
    3
}

fn default_notes_region() -> RegionSpec {
    RegionSpec {
        left: Edge::FromStart(50),
        top: Edge::FromStart(50),
        right: Edge::FromStart(600),
        bottom: Edge::FromStart(400),
    }
}

fn default_schedule_table_region() -> RegionSpec {
    RegionSpec {
        left: Edge::Fraction(0.5),
        top: Edge::Fraction(0.6),
        right: Edge::FromEnd(50),
        bottom: Edge::FromEnd(100),
    }
}

fn default_min_crop_side() -> u32 {
    8
}

fn default_note_keywords() -> Vec<String> {
    ["emergency", "unswitched", "power", "note"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_min_note_length() -> usize {
    10
}

fn default_min_table_tokens() -> usize {
    3
}

fn default_max_symbol_length() -> usize {
    6
}

fn default_max_description_tokens() -> usize {
    4
}

fn default_nearby_padding() -> u32 {
    50
}

fn default_strip_chars() -> String {
    ".,;:()".to_string()
}

fn default_min_symbol_length() -> usize {
    2
}

fn default_corrections() -> IndexMap<String, String> {
    [
        ("AIE", "A1E"),
        ("AE", "A1E"),
        ("BLOG", "A1E"),
        ("JOT", "A1E"),
        ("TA", "A1E"),
        ("A1", "A1"),
        ("T", "W"),
        ("I", "W"),
        ("O", "0"),
        ("S", "5"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_substitutions() -> Vec<CharSubstitution> {
    vec![
        CharSubstitution { from: 'O', to: '0' },
        CharSubstitution { from: 'I', to: '1' },
        CharSubstitution { from: 'S', to: '5' },
    ]
}

fn default_fallback_descriptions() -> IndexMap<String, String> {
    [
        ("A1", "2x4 LED Emergency Fixture"),
        ("A1E", "Exit/Emergency Combo Unit"),
        ("W", "Wall-Mounted Emergency LED"),
        ("P", "Parking Lot Light"),
        ("EL", "Emergency Light"),
        ("EX", "Exit Sign"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_description() -> String {
    "Generic Emergency Light".to_string()
}

fn default_ocr_engine() -> OcrEngineKind {
    OcrEngineKind::TesseractCli
}

fn default_tesseract_command() -> String {
    "tesseract".to_string()
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_psm() -> u8 {
    6
}

fn default_annotation_max() -> usize {
    10
}

fn default_font_size() -> f32 {
    16.0
}

fn default_line_thickness() -> u32 {
    2
}
