//! Symbol extraction and normalization around detected fixture glyphs.
//!
//! Normalization policy, in order:
//! 1. Empty or `UNKNOWN` input stays `UNKNOWN`.
//! 2. A whole-token correction wins outright.
//! 3. A token already known (fallback key or correction target) is kept.
//! 4. Otherwise character substitutions are tried, and their result is only
//!    accepted if it lands on a known symbol after correction.
//! 5. Optionally, over-long or letterless results become `UNKNOWN`.
//!
//! Config validation rejects correction chains, so the result is a fixed point.

use std::collections::HashSet;

use image::imageops::grayscale;
use image::RgbImage;
use indexmap::IndexMap;
use tracing::{debug, trace};

use super::ocr::{RecognitionMode, TextRecognizer, recognize_or_empty};
use super::regions::{crop_rect, window_around};
use super::shapes::detect_shaded_rectangles;
use super::{BoundingBox, Detection, Page};
use crate::config::{PipelineConfig, SymbolConfig};

pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Recognize the text in a padded window centered on a bounding box.
pub fn nearby_text(
    image: &RgbImage,
    bounding_box: &BoundingBox,
    config: &PipelineConfig,
    recognizer: &dyn TextRecognizer,
) -> String {
    let rect = window_around(
        bounding_box.center(),
        config.symbols.nearby_padding,
        image.width(),
        image.height(),
    );
    match crop_rect(image, rect, config.regions.min_crop_side) {
        Some(crop) => {
            recognize_or_empty(recognizer, &grayscale(&crop), RecognitionMode::Line, "nearby")
                .trim()
                .to_string()
        }
        None => String::new(),
    }
}

fn is_symbol_token(token: &str, config: &SymbolConfig) -> bool {
    let len = token.chars().count();
    len >= config.min_length
        && len <= config.max_length
        && token.chars().all(|c| c.is_ascii_alphanumeric())
        && token.chars().any(|c| c.is_ascii_uppercase())
        && !token.chars().any(|c| c.is_ascii_lowercase())
}

/// First whitespace token that looks like a fixture symbol, or `UNKNOWN`.
pub fn extract_symbol(text: &str, config: &SymbolConfig) -> String {
    let strip: Vec<char> = config.strip_chars.chars().collect();
    text.split_whitespace()
        .map(|token| token.trim_matches(strip.as_slice()))
        .find(|token| is_symbol_token(token, config))
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_SYMBOL.to_string())
}

/// Maps noisy recognized symbols onto canonical ones.
pub struct SymbolNormalizer<'a> {
    config: &'a SymbolConfig,
    known: HashSet<&'a str>,
}

impl<'a> SymbolNormalizer<'a> {
    pub fn new(config: &'a SymbolConfig, fallback: &'a IndexMap<String, String>) -> Self {
        let known = fallback
            .keys()
            .chain(config.corrections.values())
            .map(String::as_str)
            .collect();
        Self { config, known }
    }

    fn correct<'s>(&'s self, token: &'s str) -> &'s str {
        self.config
            .corrections
            .get(token)
            .map(String::as_str)
            .unwrap_or(token)
    }

    fn substitute(&self, token: &str) -> String {
        token
            .chars()
            .map(|c| {
                self.config
                    .substitutions
                    .iter()
                    .find(|s| s.from == c)
                    .map_or(c, |s| s.to)
            })
            .collect()
    }

    fn is_malformed(&self, symbol: &str) -> bool {
        symbol.chars().count() > self.config.max_length
            || !symbol.chars().any(|c| c.is_alphabetic())
    }

    pub fn normalize(&self, raw: &str) -> String {
        let token = raw.trim();
        if token.is_empty() || token == UNKNOWN_SYMBOL {
            return UNKNOWN_SYMBOL.to_string();
        }

        let normalized = if let Some(target) = self.config.corrections.get(token) {
            target.clone()
        } else if self.known.contains(token) {
            token.to_string()
        } else {
            let substituted = self.substitute(token);
            let corrected = self.correct(&substituted);
            if self.known.contains(corrected) {
                corrected.to_string()
            } else {
                token.to_string()
            }
        };

        if self.config.invalidate_malformed && self.is_malformed(&normalized) {
            trace!(raw = %raw, normalized = %normalized, "Invalidating malformed symbol");
            return UNKNOWN_SYMBOL.to_string();
        }
        normalized
    }
}

/// Detect fixture glyphs on a page and read the symbol beside each one.
pub fn detect_fixtures(
    page: &Page,
    config: &PipelineConfig,
    recognizer: &dyn TextRecognizer,
    normalizer: &SymbolNormalizer<'_>,
) -> Vec<Detection> {
    let shapes = detect_shaded_rectangles(&page.image, &config.shapes);
    debug!(sheet = %page.sheet_name, shapes = shapes.len(), "Detected fixture glyphs");

    shapes
        .into_iter()
        .map(|shape| {
            let text_nearby = nearby_text(&page.image, &shape.bounding_box, config, recognizer);
            let raw_symbol = extract_symbol(&text_nearby, &config.symbols);
            let symbol = normalizer.normalize(&raw_symbol);
            Detection {
                symbol,
                raw_symbol,
                bounding_box: shape.bounding_box,
                text_nearby,
                source_sheet: page.sheet_name.clone(),
            }
        })
        .collect()
}
