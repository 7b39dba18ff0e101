//! Rulebook extraction: general notes and lighting schedule rows.
//!
//! Per page the notes region is read first, then the schedule table region,
//! so the record order is page order, then notes before table rows.

use image::GrayImage;
use image::imageops::grayscale;
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ocr::{RecognitionMode, TextRecognizer, recognize_or_empty};
use super::regions::crop_region;
use super::Page;
use crate::config::{PipelineConfig, RulebookConfig};

/// One classified line of rulebook text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RulebookRecord {
    Note {
        text: String,
        source_sheet: String,
    },
    TableRow {
        symbol: String,
        description: String,
        source_sheet: String,
    },
}

impl RulebookRecord {
    pub fn source_sheet(&self) -> &str {
        match self {
            RulebookRecord::Note { source_sheet, .. }
            | RulebookRecord::TableRow { source_sheet, .. } => source_sheet,
        }
    }
}

/// Short, fully uppercase alphanumeric token with at least one letter.
pub fn is_schedule_symbol(token: &str, max_len: usize) -> bool {
    !token.is_empty()
        && token.len() <= max_len
        && token.chars().all(|c| c.is_ascii_alphanumeric())
        && token.chars().any(|c| c.is_ascii_uppercase())
        && !token.chars().any(|c| c.is_ascii_lowercase())
}

/// Keep lines that are long enough and mention a note keyword.
pub fn parse_note_lines(text: &str, config: &RulebookConfig, sheet: &str) -> Vec<RulebookRecord> {
    let keywords: Vec<String> = config
        .note_keywords
        .iter()
        .map(|k| k.to_lowercase())
        .collect();

    text.lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > config.min_note_length)
        .filter(|line| {
            let lower = line.to_lowercase();
            keywords.iter().any(|k| lower.contains(k.as_str()))
        })
        .map(|line| RulebookRecord::Note {
            text: line.to_string(),
            source_sheet: sheet.to_string(),
        })
        .collect()
}

/// Parse `SYMBOL description...` rows; the description is capped at a few tokens.
pub fn parse_table_lines(text: &str, config: &RulebookConfig, sheet: &str) -> Vec<RulebookRecord> {
    text.lines()
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < config.min_table_tokens {
                return None;
            }
            let symbol = tokens[0];
            if !is_schedule_symbol(symbol, config.max_symbol_length) {
                return None;
            }
            let end = tokens.len().min(1 + config.max_description_tokens);
            Some(RulebookRecord::TableRow {
                symbol: symbol.to_string(),
                description: tokens[1..end].join(" "),
                source_sheet: sheet.to_string(),
            })
        })
        .collect()
}

fn binarize_otsu(image: &GrayImage) -> GrayImage {
    let level = otsu_level(image);
    threshold(image, level, ThresholdType::Binary)
}

/// Rulebook records for one page (notes, then table rows)
pub fn build_page_rulebook(
    page: &Page,
    config: &PipelineConfig,
    recognizer: &dyn TextRecognizer,
) -> Vec<RulebookRecord> {
    let regions = &config.regions;
    let mut records = Vec::new();

    match crop_region(&page.image, &regions.notes, regions.min_crop_side) {
        Some(crop) => {
            let text = recognize_or_empty(
                recognizer,
                &grayscale(&crop),
                RecognitionMode::Block,
                "notes",
            );
            records.extend(parse_note_lines(&text, &config.rulebook, &page.sheet_name));
        }
        None => debug!(sheet = %page.sheet_name, "Notes region degenerate, skipping"),
    }

    match crop_region(&page.image, &regions.schedule_table, regions.min_crop_side) {
        Some(crop) => {
            let gray = grayscale(&crop);
            let prepared = if config.rulebook.binarize_table {
                binarize_otsu(&gray)
            } else {
                gray
            };
            let text = recognize_or_empty(
                recognizer,
                &prepared,
                RecognitionMode::Block,
                "schedule_table",
            );
            records.extend(parse_table_lines(&text, &config.rulebook, &page.sheet_name));
        }
        None => debug!(sheet = %page.sheet_name, "Schedule table region degenerate, skipping"),
    }

    debug!(
        sheet = %page.sheet_name,
        records = records.len(),
        "Extracted page rulebook"
    );
    records
}

/// Rulebook for a whole document, in page order
pub fn build_rulebook(
    pages: &[Page],
    config: &PipelineConfig,
    recognizer: &dyn TextRecognizer,
) -> Vec<RulebookRecord> {
    pages
        .iter()
        .flat_map(|page| build_page_rulebook(page, config, recognizer))
        .collect()
}
