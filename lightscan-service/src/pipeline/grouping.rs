//! Per-symbol counting and description resolution.

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Detection;
use super::rulebook::RulebookRecord;
use super::symbols::SymbolNormalizer;
use crate::config::GroupingConfig;

/// Normalized schedule symbol -> description, first occurrence wins
#[derive(Debug, Default)]
pub struct SymbolDescriptionMap {
    entries: IndexMap<String, String>,
}

impl SymbolDescriptionMap {
    pub fn from_rulebook(records: &[RulebookRecord], normalizer: &SymbolNormalizer<'_>) -> Self {
        let mut entries = IndexMap::new();
        for record in records {
            let RulebookRecord::TableRow {
                symbol,
                description,
                source_sheet,
            } = record
            else {
                continue;
            };
            match entries.entry(normalizer.normalize(symbol)) {
                Entry::Vacant(slot) => {
                    slot.insert(description.clone());
                }
                Entry::Occupied(existing) => {
                    if existing.get() != description {
                        warn!(
                            symbol = %existing.key(),
                            kept = %existing.get(),
                            ignored = %description,
                            sheet = %source_sheet,
                            "Conflicting schedule entry, keeping the first"
                        );
                    }
                }
            }
        }
        Self { entries }
    }

    pub fn get(&self, symbol: &str) -> Option<&str> {
        self.entries.get(symbol).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Where a resolved description came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionSource {
    Rulebook,
    Fallback,
    Default,
}

/// Resolve a description: rulebook, then fallback table, then default.
pub fn resolve_description<'a>(
    symbol: &str,
    table: &'a SymbolDescriptionMap,
    config: &'a GroupingConfig,
) -> (&'a str, DescriptionSource) {
    if let Some(description) = table.get(symbol) {
        (description, DescriptionSource::Rulebook)
    } else if let Some(description) = config.fallback.get(symbol) {
        (description.as_str(), DescriptionSource::Fallback)
    } else {
        (config.default_description.as_str(), DescriptionSource::Default)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSummary {
    pub count: u64,
    pub description: String,
}

/// Symbol -> count and description, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Summary(IndexMap<String, SymbolSummary>);

impl Summary {
    pub fn get(&self, symbol: &str) -> Option<&SymbolSummary> {
        self.0.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.0.values().map(|s| s.count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SymbolSummary)> {
        self.0.iter()
    }
}

/// Fold detections into a summary in detection order.
///
/// The description is fixed by the first detection of each symbol.
pub fn group_detections(
    detections: &[Detection],
    table: &SymbolDescriptionMap,
    config: &GroupingConfig,
) -> Summary {
    let mut summary = IndexMap::new();
    for detection in detections {
        summary
            .entry(detection.symbol.clone())
            .or_insert_with(|| SymbolSummary {
                count: 0,
                description: resolve_description(&detection.symbol, table, config)
                    .0
                    .to_string(),
            })
            .count += 1;
    }
    Summary(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SymbolConfig;
    use crate::pipeline::BoundingBox;
    use crate::pipeline::symbols::UNKNOWN_SYMBOL;

    fn detection(symbol: &str) -> Detection {
        Detection {
            symbol: symbol.to_string(),
            raw_symbol: symbol.to_string(),
            bounding_box: BoundingBox {
                x1: 0,
                y1: 0,
                x2: 60,
                y2: 25,
            },
            text_nearby: String::new(),
            source_sheet: "plan_page_1".to_string(),
        }
    }

    fn row(symbol: &str, description: &str) -> RulebookRecord {
        RulebookRecord::TableRow {
            symbol: symbol.to_string(),
            description: description.to_string(),
            source_sheet: "plan_page_1".to_string(),
        }
    }

    fn group(records: &[RulebookRecord], detections: &[Detection]) -> Summary {
        let symbols = SymbolConfig::default();
        let grouping = GroupingConfig::default();
        let normalizer = SymbolNormalizer::new(&symbols, &grouping.fallback);
        let table = SymbolDescriptionMap::from_rulebook(records, &normalizer);
        group_detections(detections, &table, &grouping)
    }

    #[test]
    fn test_empty_rulebook_uses_fallback() {
        let summary = group(&[], &[detection("A1"), detection("A1"), detection("EX")]);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "A1": {"count": 2, "description": "2x4 LED Emergency Fixture"},
                "EX": {"count": 1, "description": "Exit Sign"},
            })
        );
    }

    #[test]
    fn test_rulebook_overrides_fallback() {
        let summary = group(&[row("W", "Wall Pack 120V")], &[detection("W")]);
        assert_eq!(summary.get("W").unwrap().description, "Wall Pack 120V");
    }

    #[test]
    fn test_unknown_symbol_gets_default_description() {
        let summary = group(&[], &[detection(UNKNOWN_SYMBOL), detection("ZZ")]);
        assert_eq!(
            summary.get(UNKNOWN_SYMBOL).unwrap().description,
            "Generic Emergency Light"
        );
        assert_eq!(summary.get("ZZ").unwrap().description, "Generic Emergency Light");
    }

    #[test]
    fn test_counts_sum_to_detections() {
        let detections: Vec<Detection> = ["A1", "EX", "A1", "W", "UNKNOWN", "A1", "EL"]
            .into_iter()
            .map(detection)
            .collect();
        let summary = group(&[], &detections);

        assert_eq!(summary.total_count(), detections.len() as u64);
        assert_eq!(summary.len(), 5);
        let order: Vec<&str> = summary.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(order, vec!["A1", "EX", "W", "UNKNOWN", "EL"]);
    }

    #[test]
    fn test_duplicate_schedule_symbol_first_wins() {
        let summary = group(
            &[row("EL", "Twin Head Battery Unit"), row("EL", "Remote Head")],
            &[detection("EL")],
        );
        assert_eq!(summary.get("EL").unwrap().description, "Twin Head Battery Unit");
    }

    #[test]
    fn test_schedule_symbols_are_normalized() {
        let symbols = SymbolConfig::default();
        let grouping = GroupingConfig::default();
        let normalizer = SymbolNormalizer::new(&symbols, &grouping.fallback);
        let table = SymbolDescriptionMap::from_rulebook(
            &[
                row("AIE", "Combo Exit Emergency"),
                RulebookRecord::Note {
                    text: "ALL EMERGENCY LIGHTS ON UNSWITCHED POWER".to_string(),
                    source_sheet: "plan_page_1".to_string(),
                },
            ],
            &normalizer,
        );

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("A1E"), Some("Combo Exit Emergency"));
        assert_eq!(
            resolve_description("A1E", &table, &grouping),
            ("Combo Exit Emergency", DescriptionSource::Rulebook)
        );
        assert_eq!(
            resolve_description("P", &table, &grouping).1,
            DescriptionSource::Fallback
        );
    }

    #[test]
    fn test_summary_round_trips_through_json() {
        let summary = group(&[], &[detection("P")]);
        let json = serde_json::to_string(&summary).unwrap();
        let back: Summary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
