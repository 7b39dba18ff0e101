//! Per-document JSON and PNG artifacts under the results directory.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use super::Detection;
use super::grouping::Summary;
use super::rulebook::RulebookRecord;
use crate::error::ProcessingError;

const RESULT_PREFIX: &str = "result_";
const JSON_SUFFIX: &str = ".json";

#[derive(Serialize)]
struct RulebookArtifact<'a> {
    rulebook: &'a [RulebookRecord],
}

/// Writes and reads the artifacts of every job
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    results_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(results_dir: PathBuf) -> Self {
        Self { results_dir }
    }

    pub fn rulebook_path(&self, document_name: &str) -> PathBuf {
        self.results_dir
            .join(format!("rulebook_{document_name}{JSON_SUFFIX}"))
    }

    pub fn detections_path(&self, document_name: &str) -> PathBuf {
        self.results_dir
            .join(format!("detections_{document_name}{JSON_SUFFIX}"))
    }

    pub fn result_path(&self, document_name: &str) -> PathBuf {
        self.results_dir
            .join(format!("{RESULT_PREFIX}{document_name}{JSON_SUFFIX}"))
    }

    pub fn annotation_path(&self, document_name: &str) -> PathBuf {
        self.results_dir.join(format!("annotation_{document_name}.png"))
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), ProcessingError> {
        let artifact_error = |source: Box<dyn std::error::Error + Send + Sync>| {
            ProcessingError::Artifact {
                path: path.display().to_string(),
                source,
            }
        };

        let file = File::create(path).map_err(|e| artifact_error(Box::new(e)))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value).map_err(|e| artifact_error(Box::new(e)))?;
        writer.flush().map_err(|e| artifact_error(Box::new(e)))?;

        debug!(path = %path.display(), "Artifact written");
        Ok(())
    }

    /// `{"rulebook": [...]}`
    pub fn write_rulebook(
        &self,
        document_name: &str,
        records: &[RulebookRecord],
    ) -> Result<(), ProcessingError> {
        self.write_json(
            &self.rulebook_path(document_name),
            &RulebookArtifact { rulebook: records },
        )
    }

    pub fn write_detections(
        &self,
        document_name: &str,
        detections: &[Detection],
    ) -> Result<(), ProcessingError> {
        self.write_json(&self.detections_path(document_name), detections)
    }

    pub fn write_result(&self, document_name: &str, summary: &Summary) -> Result<(), ProcessingError> {
        self.write_json(&self.result_path(document_name), summary)
    }

    /// Delete a saved result so a restart cannot revive it. Missing is fine.
    pub fn remove_result(&self, document_name: &str) -> Result<(), ProcessingError> {
        match std::fs::remove_file(self.result_path(document_name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProcessingError::Io(e)),
        }
    }

    pub fn read_result(&self, document_name: &str) -> Result<Summary, ProcessingError> {
        let path = self.result_path(document_name);
        let file = File::open(&path).map_err(ProcessingError::Io)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| ProcessingError::Artifact {
            path: path.display().to_string(),
            source: Box::new(e),
        })
    }

    /// Every readable `result_<name>.json`, sorted by document name.
    pub fn load_results(&self) -> Result<Vec<(String, Summary)>, ProcessingError> {
        let entries = match std::fs::read_dir(&self.results_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ProcessingError::Io(e)),
        };

        let mut results = Vec::new();
        for entry in entries {
            let entry = entry.map_err(ProcessingError::Io)?;
            let file_name = entry.file_name();
            let Some(document_name) = file_name
                .to_str()
                .and_then(|n| n.strip_prefix(RESULT_PREFIX))
                .and_then(|n| n.strip_suffix(JSON_SUFFIX))
                .filter(|n| !n.is_empty())
            else {
                continue;
            };

            match self.read_result(document_name) {
                Ok(summary) => results.push((document_name.to_string(), summary)),
                Err(e) => warn!(document = %document_name, error = %e, "Skipping unreadable result"),
            }
        }

        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::BoundingBox;

    #[test]
    fn test_artifact_names_follow_document_name() {
        let store = ArtifactStore::new(PathBuf::from("/tmp/results"));
        assert_eq!(
            store.result_path("E101.pdf"),
            PathBuf::from("/tmp/results/result_E101.pdf.json")
        );
        assert_eq!(
            store.annotation_path("E101.pdf"),
            PathBuf::from("/tmp/results/annotation_E101.pdf.png")
        );
    }

    #[test]
    fn test_rulebook_artifact_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf());
        let records = vec![RulebookRecord::TableRow {
            symbol: "EX".to_string(),
            description: "Exit Sign".to_string(),
            source_sheet: "E1_page_1".to_string(),
        }];

        store.write_rulebook("E1.pdf", &records).unwrap();

        let raw = std::fs::read_to_string(store.rulebook_path("E1.pdf")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["rulebook"][0]["type"], "table_row");
        assert_eq!(json["rulebook"][0]["symbol"], "EX");
    }

    #[test]
    fn test_detections_artifact_is_a_plain_array() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf());
        let detections = vec![Detection {
            symbol: "A1".to_string(),
            raw_symbol: "AI".to_string(),
            bounding_box: BoundingBox {
                x1: 1,
                y1: 2,
                x2: 61,
                y2: 27,
            },
            text_nearby: "AI 277V".to_string(),
            source_sheet: "E1_page_1".to_string(),
        }];

        store.write_detections("E1.pdf", &detections).unwrap();

        let raw = std::fs::read_to_string(store.detections_path("E1.pdf")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json[0]["bounding_box"], serde_json::json!([1, 2, 61, 27]));
        assert_eq!(json[0]["symbol"], "A1");
    }

    #[test]
    fn test_load_results_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf());
        store.write_result("b.pdf", &Summary::default()).unwrap();
        store.write_result("a.pdf", &Summary::default()).unwrap();
        store.write_rulebook("a.pdf", &[]).unwrap();
        std::fs::write(dir.path().join("result_broken.pdf.json"), "not json").unwrap();

        let loaded = store.load_results().unwrap();
        let names: Vec<&str> = loaded.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn test_load_results_from_missing_dir_is_empty() {
        let store = ArtifactStore::new(PathBuf::from("/nonexistent/lightscan/results"));
        assert!(store.load_results().unwrap().is_empty());
    }

    #[test]
    fn test_write_into_missing_dir_fails_with_artifact_error() {
        let store = ArtifactStore::new(PathBuf::from("/nonexistent/lightscan/results"));
        let err = store.write_result("x.pdf", &Summary::default()).unwrap_err();
        assert!(matches!(err, ProcessingError::Artifact { .. }));
    }
}
