//! Upload storage: name sanitizing, format sniffing, hashing and saving.

use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ProcessingError;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// SHA-256 of a byte slice as lowercase hex.
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Reduce an uploaded filename to a safe document name.
///
/// Directory components are dropped and anything outside `[A-Za-z0-9._-]`
/// becomes `_`. Returns `None` when nothing usable remains.
pub fn sanitize_document_name(filename: &str) -> Option<String> {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let name: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = name.trim_start_matches('.').to_string();

    if name.is_empty() || name.chars().all(|c| c == '_') {
        None
    } else {
        Some(name)
    }
}

/// Accept only PDF content, judged by its magic bytes.
///
/// The declared content type is only used for the error message.
pub fn check_document_format(content: &[u8], declared: Option<&str>) -> Result<(), ProcessingError> {
    if content.starts_with(PDF_MAGIC) {
        if let Some(declared) = declared.and_then(|d| d.parse::<mime::Mime>().ok())
            && declared.essence_str() != mime::APPLICATION_PDF.essence_str()
        {
            debug!(declared = %declared, "PDF uploaded with a non-PDF content type");
        }
        return Ok(());
    }

    let format = declared
        .and_then(|d| d.parse::<mime::Mime>().ok())
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    Err(ProcessingError::UnsupportedFormat { format })
}

/// Write an upload into `dir/<name>`, replacing any earlier file atomically.
pub fn save_upload(dir: &Path, name: &str, content: &[u8]) -> Result<PathBuf, ProcessingError> {
    std::fs::create_dir_all(dir).map_err(ProcessingError::Io)?;
    let target = dir.join(name);

    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(ProcessingError::Io)?;
    staged.write_all(content).map_err(ProcessingError::Io)?;
    staged
        .persist(&target)
        .map_err(|e| ProcessingError::Io(e.error))?;

    Ok(target)
}
