use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("PDF not found or not processed: {pdf_name}")]
    JobNotFound { pdf_name: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Processing queue is full ({capacity} jobs waiting)")]
    QueueFull { capacity: usize },

    #[error("Blueprint processing failed")]
    Processing(#[from] ProcessingError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Blueprint processing errors
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Failed to open document {path}: {detail}")]
    DocumentOpen { path: String, detail: String },

    #[error("PDFium library unavailable: {detail}")]
    PdfiumUnavailable { detail: String },

    #[error("Failed to rasterize page {page}: {detail}")]
    Rasterization { page: u32, detail: String },

    #[error("Unsupported file format: {format}")]
    UnsupportedFormat { format: String },

    #[error("File too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Failed to write artifact {path}")]
    Artifact {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Processing exceeded {secs}s timeout")]
    Timeout { secs: u64 },

    #[error("Processing cancelled")]
    Cancelled,

    #[error("IO error")]
    Io(#[source] std::io::Error),
}

/// Text recognition failures. Never fatal: callers treat these as empty text.
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("Failed to start OCR engine: {0}")]
    Engine(String),

    #[error("OCR exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Failed to prepare image for OCR")]
    Image(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::JobNotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::QueueFull { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Processing(ProcessingError::UnsupportedFormat { .. }) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ServiceError::Processing(ProcessingError::FileTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::JobNotFound { .. } => "job_not_found",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::QueueFull { .. } => "queue_full",
            ServiceError::Processing(ProcessingError::DocumentOpen { .. }) => "document_open",
            ServiceError::Processing(ProcessingError::PdfiumUnavailable { .. }) => {
                "pdfium_unavailable"
            }
            ServiceError::Processing(ProcessingError::Rasterization { .. }) => "rasterization",
            ServiceError::Processing(ProcessingError::UnsupportedFormat { .. }) => {
                "unsupported_format"
            }
            ServiceError::Processing(ProcessingError::FileTooLarge { .. }) => "file_too_large",
            ServiceError::Processing(ProcessingError::Artifact { .. }) => "artifact_error",
            ServiceError::Processing(ProcessingError::Timeout { .. }) => "timeout",
            ServiceError::Processing(ProcessingError::Cancelled) => "cancelled",
            ServiceError::Processing(ProcessingError::Io(_)) => "io_error",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();

        let response = ErrorResponse {
            message: format_error_chain(&self),
            code: Some(code),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Flatten an error and its `source()` chain into one line.
pub fn format_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_includes_sources() {
        let error = ServiceError::Processing(ProcessingError::DocumentOpen {
            path: "uploads/plan.pdf".to_string(),
            detail: "bad xref".to_string(),
        });
        assert_eq!(
            format_error_chain(&error),
            "Blueprint processing failed: Failed to open document uploads/plan.pdf: bad xref"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ServiceError::JobNotFound {
                pdf_name: "x.pdf".to_string()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::QueueFull { capacity: 4 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ServiceError::Processing(ProcessingError::UnsupportedFormat {
                format: "image/png".to_string()
            })
            .status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }
}
