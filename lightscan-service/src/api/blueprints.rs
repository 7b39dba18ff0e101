//! Blueprint upload and result endpoints.

use axum::{
    Json,
    extract::{Multipart, Query, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ProcessingError, ServiceError};
use crate::jobs::{JobState, JobStatus};
use crate::pipeline::grouping::Summary;

use super::AppState;

#[derive(Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub pdf_name: String,
    pub message: &'static str,
}

#[derive(Deserialize)]
pub struct ResultParams {
    pub pdf_name: Option<String>,
}

#[derive(Serialize)]
pub struct JobResultResponse {
    pub pdf_name: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Summary>,
}

#[derive(Serialize)]
pub struct JobFailedResponse {
    pub error: &'static str,
    pub details: String,
}

/// Body-limit failures surface as 413, anything else as a bad request.
fn multipart_error(error: MultipartError, max: u64) -> ServiceError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        // The stream was cut off at the limit; the real size is unknown
        ProcessingError::FileTooLarge {
            size: max.saturating_add(1),
            max,
        }
        .into()
    } else {
        ServiceError::InvalidRequest {
            message: error.body_text(),
        }
    }
}

/// Upload a blueprint PDF and start processing it
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServiceError> {
    let max = state
        .service
        .runtime_config
        .static_config
        .limits
        .max_document_size_bytes;

    let mut file: Option<(Vec<u8>, String, Option<String>)> = None;
    let mut project_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| multipart_error(e, max))?;
                file = Some((data.to_vec(), filename, content_type));
            }
            "project_id" => {
                let value = field.text().await.map_err(|e| multipart_error(e, max))?;
                if !value.trim().is_empty() {
                    project_id = Some(value.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let (data, filename, content_type) = file.ok_or_else(|| ServiceError::InvalidRequest {
        message: "No file uploaded".to_string(),
    })?;
    if filename.trim().is_empty() {
        return Err(ServiceError::InvalidRequest {
            message: "No file selected".to_string(),
        });
    }

    let job = state
        .service
        .submit_blueprint(&data, &filename, content_type.as_deref(), project_id)?;

    Ok(Json(UploadResponse {
        status: "uploaded",
        pdf_name: job.document_name,
        message: "Processing started in background.",
    }))
}

/// Poll the status or result of a blueprint job
pub async fn result_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResultParams>,
) -> Result<Response, ServiceError> {
    let pdf_name = params
        .pdf_name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ServiceError::InvalidRequest {
            message: "pdf_name is required".to_string(),
        })?;

    let job = state
        .service
        .jobs
        .get(&pdf_name)
        .ok_or_else(|| ServiceError::JobNotFound {
            pdf_name: pdf_name.clone(),
        })?;

    let response = match job.state {
        JobState::InProgress => Json(JobResultResponse {
            pdf_name,
            status: JobStatus::InProgress,
            message: Some("Processing is still in progress. Please try again later."),
            result: None,
        })
        .into_response(),
        JobState::Complete { result } => Json(JobResultResponse {
            pdf_name,
            status: JobStatus::Complete,
            message: None,
            result: Some(Summary::clone(&result)),
        })
        .into_response(),
        JobState::Error { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(JobFailedResponse {
                error: "Processing failed",
                details: message,
            }),
        )
            .into_response(),
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::api::router;
    use crate::api::test_support::{json_body, multipart_body, upload_request};
    use crate::jobs::JobState;
    use crate::pipeline::grouping::Summary;
    use crate::service::test_support::service_in;

    fn result_request(name: &str) -> Request<Body> {
        Request::get(format!("/blueprints/result?pdf_name={name}"))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_then_poll_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path(), 4);
        let app = router(service.clone(), None);

        let body = multipart_body(
            Some(("E101.pdf", "application/pdf", b"%PDF-1.7 test".as_slice())),
            &[("project_id", "hospital-wing")],
        );
        let response = app.clone().oneshot(upload_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "uploaded");
        assert_eq!(json["pdf_name"], "E101.pdf");

        assert_eq!(
            service.jobs.get("E101.pdf").unwrap().project_id.as_deref(),
            Some("hospital-wing")
        );

        let response = app.oneshot(result_request("E101.pdf")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "in_progress");
        assert!(json.get("result").is_none());
    }

    #[tokio::test]
    async fn test_unknown_and_missing_names() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(service_in(dir.path(), 4), None);

        let response = app.clone().oneshot(result_request("nope.pdf")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], "job_not_found");

        let response = app
            .oneshot(
                Request::get("/blueprints/result")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_completed_poll_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path(), 4);
        let app = router(service.clone(), None);

        let job = service
            .submit_blueprint(b"%PDF-1.7", "done.pdf", None, None)
            .unwrap();
        let summary: Summary = serde_json::from_str(
            r#"{"A1": {"count": 2, "description": "2x4 LED Emergency Fixture"}}"#,
        )
        .unwrap();
        service.jobs.compare_and_set(
            "done.pdf",
            job.generation,
            JobState::Complete {
                result: Arc::new(summary),
            },
        );

        let first = json_body(app.clone().oneshot(result_request("done.pdf")).await.unwrap()).await;
        let second = json_body(app.oneshot(result_request("done.pdf")).await.unwrap()).await;

        assert_eq!(first, second);
        assert_eq!(first["status"], "complete");
        assert_eq!(first["result"]["A1"]["count"], 2);
    }

    #[tokio::test]
    async fn test_failed_job_returns_500_with_details() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path(), 4);
        let app = router(service.clone(), None);

        let job = service
            .submit_blueprint(b"%PDF-1.7", "bad.pdf", None, None)
            .unwrap();
        service.jobs.compare_and_set(
            "bad.pdf",
            job.generation,
            JobState::Error {
                message: "Failed to open document".to_string(),
            },
        );

        let response = app.oneshot(result_request("bad.pdf")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["error"], "Processing failed");
        assert_eq!(json["details"], "Failed to open document");
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(service_in(dir.path(), 1), None);

        // No file part
        let response = app
            .clone()
            .oneshot(upload_request(multipart_body(None, &[("project_id", "x")])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Empty filename
        let response = app
            .clone()
            .oneshot(upload_request(multipart_body(
                Some(("", "application/pdf", b"%PDF-1.7".as_slice())),
                &[],
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Not a PDF
        let response = app
            .clone()
            .oneshot(upload_request(multipart_body(
                Some(("notes.txt", "text/plain", b"hello".as_slice())),
                &[],
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        // Fill the single queue slot, then overflow
        let response = app
            .clone()
            .oneshot(upload_request(multipart_body(
                Some(("a.pdf", "application/pdf", b"%PDF-1.7".as_slice())),
                &[],
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(upload_request(multipart_body(
                Some(("b.pdf", "application/pdf", b"%PDF-1.7".as_slice())),
                &[],
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
