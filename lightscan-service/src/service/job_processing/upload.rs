//! Blueprint upload and queueing.

use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

use super::workers::QueuedJob;
use crate::error::{ProcessingError, ServiceError, ServiceResult};
use crate::jobs::Job;
use crate::service::LightscanService;
use crate::storage::{check_document_format, compute_content_hash, sanitize_document_name, save_upload};

impl LightscanService {
    /// Store an uploaded blueprint and queue it for processing.
    ///
    /// The returned job is `in_progress`; clients poll for the result by
    /// document name. A queue slot is reserved before anything is stored, so
    /// a full queue rejects the upload with the registry and the saved
    /// document of any queued run untouched.
    pub fn submit_blueprint(
        &self,
        content: &[u8],
        filename: &str,
        content_type: Option<&str>,
        project_id: Option<String>,
    ) -> ServiceResult<Job> {
        let document_name =
            sanitize_document_name(filename).ok_or_else(|| ServiceError::InvalidRequest {
                message: "No file selected".to_string(),
            })?;

        let max_size = self.runtime_config.static_config.limits.max_document_size_bytes;
        if content.len() as u64 > max_size {
            return Err(ProcessingError::FileTooLarge {
                size: content.len() as u64,
                max: max_size,
            }
            .into());
        }

        check_document_format(content, content_type)?;

        let permit = match self.queue.try_reserve() {
            Ok(permit) => permit,
            Err(e) => {
                metrics::counter!("lightscan_jobs_rejected_total").increment(1);
                return Err(match e {
                    TrySendError::Full(()) => {
                        warn!(job = %document_name, "Job queue full, rejecting upload");
                        ServiceError::QueueFull {
                            capacity: self.queue.max_capacity(),
                        }
                    }
                    TrySendError::Closed(()) => ServiceError::Internal {
                        message: "Job queue is closed".to_string(),
                    },
                });
            }
        };

        let content_hash = compute_content_hash(content);
        let uploads_dir = &self.runtime_config.static_config.storage.uploads_dir;
        let path = save_upload(uploads_dir, &document_name, content)?;

        let (job, previous) = self
            .jobs
            .submit(&document_name, content_hash.clone(), project_id);
        if previous.as_ref().is_some_and(|p| !p.state.is_terminal()) {
            warn!(
                job = %document_name,
                "Re-upload while a previous run is in progress; the older run will be discarded"
            );
        }

        permit.send(QueuedJob {
            document_name: document_name.clone(),
            generation: job.generation,
            path,
        });

        metrics::counter!("lightscan_jobs_submitted_total").increment(1);
        info!(
            job = %document_name,
            generation = job.generation,
            bytes = content.len(),
            hash = %content_hash,
            "Blueprint uploaded and queued"
        );
        Ok(job)
    }
}
