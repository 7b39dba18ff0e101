//! Running one queued job through the pipeline.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::workers::QueuedJob;
use crate::error::{ProcessingError, ServiceError, format_error_chain};
use crate::jobs::JobState;
use crate::pipeline::ocr::build_recognizer;
use crate::pipeline::{PipelineOutput, process_blueprint};
use crate::service::LightscanService;

impl LightscanService {
    /// Process a single queued job (called by a worker).
    ///
    /// The pipeline runs on the blocking pool with the configuration snapshot
    /// current at dequeue time. On timeout the job is marked failed and the
    /// run is cancelled at its next stage boundary, before any result is
    /// written.
    pub(crate) async fn process_job(&self, queued: QueuedJob) {
        let QueuedJob {
            document_name,
            generation,
            path,
        } = queued;
        info!(job = %document_name, generation, "Processing blueprint");

        let config = self.runtime_config.pipeline();
        let recognizer = build_recognizer(&config.ocr);
        let store = self.artifacts.clone();
        let name = document_name.clone();
        let started = Instant::now();
        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();

        let task = tokio::task::spawn_blocking(move || {
            process_blueprint(&path, &name, &config, recognizer.as_ref(), &store, &run_cancel)
        });

        let outcome = match self.runtime_config.static_config.workers.job_timeout() {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    cancel.cancel();
                    Ok(Err(ProcessingError::Timeout {
                        secs: limit.as_secs(),
                    }))
                }
            },
            None => task.await,
        };

        let outcome = match outcome {
            Ok(result) => result.map_err(ServiceError::from),
            Err(join_error) => Err(ServiceError::Internal {
                message: format!("Processing task failed: {join_error}"),
            }),
        };

        self.finish_job(&document_name, generation, outcome, started);
    }

    /// Record the terminal state of a run, unless a newer upload replaced it.
    pub(crate) fn finish_job(
        &self,
        document_name: &str,
        generation: u64,
        outcome: Result<PipelineOutput, ServiceError>,
        started: Instant,
    ) {
        let elapsed = started.elapsed().as_secs_f64();
        metrics::histogram!("lightscan_job_duration_seconds").record(elapsed);

        let failed = outcome.is_err();
        let state = match outcome {
            Ok(output) => {
                metrics::counter!("lightscan_jobs_completed_total").increment(1);
                metrics::histogram!("lightscan_detections").record(output.detections.len() as f64);
                info!(
                    job = %document_name,
                    detections = output.detections.len(),
                    fixtures = output.summary.total_count(),
                    symbols = output.summary.len(),
                    elapsed_secs = elapsed,
                    "Processing complete"
                );
                JobState::Complete {
                    result: std::sync::Arc::new(output.summary),
                }
            }
            Err(e) => {
                metrics::counter!("lightscan_jobs_failed_total").increment(1);
                let message = format_error_chain(&e);
                error!(job = %document_name, error = %message, "Processing failed");
                JobState::Error { message }
            }
        };

        if !self.jobs.compare_and_set(document_name, generation, state) {
            info!(
                job = %document_name,
                generation,
                "Discarding outcome of a superseded run"
            );
            return;
        }

        // A result left by an earlier run must not outlive this failure
        if failed && let Err(e) = self.artifacts.remove_result(document_name) {
            warn!(job = %document_name, error = %e, "Failed to remove stale result");
        }
    }
}
