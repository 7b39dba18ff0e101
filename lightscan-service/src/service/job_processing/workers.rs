//! Background workers draining the job queue.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::service::LightscanService;

/// A job waiting for a worker
#[derive(Debug)]
pub struct QueuedJob {
    pub document_name: String,
    pub generation: u64,
    pub path: PathBuf,
}

impl LightscanService {
    /// Start the configured number of job workers.
    ///
    /// Workers exit once the shutdown token is cancelled; a job already
    /// running is allowed to finish.
    pub fn start_job_workers(service: Arc<LightscanService>) -> Vec<JoinHandle<()>> {
        let count = service.runtime_config.static_config.workers.count.max(1);
        (0..count)
            .map(|worker| {
                let service = service.clone();
                tokio::spawn(async move {
                    info!(worker, "Job worker started");
                    let shutdown = service.shutdown_token();
                    loop {
                        let next = tokio::select! {
                            _ = shutdown.cancelled() => None,
                            job = async { service.queue_rx.lock().await.recv().await } => job,
                        };
                        let Some(job) = next else {
                            break;
                        };
                        debug!(worker, job = %job.document_name, "Job dequeued");
                        service.process_job(job).await;
                    }
                    info!(worker, "Job worker stopped");
                })
            })
            .collect()
    }
}
