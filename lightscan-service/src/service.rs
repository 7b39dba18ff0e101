//! Job orchestration around the blueprint pipeline.

mod job_processing;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::RuntimeConfig;
use crate::error::{ProcessingError, ServiceResult};
use crate::jobs::JobRegistry;
use crate::pipeline::artifacts::ArtifactStore;

pub use job_processing::QueuedJob;

/// Main service coordinator
pub struct LightscanService {
    pub runtime_config: Arc<RuntimeConfig>,
    pub jobs: Arc<JobRegistry>,
    pub artifacts: ArtifactStore,
    queue: mpsc::Sender<QueuedJob>,
    queue_rx: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    shutdown: CancellationToken,
    started_at: Instant,
}

impl LightscanService {
    /// Create the service and its storage directories
    pub fn new(runtime_config: Arc<RuntimeConfig>) -> ServiceResult<Self> {
        info!("Initializing Lightscan service");

        let storage = &runtime_config.static_config.storage;
        for dir in [&storage.uploads_dir, &storage.results_dir, &storage.data_dir] {
            std::fs::create_dir_all(dir).map_err(ProcessingError::Io)?;
        }

        let capacity = runtime_config.static_config.workers.queue_capacity.max(1);
        let (queue, queue_rx) = mpsc::channel(capacity);
        let artifacts = ArtifactStore::new(storage.results_dir.clone());

        Ok(Self {
            runtime_config,
            jobs: Arc::new(JobRegistry::new()),
            artifacts,
            queue,
            queue_rx: Arc::new(Mutex::new(queue_rx)),
            shutdown: CancellationToken::new(),
            started_at: Instant::now(),
        })
    }

    /// Jobs waiting for a worker
    pub fn queue_depth(&self) -> usize {
        self.queue.max_capacity() - self.queue.capacity()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.max_capacity()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Token cancelled when the server shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop workers from taking new jobs
    pub fn shutdown(&self) {
        info!("Shutting down job workers");
        self.shutdown.cancel();
    }
}
