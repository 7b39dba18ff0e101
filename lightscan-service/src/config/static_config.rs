//! Static configuration that cannot be changed at runtime.
//! These settings affect server binding, storage layout, or worker sizing.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Static configuration that cannot be changed at runtime
#[derive(Debug, Clone, Deserialize)]
pub struct StaticConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_workers")]
    pub workers: WorkerConfig,

    #[serde(default = "default_limits")]
    pub limits: LimitsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Uploaded blueprints are written here as `<pdf_name>`
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    /// Per-job JSON artifacts and annotation images
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Service state (persisted pipeline overrides)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Re-register completed jobs from `result_*.json` files on startup
    #[serde(default = "default_restore_results")]
    pub restore_results: bool,
}

/// Background worker pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Number of jobs processed concurrently
    #[serde(default = "default_worker_count")]
    pub count: usize,

    /// Jobs waiting beyond this are rejected at upload time
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Wall-clock limit per job in seconds (0 disables the limit)
    #[serde(default)]
    pub job_timeout_secs: u64,
}

impl WorkerConfig {
    pub fn job_timeout(&self) -> Option<Duration> {
        (self.job_timeout_secs > 0).then(|| Duration::from_secs(self.job_timeout_secs))
    }
}

/// Size limits
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_document_size")]
    pub max_document_size_bytes: u64,
}

// ==================== Default Value Functions ====================

pub(crate) fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    5000
}

pub(crate) fn default_storage() -> StorageConfig {
    StorageConfig {
        uploads_dir: default_uploads_dir(),
        results_dir: default_results_dir(),
        data_dir: default_data_dir(),
        restore_results: default_restore_results(),
    }
}

pub(crate) fn default_uploads_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

pub(crate) fn default_results_dir() -> PathBuf {
    PathBuf::from("./results")
}

pub(crate) fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_restore_results() -> bool {
    true
}

pub(crate) fn default_workers() -> WorkerConfig {
    WorkerConfig {
        count: default_worker_count(),
        queue_capacity: default_queue_capacity(),
        job_timeout_secs: 0,
    }
}

fn default_worker_count() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    8
}

pub(crate) fn default_limits() -> LimitsConfig {
    LimitsConfig {
        max_document_size_bytes: default_max_document_size(),
    }
}

fn default_max_document_size() -> u64 {
    104_857_600 // 100MB
}
