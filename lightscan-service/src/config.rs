//! Service configuration.
//!
//! Static settings (binding, storage, workers) are read once at startup.
//! Pipeline settings sit behind an `ArcSwap` so the settings API can replace
//! them without a restart; running jobs keep the snapshot they started with.

mod loader;
mod pipeline_config;
mod static_config;

use arc_swap::ArcSwap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::error::{ServiceError, ServiceResult};

pub use pipeline_config::{
    AnnotationConfig, CharSubstitution, Edge, GroupingConfig, OcrConfig, OcrEngineKind,
    PipelineConfig, RasterConfig, RegionSpec, RegionsConfig, RulebookConfig, ShapeConfig,
    SymbolConfig,
};
pub use static_config::{LimitsConfig, ServerConfig, StaticConfig, StorageConfig, WorkerConfig};

/// File under `storage.data_dir` holding pipeline overrides from the settings API
const PIPELINE_OVERRIDES_FILE: &str = "pipeline.json";

/// Combines static config (startup-only) with pipeline config (hot-reloadable via ArcSwap)
pub struct RuntimeConfig {
    pub static_config: StaticConfig,
    pipeline: ArcSwap<PipelineConfig>,
}

impl RuntimeConfig {
    /// Load static and pipeline configuration, applying persisted overrides.
    pub fn load() -> ServiceResult<Self> {
        let static_config = loader::load_static_config()?;

        let overrides_path = static_config.storage.data_dir.join(PIPELINE_OVERRIDES_FILE);
        let pipeline = match loader::load_pipeline_overrides(&overrides_path)? {
            Some(overrides) => {
                info!(path = %overrides_path.display(), "Using persisted pipeline overrides");
                overrides
            }
            None => loader::load_pipeline_config()?,
        };

        Self::new(static_config, pipeline)
    }

    /// Build from already-loaded parts (validates the pipeline section)
    pub fn new(static_config: StaticConfig, pipeline: PipelineConfig) -> ServiceResult<Self> {
        pipeline
            .validate()
            .map_err(|message| ServiceError::Config { message })?;

        Ok(Self {
            static_config,
            pipeline: ArcSwap::from_pointee(pipeline),
        })
    }

    /// Current pipeline configuration snapshot
    pub fn pipeline(&self) -> Arc<PipelineConfig> {
        self.pipeline.load_full()
    }

    /// Validate, persist, and swap in a new pipeline configuration
    pub fn replace_pipeline(&self, pipeline: PipelineConfig) -> ServiceResult<()> {
        pipeline
            .validate()
            .map_err(|message| ServiceError::InvalidRequest { message })?;

        loader::save_pipeline_overrides(&self.overrides_path(), &pipeline)?;
        self.pipeline.store(Arc::new(pipeline));
        info!("Pipeline configuration replaced");
        Ok(())
    }

    fn overrides_path(&self) -> PathBuf {
        self.static_config
            .storage
            .data_dir
            .join(PIPELINE_OVERRIDES_FILE)
    }
}
