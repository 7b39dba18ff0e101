//! Configuration loading from files and environment variables.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::error::{ServiceError, ServiceResult};

use super::pipeline_config::PipelineConfig;
use super::static_config::StaticConfig;

/// Internal struct for loading the pipeline section from config sources
#[derive(Debug, Deserialize)]
struct PipelineConfigLoader {
    #[serde(default)]
    pipeline: PipelineConfig,
}

fn builder() -> ServiceResult<Config> {
    Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("LIGHTSCAN")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })
}

/// Load static configuration from file and env vars
pub fn load_static_config() -> ServiceResult<StaticConfig> {
    builder()?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize static config: {}", e),
        })
}

/// Load pipeline configuration from file and env vars (without persisted overrides)
pub fn load_pipeline_config() -> ServiceResult<PipelineConfig> {
    let loader: PipelineConfigLoader =
        builder()?
            .try_deserialize()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to deserialize pipeline config: {}", e),
            })?;
    Ok(loader.pipeline)
}

/// Read a pipeline override file written by the settings API, if present
pub fn load_pipeline_overrides(path: &Path) -> ServiceResult<Option<PipelineConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ServiceError::Config {
        message: format!("Failed to read {}: {}", path.display(), e),
    })?;
    let config = serde_json::from_str(&content).map_err(|e| ServiceError::Config {
        message: format!("Failed to parse {}: {}", path.display(), e),
    })?;
    Ok(Some(config))
}

/// Persist pipeline overrides so they survive a restart
pub fn save_pipeline_overrides(path: &Path, config: &PipelineConfig) -> ServiceResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ServiceError::Config {
            message: format!("Failed to create {}: {}", parent.display(), e),
        })?;
    }

    let json = serde_json::to_string_pretty(config).map_err(|e| ServiceError::Internal {
        message: format!("Failed to serialize pipeline config: {}", e),
    })?;
    std::fs::write(path, json).map_err(|e| ServiceError::Config {
        message: format!("Failed to write {}: {}", path.display(), e),
    })
}
