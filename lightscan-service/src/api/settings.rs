//! Settings API endpoints for the pipeline configuration.

use axum::{Json, extract::State};
use std::sync::Arc;

use crate::api::AppState;
use crate::config::PipelineConfig;
use crate::error::ServiceError;

/// GET /api/settings - current pipeline configuration
pub async fn get_settings_handler(State(state): State<Arc<AppState>>) -> Json<PipelineConfig> {
    Json(PipelineConfig::clone(&state.service.runtime_config.pipeline()))
}

/// PUT /api/settings - replace the pipeline configuration (hot reload).
///
/// Omitted fields take their defaults. Jobs already running keep their snapshot.
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(pipeline): Json<PipelineConfig>,
) -> Result<Json<PipelineConfig>, ServiceError> {
    state.service.runtime_config.replace_pipeline(pipeline)?;
    Ok(Json(PipelineConfig::clone(
        &state.service.runtime_config.pipeline(),
    )))
}
