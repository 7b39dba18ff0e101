//! HTTP API for the Lightscan service.
//!
//! - Service banner, health and Prometheus metrics
//! - Blueprint upload and result polling
//! - Pipeline settings

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::jobs::JobCounts;
use crate::pipeline::ocr::build_recognizer;
use crate::service::LightscanService;

pub mod blueprints;
pub mod settings;
use blueprints::{result_handler, upload_handler};
use settings::{get_settings_handler, update_settings_handler};

/// Room for multipart framing on top of the document itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state
pub struct AppState {
    pub service: Arc<LightscanService>,
    pub metrics: Option<PrometheusHandle>,
}

/// Build the API router
pub fn router(service: Arc<LightscanService>, metrics: Option<PrometheusHandle>) -> Router {
    let max_document_size = service
        .runtime_config
        .static_config
        .limits
        .max_document_size_bytes as usize;
    let state = Arc::new(AppState { service, metrics });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let blueprint_routes = Router::new()
        .route(
            "/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(
                max_document_size.saturating_add(MULTIPART_OVERHEAD_BYTES),
            )),
        )
        .route("/result", get(result_handler));

    let api_routes = Router::new().route(
        "/settings",
        get(get_settings_handler).put(update_settings_handler),
    );

    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/blueprints", blueprint_routes)
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Banner, Health & Metrics ===

#[derive(Serialize)]
struct HomeResponse {
    status: &'static str,
    service: &'static str,
    endpoints: [&'static str; 6],
}

async fn home_handler() -> Json<HomeResponse> {
    Json(HomeResponse {
        status: "alive",
        service: "Emergency Lighting Detection API",
        endpoints: [
            "POST /blueprints/upload",
            "GET /blueprints/result?pdf_name=...",
            "GET /health",
            "GET /metrics",
            "GET /api/settings",
            "PUT /api/settings",
        ],
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: String,
    uptime_seconds: u64,
    ocr_engine: &'static str,
    ocr_available: bool,
    queue_depth: usize,
    queue_capacity: usize,
    jobs: JobCounts,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let recognizer = build_recognizer(&state.service.runtime_config.pipeline().ocr);
    let ocr_engine = recognizer.name();
    // Probing may spawn the OCR executable
    let ocr_available = tokio::task::spawn_blocking(move || recognizer.is_available())
        .await
        .unwrap_or(false);

    Json(HealthResponse {
        status: if ocr_available { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.service.uptime_secs(),
        ocr_engine,
        ocr_available,
        queue_depth: state.service.queue_depth(),
        queue_capacity: state.service.queue_capacity(),
        jobs: state.service.jobs.counts(),
    })
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
