//! Health endpoint of the update service

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;

struct HealthState {
    deltas_dir: PathBuf,
    metrics: Option<PrometheusHandle>,
}

/// `GET /health` (and `GET /metrics` when a recorder handle is given)
pub fn health_router(deltas_dir: PathBuf, metrics: Option<PrometheusHandle>) -> Router {
    let with_metrics = metrics.is_some();
    let state = Arc::new(HealthState { deltas_dir, metrics });

    let router = Router::new().route("/health", get(health_handler));
    let router = if with_metrics {
        router.route("/metrics", get(metrics_handler))
    } else {
        router
    };
    router.with_state(state)
}

async fn health_handler(State(state): State<Arc<HealthState>>) -> Response {
    match tokio::fs::metadata(&state.deltas_dir).await {
        Ok(meta) if meta.is_dir() => {
            Json(json!({"status": "healthy", "service": "plinko-update"})).into_response()
        }
        _ => (StatusCode::SERVICE_UNAVAILABLE, "Delta directory not ready").into_response(),
    }
}

async fn metrics_handler(State(state): State<Arc<HealthState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
