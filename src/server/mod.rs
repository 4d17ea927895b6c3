//! Local HTTP surface for operators: health, readiness, and metrics.
//!
//! These endpoints proxy probe results for the task backend. They always
//! answer 200; a degraded backend shows up in the report body so that
//! orchestrators can scrape state without treating the sidecar as down.

use axum::{extract::State, middleware, routing::get, Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::health::{HealthReport, ReadinessReport};
use crate::metrics;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/ready", get(ready))
        .route("/metrics", get(metrics::metrics_endpoint))
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /api/health - probes the backend and reports the outcome.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.monitor.check_health().await)
}

/// GET /api/ready - probes the backend's readiness endpoint.
async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadinessReport> {
    Json(state.monitor.check_ready().await)
}
