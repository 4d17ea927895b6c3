//! Prometheus metrics endpoint and request tracking.
//!
//! This module provides:
//! - A `/metrics` endpoint that returns Prometheus-formatted metrics
//! - Middleware for tracking HTTP request counts and durations on the
//!   local sidecar endpoints
//! - Helper functions to record gateway call outcomes

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::AppState;

// Metric names as constants for consistency
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const GATEWAY_REQUESTS_TOTAL: &str = "gateway_requests_total";
pub const GATEWAY_REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";
pub const GATEWAY_UNAUTHORIZED_TOTAL: &str = "gateway_unauthorized_total";
pub const GATEWAY_NETWORK_FAILURES_TOTAL: &str = "gateway_network_failures_total";
pub const BACKEND_UP: &str = "backend_up";

/// Initialize the Prometheus metrics recorder and return a handle for rendering metrics.
///
/// This should be called once during application startup.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    // Register metric descriptions
    describe_counter!(
        HTTP_REQUESTS_TOTAL,
        "Total number of HTTP requests received on the local endpoints"
    );
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(
        GATEWAY_REQUESTS_TOTAL,
        "Total number of task backend requests by operation and status"
    );
    describe_histogram!(
        GATEWAY_REQUEST_DURATION_SECONDS,
        "Task backend request duration in seconds"
    );
    describe_counter!(
        GATEWAY_UNAUTHORIZED_TOTAL,
        "Total number of 401 responses received from the task backend"
    );
    describe_counter!(
        GATEWAY_NETWORK_FAILURES_TOTAL,
        "Total number of task backend requests that failed at the transport level"
    );
    describe_gauge!(BACKEND_UP, "Whether the last backend health probe succeeded");

    handle
}

/// GET /metrics - Returns Prometheus-formatted metrics.
///
/// This endpoint is accessible without authentication.
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let handle = state.metrics_handle.as_ref();
    match handle {
        Some(h) => (StatusCode::OK, h.render()),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Middleware to track HTTP request metrics.
///
/// Records:
/// - `http_requests_total` counter with method, path, and status labels
/// - `http_request_duration_seconds` histogram with method and path labels
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    // Extract path pattern (use matched path for templates like /api/:id)
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

/// Record one task backend request and its duration.
pub fn record_gateway_request(operation: &'static str, status: u16, duration: Duration) {
    counter!(GATEWAY_REQUESTS_TOTAL, "operation" => operation, "status" => status.to_string())
        .increment(1);
    histogram!(GATEWAY_REQUEST_DURATION_SECONDS, "operation" => operation)
        .record(duration.as_secs_f64());
}

/// Record a 401 received from the task backend.
pub fn record_gateway_unauthorized(operation: &'static str) {
    counter!(GATEWAY_UNAUTHORIZED_TOTAL, "operation" => operation).increment(1);
}

/// Record a transport-level failure talking to the task backend.
pub fn record_gateway_network_failure(operation: &'static str) {
    counter!(GATEWAY_NETWORK_FAILURES_TOTAL, "operation" => operation).increment(1);
}

/// Reflect the outcome of the latest backend health probe.
pub fn set_backend_up(up: bool) {
    gauge!(BACKEND_UP).set(if up { 1.0 } else { 0.0 });
}
