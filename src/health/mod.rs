// Health probing for the task backend
//
// Mirrors the upstream service's health and readiness surface: each probe
// hits the backend's corresponding endpoint, times the round trip, and
// produces a report the local sidecar endpoints serve as-is. A degraded
// backend shows up inside the report body, never as a probe-side error.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::client::join_url;
use crate::config::HealthConfig;
use crate::metrics;

/// Service name reported in probe bodies
pub const SERVICE_NAME: &str = "taskgate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadyStatus {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "not ready")]
    NotReady,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub service: String,
    pub timestamp: String,
    pub response_time_ms: u64,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthChecks {
    pub backend_api: HealthStatus,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub status: ReadyStatus,
    pub service: String,
    pub timestamp: String,
    pub response_time_ms: u64,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessChecks {
    pub backend_api: ReadyStatus,
}

impl ReadinessReport {
    pub fn is_ready(&self) -> bool {
        self.status == ReadyStatus::Ready
    }
}

/// Probes the task backend's health and readiness endpoints.
pub struct HealthMonitor {
    client: reqwest::Client,
    backend_url: String,
}

impl HealthMonitor {
    pub fn new(backend_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            backend_url: backend_url.into(),
        }
    }

    pub fn from_config(backend_url: &str, config: &HealthConfig) -> Self {
        Self::new(backend_url, Duration::from_secs(config.probe_timeout_secs))
    }

    /// Probe `{backend}/health` and report the outcome.
    pub async fn check_health(&self) -> HealthReport {
        let (passed, elapsed_ms) = self.probe("health").await;
        metrics::set_backend_up(passed);
        if !passed {
            warn!("Backend health probe failed");
        }

        let status = if passed {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        HealthReport {
            status,
            service: SERVICE_NAME.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            response_time_ms: elapsed_ms,
            checks: HealthChecks {
                backend_api: status,
            },
        }
    }

    /// Probe `{backend}/ready` and report the outcome.
    pub async fn check_ready(&self) -> ReadinessReport {
        let (passed, elapsed_ms) = self.probe("ready").await;

        let status = if passed {
            ReadyStatus::Ready
        } else {
            ReadyStatus::NotReady
        };

        ReadinessReport {
            status,
            service: SERVICE_NAME.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            response_time_ms: elapsed_ms,
            checks: ReadinessChecks {
                backend_api: status,
            },
        }
    }

    /// One timed GET; any transport error or non-2xx counts as a failure.
    async fn probe(&self, path: &str) -> (bool, u64) {
        let url = join_url(&self.backend_url, path);
        let start = Instant::now();

        let passed = match self.client.get(&url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    debug!(url = %url, status = %status, "Backend probe passed");
                    true
                } else {
                    debug!(url = %url, status = %status, "Backend probe returned non-success status");
                    false
                }
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Backend probe failed");
                false
            }
        };

        (passed, start.elapsed().as_millis() as u64)
    }
}
