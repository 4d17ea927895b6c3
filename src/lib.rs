pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod guard;
pub mod health;
pub mod metrics;
pub mod server;
pub mod session;
pub mod startup;
pub mod store;

use config::Config;
use health::HealthMonitor;
use metrics_exporter_prometheus::PrometheusHandle;

pub struct AppState {
    pub config: Config,
    pub monitor: HealthMonitor,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let monitor = HealthMonitor::from_config(&config.backend.url, &config.health);
        Self {
            config,
            monitor,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
