//! Startup self-checks.
//!
//! Verifies the environment before the sidecar starts serving: configured
//! URLs parse, the task backend and auth service answer, and the
//! credential store directory is writable. Only configuration errors are
//! critical; unreachable peers are reported and retried by later probes.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::auth::{AuthBackend, AuthServiceClient, SessionError};
use crate::config::Config;
use crate::health::HealthMonitor;

/// Result of a single startup check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    /// Critical failures abort startup
    pub critical: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            passed: true,
            critical: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn fail(name: &'static str, message: impl Into<String>, critical: bool) -> Self {
        Self {
            name,
            passed: false,
            critical,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Aggregated startup check results
#[derive(Debug, Clone, Serialize)]
pub struct StartupCheckReport {
    pub checks: Vec<CheckResult>,
    pub all_critical_passed: bool,
    pub all_passed: bool,
    pub summary: String,
}

impl StartupCheckReport {
    pub fn new(checks: Vec<CheckResult>) -> Self {
        let all_critical_passed = checks.iter().filter(|c| c.critical).all(|c| c.passed);
        let all_passed = checks.iter().all(|c| c.passed);
        let total = checks.len();
        let passed = checks.iter().filter(|c| c.passed).count();

        let summary = if all_passed {
            format!("All {} startup checks passed", total)
        } else if all_critical_passed {
            format!(
                "{}/{} startup checks passed, continuing with warnings",
                passed, total
            )
        } else {
            format!("{}/{} startup checks passed, critical failure", passed, total)
        };

        Self {
            checks,
            all_critical_passed,
            all_passed,
            summary,
        }
    }
}

/// Run all startup self-checks
pub async fn run_startup_checks(config: &Config) -> StartupCheckReport {
    info!("Running startup self-checks...");

    let checks = vec![
        check_configured_urls(config),
        check_backend_reachable(config).await,
        check_auth_service_reachable(config).await,
        check_storage_writable(config),
    ];

    let report = StartupCheckReport::new(checks);

    for check in &report.checks {
        if check.passed {
            info!(
                check = %check.name,
                message = %check.message,
                "Startup check PASSED"
            );
        } else if check.critical {
            error!(
                check = %check.name,
                message = %check.message,
                details = ?check.details,
                "Startup check FAILED (CRITICAL)"
            );
        } else {
            warn!(
                check = %check.name,
                message = %check.message,
                details = ?check.details,
                "Startup check FAILED (non-critical)"
            );
        }
    }

    info!(
        summary = %report.summary,
        all_passed = report.all_passed,
        "Startup checks completed"
    );

    report
}

/// Both peer URLs must be absolute http(s) URLs.
fn check_configured_urls(config: &Config) -> CheckResult {
    for (label, url) in [("backend", &config.backend.url), ("auth", &config.auth.url)] {
        match reqwest::Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
            Ok(parsed) => {
                return CheckResult::fail(
                    "configured_urls",
                    format!("{} URL has unsupported scheme '{}'", label, parsed.scheme()),
                    true,
                )
                .with_details(url.clone());
            }
            Err(e) => {
                return CheckResult::fail(
                    "configured_urls",
                    format!("{} URL does not parse", label),
                    true,
                )
                .with_details(e.to_string());
            }
        }
    }
    CheckResult::pass("configured_urls", "Backend and auth URLs are well-formed")
}

async fn check_backend_reachable(config: &Config) -> CheckResult {
    let monitor = HealthMonitor::from_config(&config.backend.url, &config.health);
    let report = monitor.check_health().await;

    if report.is_healthy() {
        CheckResult::pass(
            "backend_reachable",
            format!("Task backend answered in {}ms", report.response_time_ms),
        )
    } else {
        CheckResult::fail(
            "backend_reachable",
            "Task backend health probe failed",
            false,
        )
        .with_details(config.backend.url.clone())
    }
}

async fn check_auth_service_reachable(config: &Config) -> CheckResult {
    // An unauthenticated session fetch answers with an empty session when
    // the service is up
    let client = AuthServiceClient::new(config.auth.url.clone(), None);
    match client.fetch_session().await {
        Ok(_) => CheckResult::pass("auth_service_reachable", "Auth service answered"),
        Err(SessionError::Unreachable(details)) => CheckResult::fail(
            "auth_service_reachable",
            "Could not reach the auth service",
            false,
        )
        .with_details(details),
        Err(err) => CheckResult::fail(
            "auth_service_reachable",
            "Auth service answered abnormally",
            false,
        )
        .with_details(err.to_string()),
    }
}

fn check_storage_writable(config: &Config) -> CheckResult {
    let Some(dir) = &config.storage.data_dir else {
        return CheckResult::pass("storage_writable", "In-memory credential store selected");
    };

    let probe = dir.join(".write_test");
    let outcome = std::fs::create_dir_all(dir)
        .and_then(|_| std::fs::write(&probe, b"ok"))
        .and_then(|_| std::fs::remove_file(&probe));

    match outcome {
        Ok(_) => CheckResult::pass(
            "storage_writable",
            format!("Credential store directory {} is writable", dir.display()),
        ),
        Err(e) => CheckResult::fail(
            "storage_writable",
            "Credential store directory is not writable, will fall back to memory",
            false,
        )
        .with_details(e.to_string()),
    }
}
