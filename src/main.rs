use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskgate::cli::Cli;
use taskgate::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.command.is_some() {
        // Subcommands report over stdout; keep tracing quiet unless asked
        let log_level = cli.log_level.clone().unwrap_or_else(|| "warn".to_string());
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();

        return taskgate::cli::run_command(&cli).await;
    }

    // Load configuration
    let config = taskgate::cli::effective_config(&cli)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting taskgate v{}", env!("CARGO_PKG_VERSION"));

    // Startup self-checks
    if cli.skip_checks {
        tracing::warn!("Skipping startup self-checks (--skip-checks)");
    } else {
        let report = taskgate::startup::run_startup_checks(&config).await;
        if !report.all_critical_passed {
            anyhow::bail!("Startup aborted: {}", report.summary);
        }
    }

    // Install the Prometheus recorder
    let metrics_handle = taskgate::metrics::init_metrics();

    // Create app state
    let state = Arc::new(AppState::new(config.clone()).with_metrics(metrics_handle));

    // Build the local probe router
    let app = taskgate::server::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Sidecar listening on http://{}", addr);
    tracing::info!("Proxying probes for {}", config.backend.url);
    tracing::info!("Auth service at {}", config.auth.url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
