//! Wildwatch Server
//!
//! Classifies uploaded images, audio clips and camera frames for threats to
//! wildlife, records what it finds and alerts forest rangers by SMS.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};
use wildwatch_server::{create_router, AppState, Cli, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    info!("Starting Wildwatch threat detection service");

    // Load configuration
    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("Temp dir: {:?}", config.paths.temp_dir);
    info!("Evidence dir: {:?}", config.paths.evidence_dir);
    info!("Classifiers: {}", config.classifiers_config);

    // Initialize metrics
    let metrics_handle = init_metrics()?;

    info!("Initializing application state...");
    let state = AppState::new(config, metrics_handle)?;
    info!(
        "Application state initialized (store: {}, sms: {})",
        state.store.backend_name(),
        if state.dispatcher.is_simulated() { "simulated" } else { "twilio" }
    );

    let retention = state.config.retention.clone();
    if retention.sweep_interval_secs > 0 {
        state
            .artifacts
            .spawn_sweeper(retention.temp_max_age(), retention.sweep_interval());
    } else if let Err(e) = state.artifacts.sweep_stale(retention.temp_max_age()).await {
        warn!("Startup temp sweep failed: {}", e);
    }

    let addr: SocketAddr = format!("{}:{}", cli.listen, cli.port).parse()?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("wildwatch=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wildwatch=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use wildwatch_telemetry::metrics::{
        INFERENCE_LATENCY_US, NOTIFICATIONS_TOTAL, REQUESTS_TOTAL, STORE_FAILURES_TOTAL,
        THREATS_TOTAL,
    };

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(REQUESTS_TOTAL, "Analysis requests by source");
    metrics::describe_counter!(THREATS_TOTAL, "Threat verdicts by threat type");
    metrics::describe_counter!(NOTIFICATIONS_TOTAL, "Alert dispatch attempts by outcome");
    metrics::describe_counter!(STORE_FAILURES_TOTAL, "Failed or timed out store calls");
    metrics::describe_histogram!(
        INFERENCE_LATENCY_US,
        metrics::Unit::Microseconds,
        "Model inference latency in microseconds by kind"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
