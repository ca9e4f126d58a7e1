//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vdesc_api::{create_router, metrics, ApiConfig, AppState};
use vdesc_media::FfmpegToolkit;
use vdesc_provider::{build_provider, ProviderConfig};
use vdesc_worker::{PipelineConfig, PipelineOrchestrator};

/// How often expired tasks and results are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // rustls 0.23 needs an explicit process-wide crypto provider
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    init_tracing();
    info!("Starting vdesc-api");

    if let Err(e) = run().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "vdesc=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ApiConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        environment = %config.environment,
        "API config loaded"
    );

    if let Err(e) = FfmpegToolkit::check_binaries() {
        warn!("Media tooling unavailable, analyses will fail: {}", e);
    }

    let provider_config = ProviderConfig::from_env().context("invalid provider configuration")?;
    let provider = build_provider(provider_config).context("failed to build content provider")?;
    info!(provider = provider.name(), "Content analysis provider ready");

    let pipeline_config = PipelineConfig::from_env();
    info!(
        scratch_dir = %pipeline_config.scratch_dir.display(),
        task_ttl_secs = pipeline_config.task_ttl.as_secs(),
        max_tracked_tasks = pipeline_config.max_tracked_tasks,
        "Pipeline config loaded"
    );
    let pipeline = PipelineOrchestrator::new(pipeline_config, Arc::new(FfmpegToolkit::new()), provider)
        .context("failed to initialize pipeline")?;
    let sweeper = pipeline.spawn_sweeper(SWEEP_INTERVAL);

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("failed to install Prometheus recorder")?)
    } else {
        None
    };

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_address()))?;

    let app = create_router(AppState::new(config, pipeline), metrics_handle);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    sweeper.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
