//! Atlas: background geocoding service with a monitoring endpoint.

use std::sync::Arc;

use anyhow::Context;
use atlas_core::AtlasConfig;
use atlas_geocode::ProviderConfig;
use atlas_runtime::{GeocodingMetrics, GeocodingService, ServiceSettings};
use atlas_store::SqliteTaskRepository;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod logging;
mod routes;
mod state;

use state::AppState;

/// Resolve once SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received"),
        _ = terminate => info!("SIGTERM received"),
    }
}

fn build_registry() -> Registry {
    let registry = Registry::new();

    #[cfg(target_os = "linux")]
    {
        let collector = prometheus::process_collector::ProcessCollector::for_self();
        if let Err(e) = registry.register(Box::new(collector)) {
            warn!("Failed to register process collector: {}", e);
        }
    }

    registry
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AtlasConfig::from_env().context("Failed to load configuration")?;
    logging::init(config.env);

    info!(
        "Starting atlas: env={}, provider={}, workers={}",
        config.env, config.provider_type, config.workers
    );

    let registry = build_registry();
    let metrics = Arc::new(GeocodingMetrics::new(&registry).context("Failed to register metrics")?);

    let repo = Arc::new(
        SqliteTaskRepository::open(&config.db_path)
            .with_context(|| format!("Failed to open database {}", config.db_path.display()))?,
    );

    let provider_config = ProviderConfig::from_settings(
        &config.provider_type,
        config.provider_key.clone(),
        config.provider_rate_limit,
    )?;
    let provider = atlas_geocode::create_provider(&provider_config)
        .context("Failed to create geocoding provider")?;

    let service = GeocodingService::new(
        repo.clone(),
        provider,
        metrics,
        ServiceSettings::from_config(&config),
    );

    let token = CancellationToken::new();

    let app = routes::build_router(Arc::new(AppState::new(repo, registry)));
    let addr = format!("0.0.0.0:{}", config.health_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind monitoring server on {}", addr))?;
    info!("Monitoring server listening on {}", addr);

    let server = tokio::spawn({
        let token = token.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
        }
    });

    let worker = tokio::spawn({
        let token = token.clone();
        async move { service.run(token).await }
    });

    info!("Application started. Press Ctrl+C to stop.");

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = token.cancelled() => {}
    }
    info!("Shutdown signal received. Stopping application...");
    token.cancel();

    if let Err(e) = worker.await {
        error!("Geocoding service task failed: {}", e);
    }
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Monitoring server failed: {}", e),
        Err(e) => error!("Monitoring server task failed: {}", e),
    }

    info!("Application stopped gracefully.");
    Ok(())
}
