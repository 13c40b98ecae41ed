use axum::http::{header, Method};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use thermo_controller::{
    services::{run_heartbeat, ClimateLoop, SimulatedSensor},
    Config, ConnectionManager, ControllerSynchronizer, HistoryStore,
};

/// Build the CORS layer based on configuration.
///
/// In production mode:
/// - If `CORS_ORIGINS` is set, only those origins are allowed
/// - If `CORS_ORIGINS` is not set, CORS requests are rejected
///
/// In development mode:
/// - If `CORS_ORIGINS` is set, those origins are used
/// - If `CORS_ORIGINS` is not set, permissive CORS is used for convenience
fn build_cors_layer(config: &Config) -> CorsLayer {
    match &config.cors_allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let allowed_origins: Vec<_> = origins
                .iter()
                .filter_map(|origin| {
                    origin.parse().ok().or_else(|| {
                        tracing::warn!("Invalid CORS origin '{}', skipping", origin);
                        None
                    })
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::error!("No valid CORS origins configured, CORS requests will be rejected");
                CorsLayer::new()
            } else {
                tracing::info!(
                    "CORS configured with {} allowed origin(s): {:?}",
                    allowed_origins.len(),
                    origins
                );
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
                    .max_age(std::time::Duration::from_secs(3600))
            }
        }
        _ if config.environment().is_production() => {
            tracing::warn!(
                "CORS_ORIGINS not configured in production mode. \
                 CORS requests will be rejected."
            );
            CorsLayer::new()
        }
        _ => {
            tracing::warn!("Using permissive CORS in development mode");
            CorsLayer::permissive()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thermo_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    if thermo_shared_config::load_dotenv() {
        tracing::debug!("Loaded .env file");
    }

    let config = Config::from_env()?;

    tracing::info!(
        environment = %config.environment(),
        namespace = %config.namespace(),
        "Starting thermostat controller on port {}",
        config.port
    );

    let connections = ConnectionManager::new();
    let sync = ControllerSynchronizer::new(&config, connections);
    let history = HistoryStore::new();
    let cancel = CancellationToken::new();

    let heartbeat = tokio::spawn(run_heartbeat(
        sync.clone(),
        config.heartbeat_interval,
        cancel.clone(),
    ));

    let climate = ClimateLoop::new(
        config.climate,
        sync.clone(),
        history.clone(),
        SimulatedSensor::default(),
    );
    let climate = tokio::spawn(climate.run(cancel.clone()));

    let connections = sync.connections().clone();
    let app = thermo_controller::router(sync, history).layer(build_cors_layer(&config));

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    let shutdown = cancel.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown requested");
        shutdown.cancel();
        // upgraded sockets are not tracked by graceful shutdown
        connections.disconnect_all();
    })
    .await?;

    cancel.cancel();
    let _ = tokio::join!(heartbeat, climate);
    tracing::info!("Controller stopped");

    Ok(())
}
