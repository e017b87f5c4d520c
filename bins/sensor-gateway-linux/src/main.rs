use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use gateway_core::{AisGatewayStatus, GatewayConfig};
use gateway_providers::{
    AdapterInfo, AdapterRegistration, AdapterRegistry, AisGateway, SensorAdapter,
};
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct AppState {
    gateway: Arc<AisGateway>,
    registry: Arc<RwLock<AdapterRegistry>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,gateway_providers=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Sensor gateway starting...");

    let loaded = GatewayConfig::from_env();
    for fallback in &loaded.fallbacks {
        tracing::warn!(
            "{}={:?} rejected ({}), using default",
            fallback.key,
            fallback.value,
            fallback.error
        );
    }
    let config = loaded.config;
    tracing::info!(
        "Decoder: {} {}",
        config.rtl_ais_path,
        config.decoder_args().join(" ")
    );
    tracing::info!(
        "Forwarding {} to {}",
        config.forward_mode,
        config.signalk_target()
    );
    let health_addr = config.health_addr;

    let gateway = Arc::new(AisGateway::new(config));
    let mut registry = AdapterRegistry::new();
    registry.register(AdapterRegistration::new(
        "AIS (rtl_ais)",
        gateway.clone(),
        true,
    ));
    let registry = Arc::new(RwLock::new(registry));

    let transitions_handle = tokio::spawn(log_transitions(gateway.clone()));
    let status_handle = tokio::spawn(log_status(gateway.clone()));

    let failed = registry.read().await.start_enabled().await;
    for id in &failed {
        tracing::error!("Adapter {} failed to start", id);
    }

    let http_handle = health_addr.map(|addr| {
        let state = AppState {
            gateway: gateway.clone(),
            registry: registry.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = start_http_server(addr, state).await {
                tracing::error!("HTTP server error: {}", e);
            }
        })
    });

    tracing::info!("Sensor gateway ready");

    wait_for_shutdown().await;

    registry.read().await.stop_all().await;
    transitions_handle.abort();
    status_handle.abort();
    if let Some(handle) = http_handle {
        handle.abort();
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Received Ctrl+C, shutting down...");
                    }
                    _ = term.recv() => {
                        tracing::info!("Received SIGTERM, shutting down...");
                    }
                }
                return;
            }
            Err(e) => tracing::warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl+C: {}", e);
    }
    tracing::info!("Shutting down...");
}

/// Log every adapter state change.
async fn log_transitions(gateway: Arc<AisGateway>) {
    let mut subscription = gateway.on_status();
    while let Some(status) = subscription.recv().await {
        match &status.last_error {
            Some(error) => tracing::info!("Adapter {} is {} ({})", gateway.id(), status.state, error),
            None => tracing::info!("Adapter {} is {}", gateway.id(), status.state),
        }
    }
}

/// Periodic one-line summary of the decoder.
async fn log_status(gateway: Arc<AisGateway>) {
    let mut interval = tokio::time::interval(STATUS_LOG_INTERVAL);
    // The first tick fires immediately
    interval.tick().await;
    loop {
        interval.tick().await;
        let status = gateway.status();
        tracing::info!(
            "AIS status: running={} pid={:?} restarts={} errors={} last_nmea={} last_error={}",
            status.running,
            status.pid,
            status.restarts,
            status.errors_count,
            status
                .last_nmea_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
            status.last_error.as_deref().unwrap_or("none"),
        );
    }
}

async fn start_http_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/adapters", get(adapters_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Health endpoint listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// 200 while the decoder runs, 503 otherwise.
async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<AisGatewayStatus>) {
    let status = state.gateway.status();
    let code = if status.running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

async fn adapters_handler(State(state): State<AppState>) -> Json<Vec<AdapterInfo>> {
    Json(state.registry.read().await.list_adapters())
}
