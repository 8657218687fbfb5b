//! Lodestar Artifacts Server Entry Point
//!
//! Bootstraps configuration, wires the document store and upstream clients,
//! optionally loads the store from the repositories and starts the Axum
//! HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use lodestar_api::telemetry::{init_tracing, TelemetryConfig};
use lodestar_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, DbConfig, EngagementApiClient,
    EngagementApiConfig, GitlabClient, GitlabConfig, PgArtifactStore, StoreBackend,
};
use lodestar_core::ArtifactsConfig;
use lodestar_storage::{ArtifactStore, InMemoryArtifactStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env()?;
    let artifacts_config = ArtifactsConfig::from_env();
    artifacts_config
        .validate()
        .map_err(|e| ApiError::invalid_input(e.to_string()))?;

    let store: Arc<dyn ArtifactStore> = match api_config.store_backend {
        StoreBackend::Postgres => {
            let store = PgArtifactStore::from_config(&DbConfig::from_env())?;
            store.ensure_schema().await?;
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory artifact store; contents are lost on restart");
            Arc::new(InMemoryArtifactStore::new())
        }
    };
    let repository = Arc::new(GitlabClient::new(&GitlabConfig::from_env())?);
    let directory = Arc::new(EngagementApiClient::new(&EngagementApiConfig::from_env())?);

    let state = AppState::new(store, repository, directory, artifacts_config);

    if api_config.refresh_on_startup {
        match state.refresh.ensure_populated().await {
            Ok(Some(report)) => tracing::info!(
                total = report.total,
                failures = report.failures.len(),
                "Startup refresh completed"
            ),
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "Startup refresh failed"),
        }
    }

    let app: Router = create_api_router(state, &api_config);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting Lodestar artifacts server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("LODESTAR_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("LODESTAR_API_PORT").ok())
        .unwrap_or_else(|| "8080".to_string());
    let port = port_str.parse::<u16>().map_err(|_| {
        ApiError::invalid_input(format!("Invalid port value: {}", port_str))
    })?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>().map_err(|e| {
        ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
    })
}
