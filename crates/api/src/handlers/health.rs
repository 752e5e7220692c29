use crate::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub database: ComponentHealth,
    pub cache: ComponentHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub backend: String,
    pub healthy: bool,
}

/// Health check endpoint. Always 200; `status` is `degraded` when a backing
/// store does not answer.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database_ok = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Database health check failed: {}", e);
            false
        }
    };

    let cache_ok = match state.cache.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Cache health check failed: {}", e);
            false
        }
    };

    let status = if database_ok && cache_ok { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        database: ComponentHealth {
            backend: state.db.backend_name().to_string(),
            healthy: database_ok,
        },
        cache: ComponentHealth {
            backend: state.cache.backend_name().to_string(),
            healthy: cache_ok,
        },
    })
}
