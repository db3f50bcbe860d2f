//! Health check handlers

use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service name
    pub service: String,

    /// Version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Readiness check response with per-collection document counts
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,

    /// Service name
    pub service: String,

    /// Environment the service runs in
    pub environment: String,

    /// Documents held per collection
    pub collections: BTreeMap<String, usize>,
}

/// Liveness probe
///
/// Always returns 200 OK while the process is serving.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        service: state.config().service.name.clone(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };

    (StatusCode::OK, Json(response))
}

/// Readiness probe
///
/// Ready once every resource collection is registered in the store.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let collections = state.store().counts().await;
    let ready = crate::resources::schemas()
        .iter()
        .all(|schema| collections.contains_key(schema.collection()));

    if !ready {
        tracing::warn!("Readiness check failed: resource collections missing");
    }

    let response = ReadinessResponse {
        ready,
        service: state.config().service.name.clone(),
        environment: state.config().service.environment.clone(),
        collections,
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// `/health` and `/ready`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(readiness))
}
