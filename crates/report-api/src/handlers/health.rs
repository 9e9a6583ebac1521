// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Health check handlers.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::error::ApiResult;
use crate::response::{ComponentStatus, HealthResponse, ReadinessResponse};
use crate::state::AppState;

/// GET /health
///
/// Liveness. Returns 200 OK while the process serves requests.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse::healthy())
}

/// GET /ready
///
/// Readiness. Pings the store; 503 if it does not answer.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let store = match state.health.ping().await {
        Ok(()) => ComponentStatus {
            name: format!("store:{}", state.health.backend()),
            healthy: true,
            message: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, backend = state.health.backend(), "Store ping failed");
            ComponentStatus {
                name: format!("store:{}", state.health.backend()),
                healthy: false,
                message: Some("store unreachable".to_string()),
            }
        }
    };

    let ready = store.healthy;
    let response = ReadinessResponse {
        ready,
        components: vec![store],
    };

    if ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// GET /metrics
///
/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = state.metrics.render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    ))
}
