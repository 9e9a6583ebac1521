// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API server implementation.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::handlers;
use crate::middleware::AuthLayer;
use crate::state::AppState;

// =============================================================================
// ApiServer
// =============================================================================

/// The API server.
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    /// Creates a new API server with the given state.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Returns the shared state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Creates the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let config = &self.state.config;
        let auth = AuthLayer::new(self.state.tokens.clone()).with_default_public_paths();

        let middleware_stack = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.request_timeout(),
            ))
            .layer(create_cors_layer(config))
            .layer(DefaultBodyLimit::max(config.max_body_size))
            .layer(auth);

        Router::new()
            // Health endpoints (public)
            .route("/health", get(handlers::health))
            .route("/ready", get(handlers::ready))
            .route("/metrics", get(handlers::metrics))
            // Auth endpoints
            .route("/api/v1/auth/register", post(handlers::register))
            .route("/api/v1/auth/login", post(handlers::login))
            .route("/api/v1/auth/refresh", post(handlers::refresh))
            .route("/api/v1/auth/logout", post(handlers::logout))
            .route("/api/v1/auth/me", get(handlers::me))
            .route("/api/v1/auth/change-password", post(handlers::change_password))
            // User administration
            .route("/api/v1/users/{handle}/roles", put(handlers::set_user_roles))
            .route("/api/v1/users/{handle}/disable", post(handlers::disable_user))
            // Reports
            .route(
                "/api/v1/reports",
                get(handlers::list_reports).post(handlers::create_report),
            )
            .route(
                "/api/v1/reports/{id}",
                get(handlers::get_report)
                    .put(handlers::update_report)
                    .delete(handlers::delete_report),
            )
            .route(
                "/api/v1/reports/{id}/status",
                post(handlers::change_report_status),
            )
            .route("/api/v1/reports/{id}/render", get(handlers::render_report))
            .layer(middleware_stack)
            .with_state(self.state.clone())
    }

    /// Runs the server until `shutdown_signal` resolves.
    pub async fn run_with_shutdown(
        self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> ApiResult<()> {
        let addr = self.addr();
        let router = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to bind {}: {}", addr, e)))?;

        info!(
            addr = %addr,
            revocation_mode = self.state.tokens.revocation_mode().as_str(),
            "API server listening"
        );

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ApiError::internal(format!("Server error: {}", e)))?;

        info!("API server shutdown complete");
        Ok(())
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.state.config.socket_addr()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Creates the CORS layer from configuration. Unparseable origins are
/// skipped with a warning.
fn create_cors_layer(config: &ApiConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .max_age(Duration::from_secs(3600))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    if config.cors_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use report_core::{
        HashingConfig, InMemoryReportRepository, InMemorySessionLedger, InMemoryUserRepository,
    };
    use tower::ServiceExt;

    use crate::auth::JwtConfig;

    fn server() -> ApiServer {
        let users = Arc::new(InMemoryUserRepository::new());
        let state = AppState::builder()
            .config(
                ApiConfig::default()
                    .with_jwt(JwtConfig::new("test-secret-key-that-is-long-enough")),
            )
            .users(users.clone())
            .ledger(Arc::new(InMemorySessionLedger::new()))
            .reports(Arc::new(InMemoryReportRepository::new()))
            .health(users)
            .hashing(HashingConfig::minimal())
            .build()
            .unwrap();
        ApiServer::new(state)
    }

    #[test]
    fn test_server_addr() {
        assert_eq!(server().addr().port(), 8080);
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = server()
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let response = server()
            .router()
            .oneshot(Request::get("/api/v1/reports").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn test_cors_layer_with_origins() {
        let mut config = ApiConfig::default();
        config.cors_origins = vec!["https://reports.example".into(), "not a header\n".into()];
        let _layer = create_cors_layer(&config);
    }
}
