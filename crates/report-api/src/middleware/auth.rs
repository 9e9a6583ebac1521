// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! JWT authentication middleware.

use std::collections::HashSet;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request},
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};
use uuid::Uuid;

use crate::auth::{AuthContext, TokenService};
use crate::error::ApiError;

/// Paths reachable without a bearer token.
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &[
    "/health",
    "/ready",
    "/metrics",
    "/api/v1/auth/login",
    "/api/v1/auth/register",
    "/api/v1/auth/refresh",
];

// =============================================================================
// AuthLayer
// =============================================================================

/// Layer for bearer-token authentication.
///
/// Requests to non-public paths must carry a valid access token. On success
/// an [`AuthContext`] is inserted into the request extensions.
#[derive(Clone)]
pub struct AuthLayer {
    tokens: TokenService,
    public_paths: Arc<HashSet<String>>,
}

impl AuthLayer {
    /// Creates a new auth layer with no public paths.
    pub fn new(tokens: TokenService) -> Self {
        Self {
            tokens,
            public_paths: Arc::new(HashSet::new()),
        }
    }

    /// Sets the paths that don't require authentication. A trailing `*`
    /// matches by prefix.
    pub fn with_public_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_paths = Arc::new(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Uses [`DEFAULT_PUBLIC_PATHS`].
    pub fn with_default_public_paths(self) -> Self {
        self.with_public_paths(DEFAULT_PUBLIC_PATHS.iter().copied())
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            tokens: self.tokens.clone(),
            public_paths: self.public_paths.clone(),
        }
    }
}

// =============================================================================
// AuthMiddleware
// =============================================================================

/// Middleware for bearer-token authentication.
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    tokens: TokenService,
    public_paths: Arc<HashSet<String>>,
}

impl<S> AuthMiddleware<S> {
    fn is_public_path(&self, path: &str) -> bool {
        if self.public_paths.contains(path) {
            return true;
        }

        self.public_paths.iter().any(|public| {
            public
                .strip_suffix('*')
                .is_some_and(|prefix| path.starts_with(prefix))
        })
    }
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let tokens = self.tokens.clone();
        let is_public = self.is_public_path(req.uri().path());
        // Take the service that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            if is_public {
                return inner.call(req).await;
            }

            let Some(token) = extract_bearer_token(&req) else {
                tracing::debug!(path = %req.uri().path(), "No bearer token provided");
                return Ok(ApiError::unauthorized("no bearer token").into_response());
            };

            let claims = match tokens.validate_access(&token).await {
                Ok(claims) => claims,
                Err(e) => {
                    tracing::debug!(reason = e.kind(), "Access token rejected");
                    return Ok(ApiError::from(e).into_response());
                }
            };

            let client_ip = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip());

            let ctx = AuthContext::from_claims(&claims)
                .with_request_id(Uuid::now_v7())
                .with_client_ip(client_ip);
            req.extensions_mut().insert(ctx);

            inner.call(req).await
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Extracts the bearer token from the Authorization header. The scheme is
/// matched case-insensitively.
pub(crate) fn extract_bearer_token<B>(req: &Request<B>) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut req = Request::builder()
            .uri("/test")
            .body(Body::empty())
            .unwrap();

        assert!(extract_bearer_token(&req).is_none());

        req.headers_mut()
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&req).is_none());

        req.headers_mut()
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_bearer_token(&req).is_none());

        req.headers_mut().insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("bearer mytoken123"),
        );
        assert_eq!(extract_bearer_token(&req), Some("mytoken123".to_string()));
    }
}
