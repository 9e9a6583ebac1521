// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Custom extractors for API handlers.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequest, FromRequestParts, Path, Query},
    http::request::Parts,
    Json,
};
use report_core::ReportId;
use serde::de::DeserializeOwned;

use crate::auth::AuthContext;
use crate::error::ApiError;

// =============================================================================
// Auth Extractor
// =============================================================================

/// Extractor for authenticated requests.
///
/// Reads the `AuthContext` the auth middleware stored. Returns 401 if it is
/// absent, which only happens on routes the middleware treats as public.
///
/// ```rust,ignore
/// async fn handler(Auth(ctx): Auth) -> impl IntoResponse {
///     format!("Hello, {}", ctx.identity)
/// }
/// ```
pub struct Auth(pub AuthContext);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Auth)
            .ok_or_else(|| ApiError::unauthorized("no authentication context"))
    }
}

// =============================================================================
// Validated JSON Extractor
// =============================================================================

/// JSON body extractor whose rejections use the API error shape.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(
        req: axum::http::Request<axum::body::Body>,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e.body_text())))?;

        Ok(ValidatedJson(value))
    }
}

// =============================================================================
// Pagination Extractor
// =============================================================================

/// Maximum page size.
pub const MAX_PER_PAGE: u32 = 100;

/// Query parameters for pagination.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PaginationParams {
    /// Page number (1-indexed).
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl PaginationParams {
    /// Number of items to skip.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) as usize * self.limit()
    }

    /// Page size, capped.
    pub fn limit(&self) -> usize {
        self.per_page.min(MAX_PER_PAGE) as usize
    }

    /// Validates the parameters.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.page == 0 {
            return Err(ApiError::validation("page must be greater than 0"));
        }
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(ApiError::validation(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}"
            )));
        }
        Ok(())
    }

    /// Returns one page of `items`.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset())
            .take(self.limit())
            .collect()
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

/// Extractor for pagination parameters.
pub struct Pagination(pub PaginationParams);

impl<S> FromRequestParts<S> for Pagination
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<PaginationParams>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid pagination parameters: {}", e.body_text())))?;

        params.validate()?;
        Ok(Pagination(params))
    }
}

// =============================================================================
// Report ID Extractor
// =============================================================================

/// Extractor for a report id in the path.
pub struct ReportIdPath(pub ReportId);

impl<S> FromRequestParts<S> for ReportIdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::bad_request("Invalid report ID"))?;

        if id <= 0 {
            return Err(ApiError::bad_request("Invalid report ID"));
        }
        Ok(ReportIdPath(ReportId::new(id)))
    }
}

// =============================================================================
// Client IP Extractor
// =============================================================================

/// Extractor for the client IP address.
///
/// Prefers the first `X-Forwarded-For` hop, then the socket peer.
pub struct ClientIp(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse().ok());

        if forwarded.is_some() {
            return Ok(ClientIp(forwarded));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip());
        Ok(ClientIp(peer))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_params() {
        let params = PaginationParams {
            page: 2,
            per_page: 10,
        };

        assert_eq!(params.offset(), 10);
        assert_eq!(params.limit(), 10);
        assert_eq!(params.apply((1..=25).collect()), (11..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_pagination_validation() {
        assert!(PaginationParams::default().validate().is_ok());
        assert!(PaginationParams { page: 0, per_page: 20 }.validate().is_err());
        assert!(PaginationParams { page: 1, per_page: 200 }.validate().is_err());
    }

    #[test]
    fn test_pagination_past_the_end() {
        let params = PaginationParams { page: 5, per_page: 10 };
        assert!(params.apply(vec![1, 2, 3]).is_empty());
    }
}
