// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::IssuedTokens;

// =============================================================================
// ApiResponse
// =============================================================================

/// Success envelope for JSON endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Response data.
    pub data: T,
    /// Additional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

impl<T> ApiResponse<T> {
    /// Wraps data.
    pub fn success(data: T) -> Self {
        Self { data, meta: None }
    }

    /// Adds metadata to the response.
    pub fn with_meta(mut self, meta: ResponseMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Pagination metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Total number of visible items.
    pub total: u64,
    /// Page number (1-indexed).
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total pages.
    pub total_pages: u32,
}

impl ResponseMeta {
    /// Creates pagination metadata.
    pub fn pagination(total: u64, page: u32, per_page: u32) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(u64::from(per_page)) as u32
        };
        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

// =============================================================================
// Typed Responses
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: String,
    /// Version string.
    pub version: String,
}

impl HealthResponse {
    /// Creates a healthy response.
    pub fn healthy() -> Self {
        Self {
            status: "ok".to_string(),
            version: crate::VERSION.to_string(),
        }
    }
}

/// Readiness check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Whether the service is ready.
    pub ready: bool,
    /// Component statuses.
    pub components: Vec<ComponentStatus>,
}

/// Status of a system component.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// Component name.
    pub name: String,
    /// Whether the component is healthy.
    pub healthy: bool,
    /// Optional message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Token pair response for login and refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Access token.
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
    /// Token type (always "Bearer").
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_expires_in: i64,
}

impl From<IssuedTokens> for AuthResponse {
    fn from(tokens: IssuedTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: tokens.access_expires_in,
            refresh_expires_in: tokens.refresh_expires_in,
        }
    }
}

/// Identity as seen through the caller's access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    /// User handle.
    pub identity: String,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Roles carried by the token.
    pub roles: Vec<String>,
    /// Ledger id of the current session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Public view of a user account.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    /// User handle.
    pub handle: String,
    /// Display name.
    pub display_name: String,
    /// Roles.
    pub roles: Vec<String>,
    /// Whether the account is disabled.
    pub disabled: bool,
}

impl From<&report_core::User> for UserResponse {
    fn from(user: &report_core::User) -> Self {
        Self {
            handle: user.handle.clone(),
            display_name: user.display_name.clone(),
            roles: user.roles.clone(),
            disabled: user.disabled,
        }
    }
}

/// Outcome of a revocation request.
#[derive(Debug, Serialize, Deserialize)]
pub struct RevocationResponse {
    /// Number of refresh tokens revoked.
    pub revoked: u64,
}

// =============================================================================
// Tests
// =============================================================================
