// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API error types and handling.
//!
//! Messages in responses are fixed per status. The detail carried inside an
//! [`ApiError`] is for logs only.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use report_core::CoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// ApiError
// =============================================================================

/// API error type with HTTP status code mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request (400).
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message.
        message: String,
    },

    /// Missing, invalid, expired or revoked token, or bad credentials (401).
    #[error("Unauthorized: {reason}")]
    Unauthorized {
        /// Internal reason, never sent to the client.
        reason: String,
        /// Whether the client presented a token that failed.
        invalid_token: bool,
    },

    /// Denied or missing resource (403).
    #[error("Forbidden: {reason}")]
    Forbidden {
        /// Internal reason, never sent to the client.
        reason: String,
    },

    /// Validation error (422).
    #[error("Validation error: {message}")]
    Validation {
        /// Error message.
        message: String,
    },

    /// Conflict (409).
    #[error("Conflict: {message}")]
    Conflict {
        /// Error message.
        message: String,
    },

    /// Service unavailable (503).
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Error message (for logging, not user-facing).
        message: String,
    },

    /// Internal server error (500).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message (for logging, not user-facing).
        message: String,
    },
}

impl ApiError {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates an unauthorized error for a request without usable credentials.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
            invalid_token: false,
        }
    }

    /// Creates an unauthorized error for a token that failed validation.
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
            invalid_token: true,
        }
    }

    /// Creates a forbidden error.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a service unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for categorization.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "BAD_REQUEST",
            ApiError::Unauthorized { .. } => "UNAUTHORIZED",
            ApiError::Forbidden { .. } => "FORBIDDEN",
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::Conflict { .. } => "CONFLICT",
            ApiError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Returns the message sent to the client.
    ///
    /// Authentication and authorization failures get one fixed message each,
    /// so a response never reveals why a token failed or whether a resource
    /// exists.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::BadRequest { message } => message.clone(),
            ApiError::Unauthorized { .. } => "Authentication required".to_string(),
            ApiError::Forbidden { .. } => "Access denied".to_string(),
            ApiError::Validation { message } => message.clone(),
            ApiError::Conflict { message } => message.clone(),
            ApiError::ServiceUnavailable { .. } => {
                "Service temporarily unavailable".to_string()
            }
            ApiError::Internal { .. } => "Internal server error".to_string(),
        }
    }

    /// Returns `true` if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            ApiError::Internal { .. } | ApiError::ServiceUnavailable { .. }
        )
    }
}

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if self.is_server_error() {
            tracing::error!(
                error = %self,
                error_code = error_code,
                status = %status,
                "Server error occurred"
            );
        } else {
            tracing::debug!(
                error = %self,
                error_code = error_code,
                status = %status,
                "Client error occurred"
            );
        }

        let body = ErrorResponseBody {
            error: ErrorDetails {
                code: error_code.to_string(),
                message: self.user_message(),
            },
        };

        let mut response = (status, Json(body)).into_response();

        if let ApiError::Unauthorized { invalid_token, .. } = &self {
            let challenge = if *invalid_token {
                HeaderValue::from_static("Bearer error=\"invalid_token\"")
            } else {
                HeaderValue::from_static("Bearer")
            };
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, challenge);
        }

        response
    }
}

// =============================================================================
// Error Response Body
// =============================================================================

/// Error response body structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseBody {
    /// Error details.
    pub error: ErrorDetails,
}

/// Error details within the response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

// =============================================================================
// From Implementations
// =============================================================================

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidCredentials => ApiError::unauthorized("invalid credentials"),
            CoreError::MalformedToken
            | CoreError::InvalidSignature
            | CoreError::TokenExpired
            | CoreError::TokenRevoked => ApiError::invalid_token(err.kind()),
            CoreError::Forbidden => ApiError::forbidden("denied"),
            CoreError::NotFound { resource } => ApiError::forbidden(format!("missing {resource}")),
            CoreError::ServiceUnavailable { message } => ApiError::service_unavailable(message),
            CoreError::Conflict { message } => ApiError::conflict(message),
            CoreError::Validation { message } => ApiError::validation(message),
            CoreError::Internal { message } => ApiError::internal(message),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::bad_request(format!("Invalid JSON: {}", err))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::internal(format!("IO error: {}", err))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            ApiError::bad_request("invalid").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::unauthorized("no token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::forbidden("no access").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::validation("invalid field").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::service_unavailable("db").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::internal("crash").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_core_error_mapping() {
        let cases = [
            (CoreError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (CoreError::MalformedToken, StatusCode::UNAUTHORIZED),
            (CoreError::InvalidSignature, StatusCode::UNAUTHORIZED),
            (CoreError::TokenExpired, StatusCode::UNAUTHORIZED),
            (CoreError::TokenRevoked, StatusCode::UNAUTHORIZED),
            (CoreError::Forbidden, StatusCode::FORBIDDEN),
            (CoreError::not_found("report 42"), StatusCode::FORBIDDEN),
            (CoreError::unavailable("pool"), StatusCode::SERVICE_UNAVAILABLE),
            (CoreError::conflict("dup"), StatusCode::CONFLICT),
            (CoreError::validation("short"), StatusCode::UNPROCESSABLE_ENTITY),
            (CoreError::internal("bug"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (core, status) in cases {
            assert_eq!(ApiError::from(core).status_code(), status);
        }
    }

    #[test]
    fn test_denied_and_missing_are_indistinguishable() {
        let denied = ApiError::from(CoreError::Forbidden);
        let missing = ApiError::from(CoreError::not_found("report 42"));

        assert_eq!(denied.status_code(), missing.status_code());
        assert_eq!(denied.error_code(), missing.error_code());
        assert_eq!(denied.user_message(), missing.user_message());
    }

    #[test]
    fn test_token_failures_share_one_message() {
        let messages: Vec<String> = [
            CoreError::MalformedToken,
            CoreError::InvalidSignature,
            CoreError::TokenExpired,
            CoreError::TokenRevoked,
        ]
        .into_iter()
        .map(|e| ApiError::from(e).user_message())
        .collect();
        assert!(messages.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_unauthorized_sets_challenge() {
        let response = ApiError::unauthorized("missing").into_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );

        let response = ApiError::from(CoreError::TokenExpired).into_response();
        assert!(response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("Bearer error="));

        let response = ApiError::forbidden("x").into_response();
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let err = ApiError::internal("sqlite disk I/O error at /var/lib/report.db");
        assert!(!err.user_message().contains("sqlite"));
    }
}
