// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error hierarchy for the report gateway core.
//!
//! ```text
//! CoreError (root)
//! ├── authentication  - InvalidCredentials, MalformedToken, InvalidSignature,
//! │                     TokenExpired, TokenRevoked
//! ├── authorization   - Forbidden, NotFound
//! ├── availability    - ServiceUnavailable
//! └── request         - Conflict, Validation, Internal
//!
//! StoreError          - raised by repository implementations, folded into
//!                       CoreError once retries are exhausted
//! ```
//!
//! `NotFound` exists so internal logs can tell a missing resource from a
//! denied one. Outward-facing layers must render both the same way.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type alias for repository operations.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// CoreError
// =============================================================================

/// The root error type of the authentication and resource layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Unknown identity, wrong secret or disabled account.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The token could not be decoded structurally.
    #[error("Malformed token")]
    MalformedToken,

    /// The token signature, algorithm or issuer did not verify.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// The token is past its expiry (plus leeway).
    #[error("Token expired")]
    TokenExpired,

    /// The token, or the refresh token it derives from, was revoked.
    #[error("Token revoked")]
    TokenRevoked,

    /// The authorization gate denied the action.
    #[error("Forbidden")]
    Forbidden,

    /// The addressed resource does not exist.
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Resource description, for logs only.
        resource: String,
    },

    /// The backing store is unavailable after bounded retries.
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Failure detail, for logs only.
        message: String,
    },

    /// The request conflicts with the current state.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// The request carried invalid input.
    #[error("Validation failed: {message}")]
    Validation {
        /// Description of the invalid input.
        message: String,
    },

    /// Unexpected failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Failure detail, for logs only.
        message: String,
    },
}

impl CoreError {
    /// Creates a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a service unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` for errors that mean "who are you?".
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidCredentials
                | CoreError::MalformedToken
                | CoreError::InvalidSignature
                | CoreError::TokenExpired
                | CoreError::TokenRevoked
        )
    }

    /// Returns `true` for errors that must look identical from outside.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, CoreError::Forbidden | CoreError::NotFound { .. })
    }

    /// Returns a stable label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidCredentials => "invalid_credentials",
            CoreError::MalformedToken => "malformed_token",
            CoreError::InvalidSignature => "invalid_signature",
            CoreError::TokenExpired => "token_expired",
            CoreError::TokenRevoked => "token_revoked",
            CoreError::Forbidden => "forbidden",
            CoreError::NotFound { .. } => "not_found",
            CoreError::ServiceUnavailable { .. } => "service_unavailable",
            CoreError::Conflict { .. } => "conflict",
            CoreError::Validation { .. } => "validation",
            CoreError::Internal { .. } => "internal",
        }
    }
}

// =============================================================================
// StoreError
// =============================================================================

/// Errors raised by repository implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Transient failure: connection loss, pool timeout, busy database.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Failure detail.
        message: String,
    },

    /// A uniqueness or state precondition failed.
    #[error("Store conflict: {message}")]
    Conflict {
        /// Failure detail.
        message: String,
    },

    /// Any other query failure.
    #[error("Store query failed: {message}")]
    Query {
        /// Failure detail.
        message: String,
    },
}

impl StoreError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Returns `true` if the operation may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable { message } => CoreError::ServiceUnavailable { message },
            StoreError::Conflict { message } => CoreError::Conflict { message },
            StoreError::Query { message } => CoreError::Internal { message },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_folding() {
        let err: CoreError = StoreError::unavailable("pool timed out").into();
        assert!(matches!(err, CoreError::ServiceUnavailable { .. }));

        let err: CoreError = StoreError::conflict("duplicate handle").into();
        assert!(matches!(err, CoreError::Conflict { .. }));

        let err: CoreError = StoreError::query("syntax").into();
        assert!(matches!(err, CoreError::Internal { .. }));
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(StoreError::unavailable("busy").is_retryable());
        assert!(!StoreError::conflict("dup").is_retryable());
        assert!(!StoreError::query("bad").is_retryable());
    }

    #[test]
    fn test_classification() {
        assert!(CoreError::TokenExpired.is_authentication());
        assert!(CoreError::TokenRevoked.is_authentication());
        assert!(!CoreError::Forbidden.is_authentication());

        assert!(CoreError::Forbidden.is_access_denied());
        assert!(CoreError::not_found("report 42").is_access_denied());
        assert_eq!(CoreError::not_found("x").kind(), "not_found");
    }
}
