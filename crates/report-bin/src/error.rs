// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Failure classes of the gateway binary and their exit codes.
//!
//! | code | variant            | meaning                                   |
//! |------|--------------------|-------------------------------------------|
//! | 1    | `Config`           | configuration missing, unreadable, invalid|
//! | 2    | `SigningKey`       | token signing key absent or too short     |
//! | 3    | `StoreUnavailable` | store cannot be opened or stays down      |
//! | 4    | `Server`           | HTTP server failed to start or crashed    |
//! | 5    | `Rejected`         | a user-management command was refused     |
//! | 6    | `Usage`            | bad command-line input                    |
//! | 7    | `Io`               | terminal or file I/O failed               |

use report_api::ApiError;
use report_config::ConfigError;
use report_core::CoreError;
use thiserror::Error;

/// Result type alias for report-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that end a gateway command.
#[derive(Debug, Error)]
pub enum BinError {
    /// The configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(ConfigError),

    /// No usable token signing key. The server refuses to start.
    #[error("Signing key rejected: {0}")]
    SigningKey(String),

    /// The store could not be opened, or stayed unavailable after retries.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The HTTP server failed.
    #[error("Server error: {0}")]
    Server(#[from] ApiError),

    /// The credential store refused the command, e.g. a duplicate handle.
    #[error("Rejected: {0}")]
    Rejected(CoreError),

    /// Bad command-line input.
    #[error("Usage error: {0}")]
    Usage(String),

    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// Any of the above, with what was being attempted.
    #[error("{context}: {source}")]
    WithContext {
        /// What was being attempted.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a signing key error.
    pub fn signing_key(msg: impl Into<String>) -> Self {
        Self::SigningKey(msg.into())
    }

    /// Creates a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Creates a usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Creates an I/O error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::SigningKey(_) => 2,
            Self::StoreUnavailable(_) => 3,
            Self::Server(_) => 4,
            Self::Rejected(_) => 5,
            Self::Usage(_) => 6,
            Self::Io(_) => 7,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<ConfigError> for BinError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::SigningKey { message } => Self::SigningKey(message),
            other => Self::Config(other),
        }
    }
}

impl From<CoreError> for BinError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ServiceUnavailable { message } => Self::StoreUnavailable(message),
            other => Self::Rejected(other),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Prints an error and its cause chain to stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports an error and exits with its code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_problems_have_their_own_code() {
        let err = BinError::from(ConfigError::signing_key("must be at least 32 bytes"));
        assert!(matches!(err, BinError::SigningKey(_)));
        assert_eq!(err.exit_code(), 2);

        let err = BinError::from(ConfigError::validation("server.port", "must not be 0"));
        assert!(matches!(err, BinError::Config(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exhausted_store_is_not_a_rejection() {
        let err = BinError::from(CoreError::unavailable("pool timed out"));
        assert!(matches!(err, BinError::StoreUnavailable(_)));
        assert_eq!(err.exit_code(), 3);

        let err = BinError::from(CoreError::conflict("handle taken"));
        assert!(matches!(err, BinError::Rejected(_)));
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_context_keeps_exit_code() {
        let err =
            BinError::from(ConfigError::signing_key("missing")).with_context("Failed to load app.yaml");
        assert_eq!(
            err.to_string(),
            "Failed to load app.yaml: Signing key rejected: missing"
        );
        assert_eq!(err.exit_code(), 2);
        assert_eq!(BinError::usage("no password").exit_code(), 6);
        assert_eq!(BinError::io("stdin closed").exit_code(), 7);
    }
}
