// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration error types for report-config.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors.
///
/// Every variant is fatal at startup: the process exits before binding.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse configuration file.
    #[error("Failed to parse config file '{path}': {message}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Content could not be deserialized.
    #[error("Failed to deserialize configuration: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// File I/O error.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file does not exist.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// File extension is not a supported format.
    #[error("Unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// The offending extension.
        format: String,
    },

    /// An override variable holds an unusable value.
    #[error("Invalid environment variable '{name}': {message}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Error message.
        message: String,
    },

    /// The token signing key is absent or too weak.
    #[error("Invalid signing key: {message}")]
    SigningKey {
        /// Error message.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates an invalid environment variable error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a signing key error.
    pub fn signing_key(message: impl Into<String>) -> Self {
        Self::SigningKey {
            message: message.into(),
        }
    }

    /// Returns `true` for errors in the file itself, as opposed to its
    /// location or environment.
    pub fn is_content_error(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. }
                | Self::Serialization { .. }
                | Self::Validation { .. }
                | Self::SigningKey { .. }
        )
    }
}
