// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # report-config
//!
//! Configuration for the report gateway.
//!
//! - **Multi-Format Support**: YAML, TOML and JSON, chosen by extension
//! - **Environment Overrides**: `REPORT_*` variables and `${VAR:default}`
//!   placeholders
//! - **Fail Fast**: a missing or short signing key is a load error
//!
//! ## Quick Start
//!
//! ```no_run
//! use report_config::load_config;
//!
//! let config = load_config("report.yaml").unwrap();
//! println!("store backend: {:?}", config.store.backend);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, resolve_env_placeholders, ConfigFormat, ConfigLoader};
pub use schema::{
    AppConfig, AuthConfig, AuthorizationConfig, LogFormat, LogLevel, LoggingConfig, SecretValue,
    ServerConfig, StoreBackend, StoreConfig, DEFAULT_PORT, MIN_SIGNING_KEY_LEN,
};
