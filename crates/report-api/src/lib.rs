// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # report-api
//!
//! HTTP API for the report gateway.
//!
//! This crate provides the axum server: token issuing and validation,
//! the bearer-token middleware, user administration and gated report
//! endpoints.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod server;
pub mod state;

pub use auth::{AuthContext, Claims, IssuedTokens, JwtConfig, TokenKind, TokenService};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use server::ApiServer;
pub use state::{AppState, AppStateBuilder};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
