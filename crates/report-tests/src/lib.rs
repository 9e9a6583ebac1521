// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Report Gateway Integration Tests
//!
//! Cross-crate tests for the report gateway, plus the helpers they share.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p report-tests
//!
//! cargo test -p report-tests --test integration_auth
//! cargo test -p report-tests --test integration_api
//! cargo test -p report-tests --test integration_store
//! cargo test -p report-tests --test integration_config
//! ```
//!
//! ## Test Categories
//!
//! - `integration_auth`: issuing, validation, rotation and revocation
//!   through [`TokenService`](report_api::TokenService) on both backends
//! - `integration_api`: the HTTP surface driven with `tower::ServiceExt`
//! - `integration_store`: ledger and repository behavior shared by the
//!   memory and SQLite backends
//! - `integration_config`: file loading and mapping onto the API config
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use report_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let app = TestApp::memory().await;
//!     app.provision(&UserFixture::alice()).await;
//!     let tokens = app.login(&UserFixture::alice()).await;
//!     let response = app.get("/api/v1/auth/me", Some(&tokens.access_token)).await;
//!     assert_eq!(response.status, StatusCode::OK);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::init_test_logging;
    pub use axum::http::StatusCode;
}
