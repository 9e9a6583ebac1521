// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API handlers for all endpoints.
//!
//! - [`health`]: liveness, readiness and metrics
//! - [`auth`]: login, registration, refresh, logout and password change
//! - [`users`]: role management and account disabling
//! - [`reports`]: gated report access

mod auth;
mod health;
mod reports;
mod users;

pub use auth::*;
pub use health::*;
pub use reports::*;
pub use users::*;
