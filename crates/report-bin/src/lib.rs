// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # report-bin
//!
//! Command-line entry point for the report gateway.
//!
//! ```text
//!  main.rs ──> cli.rs ──> commands ──┬──> runtime ──> report-api server
//!                                    │        └─────> purge task
//!                                    └──> logging
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the gateway (default command)
//! report-gateway -c /etc/report/report.yaml
//!
//! # Check a configuration file
//! report-gateway validate --show-config
//!
//! # Generate a signing key
//! report-gateway gen-key
//!
//! # Provision a user with explicit roles
//! echo "$PASSWORD" | report-gateway add-user alice --name Alice --roles editor --password-stdin
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{GatewayRuntime, Stores};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
