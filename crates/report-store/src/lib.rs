// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # report-store
//!
//! SQLite persistence for the report gateway, built on sqlx.
//!
//! Tables (see `migrations/`):
//!
//! ```text
//! users ──< user_roles
//! refresh_tokens      (session/revocation ledger)
//! reports             (versioned, writes are conditional)
//! ```
//!
//! Every repository call goes through the pool's
//! [`ExponentialBackoff`](report_core::ExponentialBackoff); transient
//! failures are retried and surface as `ServiceUnavailable` once exhausted.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod ledger;
pub mod pool;
pub mod reports;
pub mod users;

pub use error::map_sqlx_error;
pub use ledger::SqliteSessionLedger;
pub use pool::{Database, StoreOptions, MIGRATOR};
pub use reports::SqliteReportRepository;
pub use users::SqliteUserRepository;
