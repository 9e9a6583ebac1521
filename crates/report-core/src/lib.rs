// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # report-core
//!
//! Domain types, authorization and service layer for the report gateway.
//!
//! - **Error**: the authentication/authorization error taxonomy
//! - **Types**: principals, users, roles, refresh-token records
//! - **Gate**: the pure, fail-closed authorization gate
//! - **Credential**: user repository trait, Argon2 hashing, verification
//! - **Ledger**: refresh-token session/revocation ledger trait
//! - **Report**: report model, repository trait and the gated service
//! - **Retry**: bounded retry for store operations
//! - **Metrics**: Prometheus counters
//! - **Memory**: in-memory repositories
//!
//! ## Example
//!
//! ```rust,ignore
//! use report_core::gate::{Action, AuthorizationGate, ResourceDescriptor};
//!
//! let gate = AuthorizationGate::new();
//! let report = ResourceDescriptor::new("report").require(Action::Read, ["editor"]);
//! assert!(gate.authorize(&["editor".into()], &report, Action::Read).is_allowed());
//! assert!(!gate.authorize(&["viewer".into()], &report, Action::Read).is_allowed());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod credential;
pub mod error;
pub mod gate;
pub mod health;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod render;
pub mod report;
pub mod retry;
pub mod types;

pub use credential::{
    CredentialStore, HashingConfig, Registration, SecretHasher, UserRepository, VerifiedIdentity,
};
pub use error::{CoreError, CoreResult, StoreError, StoreResult};
pub use gate::{Action, AuthorizationGate, Decision, DenyReason, ResourceDescriptor};
pub use health::StoreHealth;
pub use ledger::{RevocationMode, SessionLedger};
pub use memory::{InMemoryReportRepository, InMemorySessionLedger, InMemoryUserRepository};
pub use metrics::AuthMetrics;
pub use render::{JsonRenderer, RenderedReport, ReportRenderer};
pub use report::{
    NewReport, RejectionReason, Report, ReportDraft, ReportFilter, ReportId, ReportPolicy,
    ReportRepository, ReportService, ReportStatus, ReportUpdate, StatusChange, Visibility,
    WriteOutcome,
};
pub use retry::{ExponentialBackoff, RetryConfig};
pub use types::{Principal, RefreshRecord, RefreshState, User, DEFAULT_ROLE, OWNER_ROLE};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
