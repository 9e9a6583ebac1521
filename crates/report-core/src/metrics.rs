// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Prometheus counters for the authentication subsystem.
//!
//! Each [`AuthMetrics`] owns its own registry, so test instances never
//! collide on metric names.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::{CoreError, CoreResult};

/// Authentication and authorization counters.
#[derive(Clone)]
pub struct AuthMetrics {
    registry: Registry,
    tokens_issued: IntCounterVec,
    validation_failures: IntCounterVec,
    authorization_denials: IntCounterVec,
    revocations: IntCounterVec,
    logins: IntCounterVec,
}

impl AuthMetrics {
    /// Creates and registers the counters.
    pub fn new() -> CoreResult<Self> {
        let registry = Registry::new();

        let tokens_issued = counter(
            &registry,
            "auth_tokens_issued_total",
            "Tokens issued, by kind",
            &["kind"],
        )?;
        let validation_failures = counter(
            &registry,
            "auth_token_validation_failures_total",
            "Token validation failures, by reason",
            &["reason"],
        )?;
        let authorization_denials = counter(
            &registry,
            "auth_authorization_denials_total",
            "Authorization gate denials, by reason",
            &["reason"],
        )?;
        let revocations = counter(
            &registry,
            "auth_revocations_total",
            "Refresh token revocations, by scope",
            &["scope"],
        )?;
        let logins = counter(
            &registry,
            "auth_logins_total",
            "Login attempts, by outcome",
            &["outcome"],
        )?;

        Ok(Self {
            registry,
            tokens_issued,
            validation_failures,
            authorization_denials,
            revocations,
            logins,
        })
    }

    /// Counts an issued token (`access` or `refresh`).
    pub fn token_issued(&self, kind: &str) {
        self.tokens_issued.with_label_values(&[kind]).inc();
    }

    /// Counts a failed validation.
    pub fn validation_failed(&self, error: &CoreError) {
        self.validation_failures
            .with_label_values(&[error.kind()])
            .inc();
    }

    /// Counts a gate denial.
    pub fn authorization_denied(&self, reason: &str) {
        self.authorization_denials
            .with_label_values(&[reason])
            .inc();
    }

    /// Counts revoked refresh tokens (`single`, `all`, `rotation`).
    pub fn revoked(&self, scope: &str, count: u64) {
        self.revocations.with_label_values(&[scope]).inc_by(count);
    }

    /// Counts a login attempt (`success` or `failure`).
    pub fn login(&self, outcome: &str) {
        self.logins.with_label_values(&[outcome]).inc();
    }

    /// Returns the current value of a labelled counter, for tests and
    /// health output.
    pub fn value(&self, name: &str, label: &str) -> u64 {
        let vec = match name {
            "auth_tokens_issued_total" => &self.tokens_issued,
            "auth_token_validation_failures_total" => &self.validation_failures,
            "auth_authorization_denials_total" => &self.authorization_denials,
            "auth_revocations_total" => &self.revocations,
            "auth_logins_total" => &self.logins,
            _ => return 0,
        };
        vec.get_metric_with_label_values(&[label])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Renders the registry in the Prometheus text format.
    pub fn render(&self) -> CoreResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| CoreError::internal(format!("metrics encoding failed: {e}")))?;
        String::from_utf8(buffer)
            .map_err(|e| CoreError::internal(format!("metrics are not UTF-8: {e}")))
    }
}

impl std::fmt::Debug for AuthMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMetrics").finish_non_exhaustive()
    }
}

fn counter(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> CoreResult<IntCounterVec> {
    let vec = IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|e| CoreError::internal(format!("invalid metric {name}: {e}")))?;
    registry
        .register(Box::new(vec.clone()))
        .map_err(|e| CoreError::internal(format!("metric {name} registration failed: {e}")))?;
    Ok(vec)
}
