// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application state shared across handlers.

use std::sync::Arc;

use report_core::{
    AuthMetrics, AuthorizationGate, CredentialStore, HashingConfig, JsonRenderer,
    ReportRenderer, ReportRepository, ReportService, SecretHasher, SessionLedger, StoreHealth,
    UserRepository,
};

use crate::auth::TokenService;
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

// =============================================================================
// AppState
// =============================================================================

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: Arc<ApiConfig>,
    /// Token issuing and validation.
    pub tokens: TokenService,
    /// User accounts.
    pub credentials: Arc<CredentialStore>,
    /// Gated report access.
    pub reports: Arc<ReportService>,
    /// Gate for checks outside the report service.
    pub gate: AuthorizationGate,
    /// Store readiness probe.
    pub health: Arc<dyn StoreHealth>,
    /// Auth counters.
    pub metrics: AuthMetrics,
}

impl AppState {
    /// Creates a new app state builder.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

// =============================================================================
// AppStateBuilder
// =============================================================================

/// Builder for constructing AppState.
///
/// The three repositories and the health probe are required; everything
/// else has a default.
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<ApiConfig>,
    users: Option<Arc<dyn UserRepository>>,
    ledger: Option<Arc<dyn SessionLedger>>,
    reports: Option<Arc<dyn ReportRepository>>,
    health: Option<Arc<dyn StoreHealth>>,
    hashing: Option<HashingConfig>,
    renderer: Option<Arc<dyn ReportRenderer>>,
    metrics: Option<AuthMetrics>,
}

impl AppStateBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the user repository.
    pub fn users(mut self, users: Arc<dyn UserRepository>) -> Self {
        self.users = Some(users);
        self
    }

    /// Sets the session ledger.
    pub fn ledger(mut self, ledger: Arc<dyn SessionLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Sets the report repository.
    pub fn reports(mut self, reports: Arc<dyn ReportRepository>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Sets the readiness probe.
    pub fn health(mut self, health: Arc<dyn StoreHealth>) -> Self {
        self.health = Some(health);
        self
    }

    /// Sets the Argon2 parameters.
    pub fn hashing(mut self, hashing: HashingConfig) -> Self {
        self.hashing = Some(hashing);
        self
    }

    /// Sets the report renderer. Defaults to JSON.
    pub fn renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Sets the metrics registry.
    pub fn metrics(mut self, metrics: AuthMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the AppState. Fails on a weak signing key or a missing
    /// repository.
    pub fn build(self) -> ApiResult<AppState> {
        let config = self.config.unwrap_or_default();
        let users = self
            .users
            .ok_or_else(|| ApiError::internal("user repository not set"))?;
        let ledger = self
            .ledger
            .ok_or_else(|| ApiError::internal("session ledger not set"))?;
        let reports = self
            .reports
            .ok_or_else(|| ApiError::internal("report repository not set"))?;
        let health = self
            .health
            .ok_or_else(|| ApiError::internal("health probe not set"))?;

        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => AuthMetrics::new()?,
        };

        let credentials = Arc::new(CredentialStore::new(
            users,
            SecretHasher::new(self.hashing.unwrap_or_default()),
        ));
        let tokens = TokenService::new(
            config.jwt.clone(),
            ledger,
            credentials.clone(),
            metrics.clone(),
        )?;

        let gate = AuthorizationGate::with_override_roles(config.override_roles.clone());
        let renderer: Arc<dyn ReportRenderer> = match self.renderer {
            Some(renderer) => renderer,
            None => Arc::new(JsonRenderer),
        };
        let reports = Arc::new(ReportService::new(
            reports,
            gate.clone(),
            config.reports.clone(),
            renderer,
            metrics.clone(),
        ));

        Ok(AppState {
            config: Arc::new(config),
            tokens,
            credentials,
            reports,
            gate,
            health,
            metrics,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtConfig;
    use report_core::{InMemoryReportRepository, InMemorySessionLedger, InMemoryUserRepository};

    fn builder(secret: &str) -> AppStateBuilder {
        let users = Arc::new(InMemoryUserRepository::new());
        AppState::builder()
            .config(ApiConfig::default().with_jwt(JwtConfig::new(secret)))
            .users(users.clone())
            .ledger(Arc::new(InMemorySessionLedger::new()))
            .reports(Arc::new(InMemoryReportRepository::new()))
            .health(users)
            .hashing(HashingConfig::minimal())
    }

    #[test]
    fn test_app_state_builder() {
        let state = builder("test-secret-key-that-is-long-enough-for-testing")
            .build()
            .unwrap();
        assert!(state.gate.override_roles().is_empty());
        assert_eq!(state.reports.policy(), &state.config.reports);
    }

    #[test]
    fn test_weak_key_refused() {
        assert!(builder("short").build().is_err());
    }

    #[test]
    fn test_missing_repository_refused() {
        let result = AppState::builder()
            .config(ApiConfig::default().with_jwt(JwtConfig::new("k".repeat(32))))
            .build();
        assert!(result.is_err());
    }
}
