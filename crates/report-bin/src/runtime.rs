// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway runtime orchestration.
//!
//! Opens the store, wires the API state, runs the HTTP server next to the
//! refresh-token purge task and tears both down on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use report_api::{ApiConfig, ApiServer, AppState, JwtConfig, TokenService};
use report_config::{AppConfig, ConfigError, StoreBackend, StoreConfig};
use report_core::{
    InMemoryReportRepository, InMemorySessionLedger, InMemoryUserRepository, ReportRepository,
    SessionLedger, StoreHealth, UserRepository,
};
use report_store::Database;

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// Stores
// =============================================================================

/// The repositories behind one configured backend.
pub struct Stores {
    /// User accounts.
    pub users: Arc<dyn UserRepository>,
    /// Refresh-token ledger.
    pub ledger: Arc<dyn SessionLedger>,
    /// Reports.
    pub reports: Arc<dyn ReportRepository>,
    /// Readiness probe.
    pub health: Arc<dyn StoreHealth>,
    /// The SQLite pool, when that backend is in use.
    pub database: Option<Database>,
}

impl Stores {
    /// Opens the configured backend.
    pub async fn open(config: &StoreConfig) -> BinResult<Self> {
        match config.backend {
            StoreBackend::Sqlite => {
                let database = Database::connect(&config.options())
                    .await
                    .map_err(|e| BinError::store(format!("Failed to open store: {e}")))?;
                Ok(Self {
                    users: Arc::new(database.users()),
                    ledger: Arc::new(database.ledger()),
                    reports: Arc::new(database.reports()),
                    health: Arc::new(database.clone()),
                    database: Some(database),
                })
            }
            StoreBackend::Memory => {
                warn!("Using the in-memory store; all data is lost on restart");
                let users = Arc::new(InMemoryUserRepository::new());
                Ok(Self {
                    users: users.clone(),
                    ledger: Arc::new(InMemorySessionLedger::new()),
                    reports: Arc::new(InMemoryReportRepository::new()),
                    health: users,
                    database: None,
                })
            }
        }
    }

    /// Closes the SQLite pool, if any.
    pub async fn close(&self) {
        if let Some(database) = &self.database {
            database.close().await;
        }
    }
}

// =============================================================================
// Config mapping
// =============================================================================

/// Maps the file configuration onto the API server's configuration.
pub fn api_config(config: &AppConfig) -> BinResult<ApiConfig> {
    let auth = &config.auth;
    let secret = auth
        .signing_key
        .as_ref()
        .ok_or_else(|| BinError::signing_key("auth.signing_key is not set"))?;

    let access_ttl = i64::try_from(auth.access_ttl_secs)
        .map_err(|_| ConfigError::validation("auth.access_ttl_secs", "out of range"))?;
    let refresh_ttl = i64::try_from(auth.refresh_ttl_secs)
        .map_err(|_| ConfigError::validation("auth.refresh_ttl_secs", "out of range"))?;

    let jwt = JwtConfig::new(secret.expose())
        .with_issuer(auth.issuer.clone())
        .with_ttls(access_ttl, refresh_ttl)
        .with_leeway(auth.leeway_secs)
        .with_revocation_mode(auth.revocation_mode);

    Ok(ApiConfig {
        host: config.server.bind_address,
        port: config.server.port,
        cors_origins: config.server.cors_origins.clone(),
        jwt,
        reports: config.reports.clone(),
        admin_roles: config.authorization.admin_roles.clone(),
        override_roles: config.authorization.override_roles.clone(),
        allow_registration: auth.allow_registration,
        request_timeout_secs: config.server.request_timeout_secs,
        max_body_size: config.server.max_body_size,
    })
}

// =============================================================================
// GatewayRuntime
// =============================================================================

/// Runs the gateway until shutdown is signaled.
pub struct GatewayRuntime {
    config: Arc<AppConfig>,
    shutdown: ShutdownCoordinator,
}

impl GatewayRuntime {
    /// Creates a runtime for an already validated configuration.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// Returns a handle that can stop the runtime.
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Runs the server. `port` overrides the configured port.
    pub async fn run(self, port: Option<u16>) -> BinResult<()> {
        info!(version = report_core::VERSION, "Starting report gateway");

        let mut api = api_config(&self.config)?;
        if let Some(port) = port {
            api = api.with_port(port);
        }

        let stores = Stores::open(&self.config.store).await?;
        let state = AppState::builder()
            .config(api)
            .users(stores.users.clone())
            .ledger(stores.ledger.clone())
            .reports(stores.reports.clone())
            .health(stores.health.clone())
            .hashing(self.config.auth.hashing)
            .build()?;
        state.credentials.warm_up().await?;

        let signals = {
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move { shutdown.listen_for_signals().await })
        };

        let purge = self.config.store.purge_interval().map(|every| {
            tokio::spawn(purge_loop(
                state.tokens.clone(),
                every,
                self.shutdown.clone(),
            ))
        });

        let server = ApiServer::new(state);
        let result = server
            .run_with_shutdown(self.shutdown.shutdown_signal().wait())
            .await;

        // The server may also stop on its own error.
        self.shutdown.initiate_shutdown();
        if let Some(purge) = purge {
            if let Err(e) = purge.await {
                warn!(error = %e, "Purge task ended abnormally");
            }
        }
        signals.abort();
        stores.close().await;

        info!("Report gateway stopped");
        result.map_err(BinError::from)
    }
}

/// Deletes expired refresh records every `every` until shutdown.
async fn purge_loop(tokens: TokenService, every: Duration, shutdown: ShutdownCoordinator) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let stop = shutdown.shutdown_signal().wait();
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = interval.tick() => match tokens.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Purged expired refresh tokens"),
                Err(e) => warn!(error = %e, "Refresh token purge failed"),
            },
        }
    }
    debug!("Purge task stopped");
}

// =============================================================================
// Tests
// =============================================================================
