// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema.
//!
//! ```text
//! AppConfig
//! ├── server         bind address, port, timeouts, CORS
//! ├── auth           signing key, TTLs, leeway, revocation mode, hashing
//! ├── store          sqlite | memory, pool and retry settings
//! ├── reports        role policy for the report service
//! ├── authorization  override and admin roles
//! └── logging        level and format
//! ```

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use report_core::{HashingConfig, ReportPolicy, RetryConfig, RevocationMode};
use report_store::StoreOptions;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Default API port.
pub const DEFAULT_PORT: u16 = 8080;

/// Minimum signing key length in bytes.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

// =============================================================================
// Root
// =============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// HTTP server.
    #[serde(default)]
    pub server: ServerConfig,

    /// Token issuing and validation.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Persistence.
    #[serde(default)]
    pub store: StoreConfig,

    /// Report service role policy.
    #[serde(default)]
    pub reports: ReportPolicy,

    /// Gate settings.
    #[serde(default)]
    pub authorization: AuthorizationConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validates every section.
    pub fn validate(&self) -> ConfigResult<()> {
        self.server.validate()?;
        self.auth.validate()?;
        self.store.validate()?;
        self.authorization.validate()?;
        validate_roles("reports.create_roles", &self.reports.create_roles)?;
        validate_roles("reports.moderate_roles", &self.reports.moderate_roles)?;
        Ok(())
    }
}

fn validate_roles(field: &str, roles: &[String]) -> ConfigResult<()> {
    if roles.is_empty() {
        return Err(ConfigError::validation(field, "at least one role is required"));
    }
    if let Some(blank) = roles.iter().find(|r| r.trim().is_empty()) {
        return Err(ConfigError::validation(
            field,
            format!("blank role name '{blank}'"),
        ));
    }
    Ok(())
}

// =============================================================================
// Server
// =============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Allowed CORS origins. Empty disables cross-origin access; `*` allows any.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

impl ServerConfig {
    /// Validates the server configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::validation("server.port", "cannot be zero"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "server.request_timeout_secs",
                "cannot be zero",
            ));
        }
        if self.max_body_size == 0 {
            return Err(ConfigError::validation(
                "server.max_body_size",
                "cannot be zero",
            ));
        }
        Ok(())
    }

    /// Returns the request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns the socket address.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: DEFAULT_PORT,
            request_timeout_secs: default_request_timeout(),
            max_body_size: default_max_body_size(),
            cors_origins: Vec::new(),
        }
    }
}

// =============================================================================
// Auth
// =============================================================================

/// A secret that never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretValue(String);

impl SecretValue {
    /// Wraps a secret.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

/// Token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// HS256 signing key. Required, at least 32 bytes.
    #[serde(default, skip_serializing)]
    pub signing_key: Option<SecretValue>,

    /// File holding the signing key. Read at load time when `signing_key`
    /// is unset.
    #[serde(default)]
    pub signing_key_file: Option<PathBuf>,

    /// Token issuer (`iss` claim).
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Access token lifetime in seconds.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,

    /// Accepted clock skew in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,

    /// Whether access tokens are checked against the ledger.
    #[serde(default)]
    pub revocation_mode: RevocationMode,

    /// Argon2id cost.
    #[serde(default)]
    pub hashing: HashingConfig,

    /// Whether `/auth/register` is open.
    #[serde(default = "default_true")]
    pub allow_registration: bool,
}

fn default_issuer() -> String {
    "report-gateway".to_string()
}

fn default_access_ttl() -> u64 {
    15 * 60
}

fn default_refresh_ttl() -> u64 {
    7 * 24 * 60 * 60
}

fn default_leeway() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl AuthConfig {
    /// Validates the auth configuration, including key strength.
    pub fn validate(&self) -> ConfigResult<()> {
        match &self.signing_key {
            None => {
                return Err(ConfigError::signing_key(
                    "auth.signing_key or auth.signing_key_file is required",
                ))
            }
            Some(key) if key.len() < MIN_SIGNING_KEY_LEN => {
                return Err(ConfigError::signing_key(format!(
                    "must be at least {MIN_SIGNING_KEY_LEN} bytes, got {}",
                    key.len()
                )))
            }
            Some(_) => {}
        }

        if self.issuer.trim().is_empty() {
            return Err(ConfigError::validation("auth.issuer", "cannot be empty"));
        }
        if self.access_ttl_secs == 0 {
            return Err(ConfigError::validation(
                "auth.access_ttl_secs",
                "cannot be zero",
            ));
        }
        if self.refresh_ttl_secs <= self.access_ttl_secs {
            return Err(ConfigError::validation(
                "auth.refresh_ttl_secs",
                "must be longer than auth.access_ttl_secs",
            ));
        }
        if self.leeway_secs >= self.access_ttl_secs {
            return Err(ConfigError::validation(
                "auth.leeway_secs",
                "must be shorter than auth.access_ttl_secs",
            ));
        }
        Ok(())
    }

    /// Access token lifetime.
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    /// Refresh token lifetime.
    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key: None,
            signing_key_file: None,
            issuer: default_issuer(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
            leeway_secs: default_leeway(),
            revocation_mode: RevocationMode::default(),
            hashing: HashingConfig::default(),
            allow_registration: true,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite through sqlx.
    #[default]
    Sqlite,
    /// Process memory. Lost on restart.
    Memory,
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Backend.
    #[serde(default)]
    pub backend: StoreBackend,

    /// SQLite URL.
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Pool acquire timeout in milliseconds.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Retry policy for transient store failures.
    #[serde(default)]
    pub retry: RetryConfig,

    /// How often expired refresh tokens are purged, in seconds. Zero disables.
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

fn default_store_url() -> String {
    "sqlite://report.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_busy_timeout_ms() -> u64 {
    2_000
}

fn default_purge_interval() -> u64 {
    3600
}

impl StoreConfig {
    /// Validates the store configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.backend == StoreBackend::Sqlite && !self.url.starts_with("sqlite:") {
            return Err(ConfigError::validation(
                "store.url",
                "must start with 'sqlite:'",
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::validation(
                "store.max_connections",
                "cannot be zero",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::validation(
                "store.retry.max_attempts",
                "cannot be zero",
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(ConfigError::validation(
                "store.retry.jitter",
                "must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }

    /// Connection options for the SQLite backend.
    pub fn options(&self) -> StoreOptions {
        StoreOptions {
            url: self.url.clone(),
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            retry: self.retry.clone(),
        }
    }

    /// Purge interval, or `None` when disabled.
    pub fn purge_interval(&self) -> Option<Duration> {
        (self.purge_interval_secs > 0).then(|| Duration::from_secs(self.purge_interval_secs))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_store_url(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            retry: RetryConfig::default(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

// =============================================================================
// Authorization
// =============================================================================

/// Gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// Roles that pass every requirement. Empty by default.
    #[serde(default)]
    pub override_roles: Vec<String>,

    /// Roles that may change other users' roles or disable them.
    #[serde(default = "default_admin_roles")]
    pub admin_roles: Vec<String>,
}

fn default_admin_roles() -> Vec<String> {
    vec!["admin".to_string()]
}

impl AuthorizationConfig {
    /// Validates the gate configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_roles("authorization.admin_roles", &self.admin_roles)?;
        if self.override_roles.iter().any(|r| r.trim().is_empty()) {
            return Err(ConfigError::validation(
                "authorization.override_roles",
                "blank role name",
            ));
        }
        Ok(())
    }
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            override_roles: Vec::new(),
            admin_roles: default_admin_roles(),
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable.
    #[default]
    Text,
    /// Single-line.
    Compact,
    /// JSON for log shippers.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.signing_key = Some(SecretValue::new("k".repeat(32)));
        config
    }

    #[test]
    fn test_defaults_need_only_a_key() {
        assert!(valid().validate().is_ok());

        let config = AppConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SigningKey { .. })
        ));
    }

    #[test]
    fn test_short_key_rejected() {
        let mut config = valid();
        config.auth.signing_key = Some(SecretValue::new("k".repeat(31)));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SigningKey { .. })
        ));
    }

    #[test]
    fn test_ttl_ordering() {
        let mut config = valid();
        config.auth.refresh_ttl_secs = config.auth.access_ttl_secs;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.auth.leeway_secs = config.auth.access_ttl_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_validation() {
        let mut config = valid();
        config.store.url = "postgres://db".into();
        assert!(config.validate().is_err());

        config.store.backend = StoreBackend::Memory;
        assert!(config.validate().is_ok());

        let mut config = valid();
        config.store.retry.jitter = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_options() {
        let store = StoreConfig {
            url: "sqlite::memory:".into(),
            acquire_timeout_ms: 250,
            ..Default::default()
        };
        let options = store.options();
        assert!(options.is_memory());
        assert_eq!(options.acquire_timeout, Duration::from_millis(250));

        assert_eq!(
            StoreConfig {
                purge_interval_secs: 0,
                ..Default::default()
            }
            .purge_interval(),
            None
        );
    }

    #[test]
    fn test_secret_is_redacted() {
        let config = valid();
        let debug = format!("{:?}", config.auth);
        assert!(!debug.contains("kkkk"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_empty_admin_roles_rejected() {
        let mut config = valid();
        config.authorization.admin_roles.clear();
        assert!(config.validate().is_err());
    }
}
