// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection pool setup and migrations.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use report_core::{CoreError, CoreResult, ExponentialBackoff, RetryConfig, StoreHealth};
use serde::{Deserialize, Serialize};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::error::map_sqlx_error;
use crate::{SqliteReportRepository, SqliteSessionLedger, SqliteUserRepository};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// SQLite URL, e.g. `sqlite://report.db` or `sqlite::memory:`.
    #[serde(default = "default_url")]
    pub url: String,

    /// Pool size. Forced to 1 for in-memory databases.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long to wait for a pooled connection.
    #[serde(default = "default_acquire_timeout", rename = "acquire_timeout_ms")]
    #[serde(with = "duration_millis")]
    pub acquire_timeout: Duration,

    /// How long SQLite waits on a locked database before reporting busy.
    #[serde(default = "default_busy_timeout", rename = "busy_timeout_ms")]
    #[serde(with = "duration_millis")]
    pub busy_timeout: Duration,

    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_url() -> String {
    "sqlite://report.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_busy_timeout() -> Duration {
    Duration::from_secs(2)
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_connections: default_max_connections(),
            acquire_timeout: default_acquire_timeout(),
            busy_timeout: default_busy_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

impl StoreOptions {
    /// Options for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        }
    }

    /// Returns `true` if the URL names an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// A migrated SQLite pool plus the retry policy shared by its repositories.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    retry: ExponentialBackoff,
}

impl Database {
    /// Opens the pool and applies migrations.
    pub async fn connect(options: &StoreOptions) -> CoreResult<Self> {
        let memory = options.is_memory();

        let mut connect = SqliteConnectOptions::from_str(&options.url)
            .map_err(|e| CoreError::internal(format!("invalid store url: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(options.busy_timeout);
        if !memory {
            connect = connect.journal_mode(SqliteJournalMode::Wal);
        }

        // Each in-memory connection is its own database; keep exactly one
        // alive for the lifetime of the pool.
        let pool_options = if memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(options.max_connections.max(1))
        }
        .acquire_timeout(options.acquire_timeout);

        let retry = ExponentialBackoff::new(options.retry.clone());
        let pool = retry
            .execute("store.connect", || {
                let pool_options = pool_options.clone();
                let connect = connect.clone();
                async move {
                    pool_options
                        .connect_with(connect)
                        .await
                        .map_err(map_sqlx_error)
                }
            })
            .await?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| CoreError::internal(format!("migration failed: {e}")))?;

        tracing::info!(
            url = %redact_url(&options.url),
            max_connections = if memory { 1 } else { options.max_connections },
            "Store connected"
        );

        Ok(Self { pool, retry })
    }

    /// Opens a private, migrated in-memory database.
    pub async fn in_memory() -> CoreResult<Self> {
        Self::connect(&StoreOptions::in_memory()).await
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns a user repository over this pool.
    pub fn users(&self) -> SqliteUserRepository {
        SqliteUserRepository::new(self.pool.clone(), self.retry.clone())
    }

    /// Returns a session ledger over this pool.
    pub fn ledger(&self) -> SqliteSessionLedger {
        SqliteSessionLedger::new(self.pool.clone(), self.retry.clone())
    }

    /// Returns a report repository over this pool.
    pub fn reports(&self) -> SqliteReportRepository {
        SqliteReportRepository::new(self.pool.clone(), self.retry.clone())
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Store closed");
    }
}

#[async_trait]
impl StoreHealth for Database {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn ping(&self) -> CoreResult<()> {
        let pool = &self.pool;
        self.retry
            .execute("store.ping", || async move {
                sqlx::query("SELECT 1")
                    .execute(pool)
                    .await
                    .map(|_| ())
                    .map_err(map_sqlx_error)
            })
            .await
    }
}

fn redact_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_detection() {
        assert!(StoreOptions::in_memory().is_memory());
        assert!(StoreOptions {
            url: "sqlite:file:test?mode=memory&cache=shared".into(),
            ..Default::default()
        }
        .is_memory());
        assert!(!StoreOptions::default().is_memory());
    }

    #[tokio::test]
    async fn test_connect_and_ping() {
        let db = Database::in_memory().await.unwrap();
        db.ping().await.unwrap();
        assert_eq!(db.backend(), "sqlite");
    }

    #[tokio::test]
    async fn test_file_database_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let options = StoreOptions {
            url: format!("sqlite://{}", dir.path().join("report.db").display()),
            ..Default::default()
        };

        let db = Database::connect(&options).await.unwrap();
        db.close().await;

        let db = Database::connect(&options).await.unwrap();
        db.ping().await.unwrap();
    }
}
