// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! SQLite session/revocation ledger.
//!
//! Every write is a single conditional statement, except rotation, which
//! runs in one transaction. A dropped rotation future rolls back, so the
//! ledger never holds a consumed token without its replacement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use report_core::{
    CoreError, CoreResult, ExponentialBackoff, RefreshRecord, RefreshState, SessionLedger,
    StoreError,
};
use sqlx::sqlite::SqlitePool;

use crate::error::{from_unix, map_sqlx_error, to_unix};

#[derive(sqlx::FromRow)]
struct RefreshRow {
    id: String,
    identity: String,
    issued_at: i64,
    expires_at: i64,
    state: String,
    replaced_by: Option<String>,
}

impl TryFrom<RefreshRow> for RefreshRecord {
    type Error = StoreError;

    fn try_from(row: RefreshRow) -> Result<Self, Self::Error> {
        let state = RefreshState::parse(&row.state)
            .ok_or_else(|| StoreError::query(format!("unknown refresh state '{}'", row.state)))?;
        Ok(RefreshRecord {
            id: row.id,
            identity: row.identity,
            issued_at: from_unix(row.issued_at)?,
            expires_at: from_unix(row.expires_at)?,
            state,
            replaced_by: row.replaced_by,
        })
    }
}

/// [`SessionLedger`] over SQLite.
#[derive(Debug, Clone)]
pub struct SqliteSessionLedger {
    pool: SqlitePool,
    retry: ExponentialBackoff,
}

impl SqliteSessionLedger {
    /// Creates a ledger over a migrated pool.
    pub fn new(pool: SqlitePool, retry: ExponentialBackoff) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl SessionLedger for SqliteSessionLedger {
    async fn record(&self, record: &RefreshRecord) -> CoreResult<()> {
        let pool = &self.pool;
        self.retry
            .execute("ledger.record", || async move {
                sqlx::query(
                    r#"
                    INSERT INTO refresh_tokens (id, identity, issued_at, expires_at, state, replaced_by)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&record.id)
                .bind(&record.identity)
                .bind(to_unix(record.issued_at))
                .bind(to_unix(record.expires_at))
                .bind(record.state.as_str())
                .bind(record.replaced_by.as_deref())
                .execute(pool)
                .await
                .map(|_| ())
                .map_err(map_sqlx_error)
            })
            .await
    }

    async fn revoke(&self, token_id: &str) -> CoreResult<bool> {
        let pool = &self.pool;
        let now = to_unix(Utc::now());
        self.retry
            .execute("ledger.revoke", || async move {
                sqlx::query(
                    r#"
                    UPDATE refresh_tokens
                       SET state = 'revoked', revoked_at = ?
                     WHERE id = ? AND state = 'active'
                    "#,
                )
                .bind(now)
                .bind(token_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected() == 1)
                .map_err(map_sqlx_error)
            })
            .await
    }

    async fn revoke_all(&self, identity: &str) -> CoreResult<u64> {
        let pool = &self.pool;
        let now = to_unix(Utc::now());
        self.retry
            .execute("ledger.revoke_all", || async move {
                sqlx::query(
                    r#"
                    UPDATE refresh_tokens
                       SET state = 'revoked', revoked_at = ?
                     WHERE identity = ? AND state = 'active'
                    "#,
                )
                .bind(now)
                .bind(identity)
                .execute(pool)
                .await
                .map(|r| r.rows_affected())
                .map_err(map_sqlx_error)
            })
            .await
    }

    async fn is_revoked(&self, token_id: &str) -> CoreResult<bool> {
        let pool = &self.pool;
        let state = self
            .retry
            .execute("ledger.is_revoked", || async move {
                sqlx::query_scalar::<_, String>("SELECT state FROM refresh_tokens WHERE id = ?")
                    .bind(token_id)
                    .fetch_optional(pool)
                    .await
                    .map_err(map_sqlx_error)
            })
            .await?;

        Ok(state.as_deref() != Some(RefreshState::Active.as_str()))
    }

    async fn rotate(
        &self,
        old_id: &str,
        replacement: &RefreshRecord,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let pool = &self.pool;
        let rotated = self
            .retry
            .execute("ledger.rotate", || async move {
                let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

                let consumed = sqlx::query(
                    r#"
                    UPDATE refresh_tokens
                       SET state = 'rotated', replaced_by = ?, revoked_at = ?
                     WHERE id = ? AND state = 'active' AND expires_at > ?
                    "#,
                )
                .bind(&replacement.id)
                .bind(to_unix(now))
                .bind(old_id)
                .bind(to_unix(now))
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?
                .rows_affected();

                if consumed != 1 {
                    return Ok(false);
                }

                sqlx::query(
                    r#"
                    INSERT INTO refresh_tokens (id, identity, issued_at, expires_at, state)
                    VALUES (?, ?, ?, ?, 'active')
                    "#,
                )
                .bind(&replacement.id)
                .bind(&replacement.identity)
                .bind(to_unix(replacement.issued_at))
                .bind(to_unix(replacement.expires_at))
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

                tx.commit().await.map_err(map_sqlx_error)?;
                Ok::<_, StoreError>(true)
            })
            .await?;

        if rotated {
            Ok(())
        } else {
            Err(CoreError::TokenRevoked)
        }
    }

    async fn find(&self, token_id: &str) -> CoreResult<Option<RefreshRecord>> {
        let pool = &self.pool;
        let row = self
            .retry
            .execute("ledger.find", || async move {
                sqlx::query_as::<_, RefreshRow>(
                    r#"
                    SELECT id, identity, issued_at, expires_at, state, replaced_by
                      FROM refresh_tokens
                     WHERE id = ?
                    "#,
                )
                .bind(token_id)
                .fetch_optional(pool)
                .await
                .map_err(map_sqlx_error)
            })
            .await?;

        Ok(row.map(RefreshRecord::try_from).transpose()?)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let pool = &self.pool;
        let purged = self
            .retry
            .execute("ledger.purge_expired", || async move {
                sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
                    .bind(to_unix(now))
                    .execute(pool)
                    .await
                    .map(|r| r.rows_affected())
                    .map_err(map_sqlx_error)
            })
            .await?;

        if purged > 0 {
            tracing::info!(purged, "Purged expired refresh tokens");
        }
        Ok(purged)
    }
}
