// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! SQLite user repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use report_core::{CoreResult, ExponentialBackoff, StoreError, User, UserRepository};
use sqlx::sqlite::SqlitePool;

use crate::error::{from_unix, map_sqlx_error, to_unix};

#[derive(sqlx::FromRow)]
struct UserRow {
    handle: String,
    display_name: String,
    secret_hash: String,
    disabled: bool,
    created_at: i64,
    updated_at: i64,
    roles: Option<String>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let mut roles = row
            .roles
            .map(|r| r.split(',').map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_default();
        roles.sort();

        Ok(User {
            handle: row.handle,
            display_name: row.display_name,
            secret_hash: row.secret_hash,
            roles,
            disabled: row.disabled,
            created_at: from_unix(row.created_at)?,
            updated_at: from_unix(row.updated_at)?,
        })
    }
}

/// [`UserRepository`] over SQLite.
#[derive(Debug, Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
    retry: ExponentialBackoff,
}

impl SqliteUserRepository {
    /// Creates a repository over a migrated pool.
    pub fn new(pool: SqlitePool, retry: ExponentialBackoff) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find(&self, handle: &str) -> CoreResult<Option<User>> {
        let pool = &self.pool;
        let row = self
            .retry
            .execute("users.find", || async move {
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT u.handle, u.display_name, u.secret_hash, u.disabled,
                           u.created_at, u.updated_at,
                           (SELECT GROUP_CONCAT(r.role, ',')
                              FROM user_roles r
                             WHERE r.handle = u.handle) AS roles
                      FROM users u
                     WHERE u.handle = ?
                    "#,
                )
                .bind(handle)
                .fetch_optional(pool)
                .await
                .map_err(map_sqlx_error)
            })
            .await?;

        Ok(row.map(User::try_from).transpose()?)
    }

    async fn insert(&self, user: &User) -> CoreResult<()> {
        let pool = &self.pool;
        self.retry
            .execute("users.insert", || async move {
                let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

                sqlx::query(
                    r#"
                    INSERT INTO users (handle, display_name, secret_hash, disabled, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&user.handle)
                .bind(&user.display_name)
                .bind(&user.secret_hash)
                .bind(user.disabled)
                .bind(to_unix(user.created_at))
                .bind(to_unix(user.updated_at))
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

                for role in &user.roles {
                    sqlx::query("INSERT INTO user_roles (handle, role) VALUES (?, ?)")
                        .bind(&user.handle)
                        .bind(role)
                        .execute(&mut *tx)
                        .await
                        .map_err(map_sqlx_error)?;
                }

                tx.commit().await.map_err(map_sqlx_error)
            })
            .await
    }

    async fn update_secret(
        &self,
        handle: &str,
        secret_hash: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let pool = &self.pool;
        self.retry
            .execute("users.update_secret", || async move {
                sqlx::query("UPDATE users SET secret_hash = ?, updated_at = ? WHERE handle = ?")
                    .bind(secret_hash)
                    .bind(to_unix(now))
                    .bind(handle)
                    .execute(pool)
                    .await
                    .map(|r| r.rows_affected() == 1)
                    .map_err(map_sqlx_error)
            })
            .await
    }

    async fn update_roles(
        &self,
        handle: &str,
        roles: &[String],
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let pool = &self.pool;
        self.retry
            .execute("users.update_roles", || async move {
                let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

                let updated = sqlx::query("UPDATE users SET updated_at = ? WHERE handle = ?")
                    .bind(to_unix(now))
                    .bind(handle)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();
                if updated == 0 {
                    return Ok(false);
                }

                sqlx::query("DELETE FROM user_roles WHERE handle = ?")
                    .bind(handle)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;

                for role in roles {
                    sqlx::query("INSERT INTO user_roles (handle, role) VALUES (?, ?)")
                        .bind(handle)
                        .bind(role)
                        .execute(&mut *tx)
                        .await
                        .map_err(map_sqlx_error)?;
                }

                tx.commit().await.map_err(map_sqlx_error)?;
                Ok::<_, StoreError>(true)
            })
            .await
    }

    async fn set_disabled(
        &self,
        handle: &str,
        disabled: bool,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let pool = &self.pool;
        self.retry
            .execute("users.set_disabled", || async move {
                sqlx::query("UPDATE users SET disabled = ?, updated_at = ? WHERE handle = ?")
                    .bind(disabled)
                    .bind(to_unix(now))
                    .bind(handle)
                    .execute(pool)
                    .await
                    .map(|r| r.rows_affected() == 1)
                    .map_err(map_sqlx_error)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use report_core::CoreError;

    fn user(handle: &str, roles: &[&str]) -> User {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        User {
            handle: handle.to_string(),
            display_name: handle.to_uppercase(),
            secret_hash: "$argon2id$v=19$m=8,t=1,p=1$c2FsdHNhbHQ$aGFzaA".to_string(),
            roles: roles.iter().map(|s| s.to_string()).collect(),
            disabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.users();

        repo.insert(&user("alice", &["viewer", "editor"])).await.unwrap();
        let found = repo.find("alice").await.unwrap().unwrap();

        assert_eq!(found.handle, "alice");
        assert_eq!(found.roles, vec!["editor".to_string(), "viewer".to_string()]);
        assert!(repo.find("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_handle_is_conflict() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.users();

        repo.insert(&user("alice", &["viewer"])).await.unwrap();
        assert!(matches!(
            repo.insert(&user("alice", &[])).await,
            Err(CoreError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_user_without_roles() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.users();

        repo.insert(&user("bare", &[])).await.unwrap();
        assert!(repo.find("bare").await.unwrap().unwrap().roles.is_empty());
    }

    #[tokio::test]
    async fn test_mutations() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.users();
        let now = Utc::now();

        repo.insert(&user("bob", &["viewer"])).await.unwrap();

        assert!(repo
            .update_roles("bob", &["editor".to_string()], now)
            .await
            .unwrap());
        assert!(repo.update_secret("bob", "new-hash", now).await.unwrap());
        assert!(repo.set_disabled("bob", true, now).await.unwrap());

        let bob = repo.find("bob").await.unwrap().unwrap();
        assert_eq!(bob.roles, vec!["editor".to_string()]);
        assert_eq!(bob.secret_hash, "new-hash");
        assert!(bob.disabled);
        assert_eq!(bob.updated_at.timestamp(), now.timestamp());

        assert!(!repo.update_roles("ghost", &[], now).await.unwrap());
        assert!(!repo.set_disabled("ghost", true, now).await.unwrap());
    }
}
