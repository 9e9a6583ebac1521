// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! SQLite report repository.

use async_trait::async_trait;
use report_core::{
    CoreResult, ExponentialBackoff, RejectionReason, Report, ReportDraft, ReportFilter, ReportId,
    ReportRepository, ReportStatus, StoreError, Visibility, WriteOutcome,
};
use sqlx::sqlite::SqlitePool;

use crate::error::{from_unix, map_sqlx_error, to_unix};

const SELECT_REPORT: &str = r#"
    SELECT id, owner, title, detail, status, rejection, visibility,
           read_roles, write_roles, content_ref, created_at, updated_at,
           version
      FROM reports
"#;

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: i64,
    owner: String,
    title: String,
    detail: String,
    status: String,
    rejection: Option<String>,
    visibility: String,
    read_roles: String,
    write_roles: String,
    content_ref: Option<String>,
    created_at: i64,
    updated_at: i64,
    version: i64,
}

fn decode_roles(column: &str, raw: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::query(format!("bad {column}: {e}")))
}

fn encode_roles(roles: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(roles).map_err(|e| StoreError::query(e.to_string()))
}

impl TryFrom<ReportRow> for Report {
    type Error = StoreError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        let status = ReportStatus::parse(&row.status)
            .ok_or_else(|| StoreError::query(format!("unknown status '{}'", row.status)))?;
        let rejection = row
            .rejection
            .as_deref()
            .map(|r| {
                RejectionReason::parse(r)
                    .ok_or_else(|| StoreError::query(format!("unknown rejection '{r}'")))
            })
            .transpose()?;
        let visibility = Visibility::parse(&row.visibility)
            .ok_or_else(|| StoreError::query(format!("unknown visibility '{}'", row.visibility)))?;

        Ok(Report {
            id: ReportId::new(row.id),
            owner: row.owner,
            title: row.title,
            detail: row.detail,
            status,
            rejection,
            visibility,
            read_roles: decode_roles("read_roles", &row.read_roles)?,
            write_roles: decode_roles("write_roles", &row.write_roles)?,
            content_ref: row.content_ref,
            created_at: from_unix(row.created_at)?,
            updated_at: from_unix(row.updated_at)?,
            version: row.version,
        })
    }
}

/// [`ReportRepository`] over SQLite.
#[derive(Debug, Clone)]
pub struct SqliteReportRepository {
    pool: SqlitePool,
    retry: ExponentialBackoff,
}

impl SqliteReportRepository {
    /// Creates a repository over a migrated pool.
    pub fn new(pool: SqlitePool, retry: ExponentialBackoff) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl ReportRepository for SqliteReportRepository {
    async fn find(&self, id: ReportId) -> CoreResult<Option<Report>> {
        let pool = &self.pool;
        let sql = format!("{SELECT_REPORT} WHERE id = ?");
        let sql = sql.as_str();
        let row = self
            .retry
            .execute("reports.find", || async move {
                sqlx::query_as::<_, ReportRow>(sql)
                    .bind(id.get())
                    .fetch_optional(pool)
                    .await
                    .map_err(map_sqlx_error)
            })
            .await?;

        Ok(row.map(Report::try_from).transpose()?)
    }

    async fn list(&self, filter: &ReportFilter) -> CoreResult<Vec<Report>> {
        let pool = &self.pool;
        let sql = format!(
            "{SELECT_REPORT} WHERE (? IS NULL OR owner = ?) AND (? IS NULL OR status = ?) ORDER BY id"
        );
        let sql = sql.as_str();
        let owner = filter.owner.as_deref();
        let status = filter.status.map(|s| s.as_str());

        let rows = self
            .retry
            .execute("reports.list", || async move {
                sqlx::query_as::<_, ReportRow>(sql)
                    .bind(owner)
                    .bind(owner)
                    .bind(status)
                    .bind(status)
                    .fetch_all(pool)
                    .await
                    .map_err(map_sqlx_error)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(Report::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn insert(&self, draft: ReportDraft) -> CoreResult<Report> {
        let pool = &self.pool;
        let read_roles = encode_roles(&draft.read_roles)?;
        let write_roles = encode_roles(&draft.write_roles)?;
        let (draft_ref, read_ref, write_ref) = (&draft, read_roles.as_str(), write_roles.as_str());

        let id = self
            .retry
            .execute("reports.insert", || async move {
                sqlx::query(
                    r#"
                    INSERT INTO reports (owner, title, detail, status, visibility,
                                         read_roles, write_roles, content_ref,
                                         created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&draft_ref.owner)
                .bind(&draft_ref.title)
                .bind(&draft_ref.detail)
                .bind(draft_ref.status.as_str())
                .bind(draft_ref.visibility.as_str())
                .bind(read_ref)
                .bind(write_ref)
                .bind(draft_ref.content_ref.as_deref())
                .bind(to_unix(draft_ref.created_at))
                .bind(to_unix(draft_ref.created_at))
                .execute(pool)
                .await
                .map(|r| r.last_insert_rowid())
                .map_err(map_sqlx_error)
            })
            .await?;

        Ok(draft.into_report(ReportId::new(id)))
    }

    async fn update(&self, report: &Report) -> CoreResult<WriteOutcome> {
        let pool = &self.pool;
        let read_roles = encode_roles(&report.read_roles)?;
        let write_roles = encode_roles(&report.write_roles)?;
        let (read_ref, write_ref) = (read_roles.as_str(), write_roles.as_str());

        self.retry
            .execute("reports.update", || async move {
                let updated = sqlx::query(
                    r#"
                    UPDATE reports
                       SET title = ?, detail = ?, status = ?, rejection = ?,
                           visibility = ?, read_roles = ?, write_roles = ?,
                           content_ref = ?, updated_at = ?, version = version + 1
                     WHERE id = ? AND version = ?
                    "#,
                )
                .bind(&report.title)
                .bind(&report.detail)
                .bind(report.status.as_str())
                .bind(report.rejection.map(|r| r.as_str()))
                .bind(report.visibility.as_str())
                .bind(read_ref)
                .bind(write_ref)
                .bind(report.content_ref.as_deref())
                .bind(to_unix(report.updated_at))
                .bind(report.id.get())
                .bind(report.version)
                .execute(pool)
                .await
                .map_err(map_sqlx_error)?;

                if updated.rows_affected() == 1 {
                    return Ok(WriteOutcome::Written);
                }

                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reports WHERE id = ?)")
                        .bind(report.id.get())
                        .fetch_one(pool)
                        .await
                        .map_err(map_sqlx_error)?;
                Ok(if exists {
                    WriteOutcome::Stale
                } else {
                    WriteOutcome::Missing
                })
            })
            .await
    }

    async fn delete(&self, id: ReportId) -> CoreResult<bool> {
        let pool = &self.pool;
        self.retry
            .execute("reports.delete", || async move {
                sqlx::query("DELETE FROM reports WHERE id = ?")
                    .bind(id.get())
                    .execute(pool)
                    .await
                    .map(|r| r.rows_affected() == 1)
                    .map_err(map_sqlx_error)
            })
            .await
    }
}
