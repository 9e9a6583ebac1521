// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory repositories.
//!
//! Used by tests and by the `memory` store backend. Each repository guards
//! its map with a single lock, so every method is atomic. No lock is held
//! across an `.await`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::credential::UserRepository;
use crate::error::{CoreError, CoreResult};
use crate::health::StoreHealth;
use crate::ledger::SessionLedger;
use crate::report::{
    Report, ReportDraft, ReportFilter, ReportId, ReportRepository, WriteOutcome,
};
use crate::types::{RefreshRecord, RefreshState, User};

// =============================================================================
// Users
// =============================================================================

/// In-memory [`UserRepository`].
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of users.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Returns `true` if there are no users.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    fn modify<F>(&self, handle: &str, now: DateTime<Utc>, f: F) -> bool
    where
        F: FnOnce(&mut User),
    {
        match self.users.write().get_mut(handle) {
            Some(user) => {
                f(user);
                user.updated_at = now;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find(&self, handle: &str) -> CoreResult<Option<User>> {
        Ok(self.users.read().get(handle).cloned())
    }

    async fn insert(&self, user: &User) -> CoreResult<()> {
        let mut users = self.users.write();
        if users.contains_key(&user.handle) {
            return Err(CoreError::conflict("handle already registered"));
        }
        users.insert(user.handle.clone(), user.clone());
        Ok(())
    }

    async fn update_secret(
        &self,
        handle: &str,
        secret_hash: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        Ok(self.modify(handle, now, |u| u.secret_hash = secret_hash.to_string()))
    }

    async fn update_roles(
        &self,
        handle: &str,
        roles: &[String],
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        Ok(self.modify(handle, now, |u| u.roles = roles.to_vec()))
    }

    async fn set_disabled(
        &self,
        handle: &str,
        disabled: bool,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        Ok(self.modify(handle, now, |u| u.disabled = disabled))
    }
}

#[async_trait]
impl StoreHealth for InMemoryUserRepository {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> CoreResult<()> {
        Ok(())
    }
}

// =============================================================================
// Session ledger
// =============================================================================

/// In-memory [`SessionLedger`].
#[derive(Debug, Default)]
pub struct InMemorySessionLedger {
    records: Mutex<HashMap<String, RefreshRecord>>,
}

impl InMemorySessionLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns `true` if the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl SessionLedger for InMemorySessionLedger {
    async fn record(&self, record: &RefreshRecord) -> CoreResult<()> {
        let mut records = self.records.lock();
        if records.contains_key(&record.id) {
            return Err(CoreError::conflict("refresh token id already recorded"));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn revoke(&self, token_id: &str) -> CoreResult<bool> {
        let mut records = self.records.lock();
        match records.get_mut(token_id) {
            Some(record) if record.state == RefreshState::Active => {
                record.state = RefreshState::Revoked;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all(&self, identity: &str) -> CoreResult<u64> {
        let mut records = self.records.lock();
        let mut count = 0;
        for record in records
            .values_mut()
            .filter(|r| r.identity == identity && r.state == RefreshState::Active)
        {
            record.state = RefreshState::Revoked;
            count += 1;
        }
        Ok(count)
    }

    async fn is_revoked(&self, token_id: &str) -> CoreResult<bool> {
        Ok(self
            .records
            .lock()
            .get(token_id)
            .map_or(true, RefreshRecord::is_revoked))
    }

    async fn rotate(
        &self,
        old_id: &str,
        replacement: &RefreshRecord,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut records = self.records.lock();

        match records.get_mut(old_id) {
            Some(old) if old.state == RefreshState::Active && !old.is_expired(now) => {
                old.state = RefreshState::Rotated;
                old.replaced_by = Some(replacement.id.clone());
            }
            _ => return Err(CoreError::TokenRevoked),
        }

        records.insert(replacement.id.clone(), replacement.clone());
        Ok(())
    }

    async fn find(&self, token_id: &str) -> CoreResult<Option<RefreshRecord>> {
        Ok(self.records.lock().get(token_id).cloned())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        Ok((before - records.len()) as u64)
    }
}

// =============================================================================
// Reports
// =============================================================================

#[derive(Debug, Default)]
struct ReportTable {
    next_id: i64,
    rows: BTreeMap<ReportId, Report>,
}

/// In-memory [`ReportRepository`]. Ids start at 1.
#[derive(Debug, Default)]
pub struct InMemoryReportRepository {
    table: RwLock<ReportTable>,
}

impl InMemoryReportRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportRepository for InMemoryReportRepository {
    async fn find(&self, id: ReportId) -> CoreResult<Option<Report>> {
        Ok(self.table.read().rows.get(&id).cloned())
    }

    async fn list(&self, filter: &ReportFilter) -> CoreResult<Vec<Report>> {
        Ok(self
            .table
            .read()
            .rows
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn insert(&self, draft: ReportDraft) -> CoreResult<Report> {
        let mut table = self.table.write();
        table.next_id += 1;
        let report = draft.into_report(ReportId::new(table.next_id));
        table.rows.insert(report.id, report.clone());
        Ok(report)
    }

    async fn update(&self, report: &Report) -> CoreResult<WriteOutcome> {
        let mut table = self.table.write();
        match table.rows.get_mut(&report.id) {
            Some(row) if row.version != report.version => Ok(WriteOutcome::Stale),
            Some(row) => {
                *row = Report {
                    version: report.version + 1,
                    ..report.clone()
                };
                Ok(WriteOutcome::Written)
            }
            None => Ok(WriteOutcome::Missing),
        }
    }

    async fn delete(&self, id: ReportId) -> CoreResult<bool> {
        Ok(self.table.write().rows.remove(&id).is_some())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn record(id: &str, identity: &str) -> RefreshRecord {
        let now = Utc::now();
        RefreshRecord::active(id, identity, now, now + Duration::days(7))
    }

    #[tokio::test]
    async fn test_ledger_revoke_and_unknown() {
        let ledger = InMemorySessionLedger::new();
        ledger.record(&record("r1", "alice")).await.unwrap();

        assert!(!ledger.is_revoked("r1").await.unwrap());
        assert!(ledger.is_revoked("unknown").await.unwrap());

        assert!(ledger.revoke("r1").await.unwrap());
        assert!(ledger.is_revoked("r1").await.unwrap());
        assert!(!ledger.revoke("r1").await.unwrap());
    }

    #[tokio::test]
    async fn test_ledger_revoke_all_is_scoped() {
        let ledger = InMemorySessionLedger::new();
        ledger.record(&record("a1", "alice")).await.unwrap();
        ledger.record(&record("a2", "alice")).await.unwrap();
        ledger.record(&record("b1", "bob")).await.unwrap();

        assert_eq!(ledger.revoke_all("alice").await.unwrap(), 2);
        assert!(ledger.is_revoked("a2").await.unwrap());
        assert!(!ledger.is_revoked("b1").await.unwrap());
    }

    #[tokio::test]
    async fn test_ledger_rotation_is_single_use() {
        let ledger = InMemorySessionLedger::new();
        let now = Utc::now();
        ledger.record(&record("r1", "alice")).await.unwrap();

        ledger.rotate("r1", &record("r2", "alice"), now).await.unwrap();
        let old = ledger.find("r1").await.unwrap().unwrap();
        assert_eq!(old.state, RefreshState::Rotated);
        assert_eq!(old.replaced_by.as_deref(), Some("r2"));

        assert_eq!(
            ledger.rotate("r1", &record("r3", "alice"), now).await,
            Err(CoreError::TokenRevoked)
        );
        assert!(ledger.find("r3").await.unwrap().is_none());
        assert!(!ledger.is_revoked("r2").await.unwrap());
    }

    #[tokio::test]
    async fn test_ledger_concurrent_rotation_has_one_winner() {
        let ledger = Arc::new(InMemorySessionLedger::new());
        ledger.record(&record("r1", "alice")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .rotate("r1", &record(&format!("n{i}"), "alice"), Utc::now())
                    .await
                    .is_ok()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_ledger_purge_expired() {
        let ledger = InMemorySessionLedger::new();
        let now = Utc::now();
        ledger
            .record(&RefreshRecord::active("old", "alice", now - Duration::days(9), now - Duration::days(2)))
            .await
            .unwrap();
        ledger.record(&record("fresh", "alice")).await.unwrap();

        assert_eq!(ledger.purge_expired(now).await.unwrap(), 1);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_rotate_rejects_expired() {
        let ledger = InMemorySessionLedger::new();
        let now = Utc::now();
        ledger
            .record(&RefreshRecord::active("old", "alice", now - Duration::days(9), now - Duration::days(2)))
            .await
            .unwrap();
        assert_eq!(
            ledger.rotate("old", &record("new", "alice"), now).await,
            Err(CoreError::TokenRevoked)
        );
    }

    #[tokio::test]
    async fn test_user_insert_conflict() {
        let repo = InMemoryUserRepository::new();
        let now = Utc::now();
        let user = User {
            handle: "alice".into(),
            display_name: "Alice".into(),
            secret_hash: "x".into(),
            roles: vec!["viewer".into()],
            disabled: false,
            created_at: now,
            updated_at: now,
        };
        repo.insert(&user).await.unwrap();
        assert!(matches!(repo.insert(&user).await, Err(CoreError::Conflict { .. })));
        assert!(repo.update_roles("alice", &["editor".into()], now).await.unwrap());
        assert!(!repo.update_roles("ghost", &[], now).await.unwrap());
        assert_eq!(
            repo.find("alice").await.unwrap().unwrap().roles,
            vec!["editor".to_string()]
        );
    }
}
