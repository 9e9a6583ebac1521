// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Store Integration Tests
//!
//! Behavior every backend must share, checked against memory and SQLite,
//! plus SQLite persistence across reopen.

use chrono::{Duration, Utc};
use uuid::Uuid;

use report_core::{
    CoreError, RefreshRecord, RefreshState, ReportDraft, ReportFilter, ReportId, ReportRepository,
    ReportStatus, SessionLedger, User, UserRepository, Visibility, WriteOutcome,
};
use report_store::{Database, StoreOptions};
use report_tests::prelude::*;

fn record(identity: &str, ttl_secs: i64) -> RefreshRecord {
    let now = Utc::now();
    RefreshRecord::active(
        Uuid::now_v7().to_string(),
        identity,
        now,
        now + Duration::seconds(ttl_secs),
    )
}

fn user(handle: &str) -> User {
    let now = Utc::now();
    User {
        handle: handle.to_string(),
        display_name: handle.to_string(),
        secret_hash: "$argon2id$v=19$m=8,t=1,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNo".to_string(),
        roles: vec!["viewer".to_string()],
        disabled: false,
        created_at: now,
        updated_at: now,
    }
}

fn draft(owner: &str, title: &str) -> ReportDraft {
    ReportDraft {
        owner: owner.to_string(),
        title: title.to_string(),
        detail: "detail".to_string(),
        status: ReportStatus::Open,
        visibility: Visibility::Restricted,
        read_roles: vec!["owner".to_string()],
        write_roles: vec!["owner".to_string()],
        content_ref: None,
        created_at: Utc::now(),
    }
}

// =============================================================================
// Ledger
// =============================================================================

#[tokio::test]
async fn test_ledger_unknown_id_counts_as_revoked() {
    for backend in Backend::ALL {
        let stores = TestStores::open(backend).await;
        assert!(stores.ledger.is_revoked("never-issued").await.unwrap(), "{backend:?}");
        assert!(!stores.ledger.revoke("never-issued").await.unwrap());
    }
}

#[tokio::test]
async fn test_ledger_rotation_links_records() {
    for backend in Backend::ALL {
        let stores = TestStores::open(backend).await;
        let old = record("alice", 600);
        let new = record("alice", 600);
        stores.ledger.record(&old).await.unwrap();

        stores.ledger.rotate(&old.id, &new, Utc::now()).await.unwrap();

        let stored = stores.ledger.find(&old.id).await.unwrap().unwrap();
        assert_eq!(stored.state, RefreshState::Rotated, "{backend:?}");
        assert_eq!(stored.replaced_by.as_deref(), Some(new.id.as_str()));
        assert!(!stores.ledger.is_revoked(&new.id).await.unwrap());

        let again = stores.ledger.rotate(&old.id, &record("alice", 600), Utc::now()).await;
        assert_eq!(again.unwrap_err(), CoreError::TokenRevoked);
    }
}

#[tokio::test]
async fn test_ledger_rotation_of_expired_record() {
    for backend in Backend::ALL {
        let stores = TestStores::open(backend).await;
        let old = record("alice", 60);
        stores.ledger.record(&old).await.unwrap();

        let later = Utc::now() + Duration::seconds(120);
        let result = stores.ledger.rotate(&old.id, &record("alice", 600), later).await;
        assert_eq!(result.unwrap_err(), CoreError::TokenRevoked, "{backend:?}");
    }
}

#[tokio::test]
async fn test_ledger_revoke_all_is_scoped() {
    for backend in Backend::ALL {
        let stores = TestStores::open(backend).await;
        let a1 = record("alice", 600);
        let a2 = record("alice", 600);
        let b1 = record("bob", 600);
        for r in [&a1, &a2, &b1] {
            stores.ledger.record(r).await.unwrap();
        }
        stores.ledger.revoke(&a1.id).await.unwrap();

        assert_eq!(stores.ledger.revoke_all("alice").await.unwrap(), 1, "{backend:?}");
        assert!(stores.ledger.is_revoked(&a2.id).await.unwrap());
        assert!(!stores.ledger.is_revoked(&b1.id).await.unwrap());
    }
}

#[tokio::test]
async fn test_ledger_purge_expired() {
    for backend in Backend::ALL {
        let stores = TestStores::open(backend).await;
        let short = record("alice", 1);
        let long = record("alice", 600);
        stores.ledger.record(&short).await.unwrap();
        stores.ledger.record(&long).await.unwrap();

        let later = Utc::now() + Duration::seconds(10);
        assert_eq!(stores.ledger.purge_expired(later).await.unwrap(), 1, "{backend:?}");
        assert!(stores.ledger.find(&short.id).await.unwrap().is_none());
        assert!(stores.ledger.find(&long.id).await.unwrap().is_some());
    }
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn test_users_duplicate_handle_conflicts() {
    for backend in Backend::ALL {
        let stores = TestStores::open(backend).await;
        stores.users.insert(&user("alice")).await.unwrap();

        let duplicate = stores.users.insert(&user("alice")).await;
        assert!(
            matches!(duplicate, Err(CoreError::Conflict { .. })),
            "{backend:?}: {duplicate:?}"
        );
    }
}

#[tokio::test]
async fn test_users_updates_report_unknown_handles() {
    for backend in Backend::ALL {
        let stores = TestStores::open(backend).await;
        stores.users.insert(&user("alice")).await.unwrap();
        let now = Utc::now();

        assert!(stores
            .users
            .update_roles("alice", &["editor".to_string()], now)
            .await
            .unwrap());
        assert!(!stores
            .users
            .update_roles("ghost", &["editor".to_string()], now)
            .await
            .unwrap());
        assert!(stores.users.set_disabled("alice", true, now).await.unwrap());

        let alice = stores.users.find("alice").await.unwrap().unwrap();
        assert_eq!(alice.roles, vec!["editor".to_string()], "{backend:?}");
        assert!(alice.disabled);
    }
}

// =============================================================================
// Reports
// =============================================================================

#[tokio::test]
async fn test_reports_crud_and_filter() {
    for backend in Backend::ALL {
        let stores = TestStores::open(backend).await;
        let first = stores.reports.insert(draft("carol", "one")).await.unwrap();
        let second = stores.reports.insert(draft("dave", "two")).await.unwrap();
        assert!(second.id > first.id, "{backend:?}");

        let mut changed = first.clone();
        changed.status = ReportStatus::InProgress;
        assert_eq!(
            stores.reports.update(&changed).await.unwrap(),
            WriteOutcome::Written,
            "{backend:?}"
        );
        assert_eq!(
            stores.reports.update(&first).await.unwrap(),
            WriteOutcome::Stale,
            "{backend:?}"
        );

        let by_owner = stores
            .reports
            .list(&ReportFilter {
                owner: Some("carol".into()),
                status: None,
            })
            .await
            .unwrap();
        assert_eq!(by_owner.len(), 1);
        assert_eq!(by_owner[0].status, ReportStatus::InProgress);

        let open = stores
            .reports
            .list(&ReportFilter {
                owner: None,
                status: Some(ReportStatus::Open),
            })
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].title, "two");

        assert!(stores.reports.delete(first.id).await.unwrap());
        assert!(!stores.reports.delete(first.id).await.unwrap());
        assert!(stores.reports.find(first.id).await.unwrap().is_none());
        assert_eq!(
            stores.reports.update(&changed).await.unwrap(),
            WriteOutcome::Missing,
            "{backend:?}"
        );
        assert!(stores
            .reports
            .find(ReportId::new(424242))
            .await
            .unwrap()
            .is_none());
    }
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_sqlite_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let options = StoreOptions {
        url: format!("sqlite://{}", dir.path().join("report.db").display()),
        ..StoreOptions::default()
    };
    let session = record("alice", 600);

    {
        let db = Database::connect(&options).await.unwrap();
        db.users().insert(&user("alice")).await.unwrap();
        db.ledger().record(&session).await.unwrap();
        db.ledger().revoke(&session.id).await.unwrap();
        db.close().await;
    }

    let db = Database::connect(&options).await.unwrap();
    assert!(db.users().find("alice").await.unwrap().is_some());
    assert!(db.ledger().is_revoked(&session.id).await.unwrap());
    db.close().await;
}
