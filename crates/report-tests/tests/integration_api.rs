// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # API Integration Tests
//!
//! The HTTP surface, driven in-process through the full middleware stack.
//!
//! - `test_auth_*`: login, refresh, logout, registration
//! - `test_reports_*`: gated report access
//! - `test_users_*`: user administration
//! - `test_health_*`: probes and metrics

use axum::http::header;
use serde_json::json;

use report_core::RevocationMode;
use report_tests::prelude::*;

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_auth_login_and_me() {
    init_test_logging();
    let app = TestApp::memory().await;
    let tokens = app.provision_and_login(&UserFixture::bob()).await;

    let me = app.get("/api/v1/auth/me", Some(&tokens.access_token)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.data()["identity"], "bob");
    assert_eq!(me.data()["roles"], json!(["editor"]));
    assert_eq!(me.data()["name"], "Bob");
    assert_eq!(app.state.metrics.value("auth_logins_total", "success"), 1);
}

#[tokio::test]
async fn test_auth_login_failures_look_alike() {
    let app = TestApp::memory().await;
    app.provision(&UserFixture::alice()).await;

    let wrong_password = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({ "handle": "alice", "password": "definitely-wrong" }),
        )
        .await;
    let unknown_user = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({ "handle": "mallory", "password": "definitely-wrong" }),
        )
        .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.status, unknown_user.status);
    assert_eq!(wrong_password.body, unknown_user.body);
    assert_eq!(app.state.metrics.value("auth_logins_total", "failure"), 2);
}

#[tokio::test]
async fn test_auth_missing_token_challenge() {
    let app = TestApp::memory().await;

    let response = app.get("/api/v1/reports", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers[header::WWW_AUTHENTICATE], "Bearer");
    assert_eq!(response.error_code(), Some("UNAUTHORIZED"));
}

#[tokio::test]
async fn test_auth_invalid_token_challenge() {
    let app = TestApp::memory().await;

    let response = app.get("/api/v1/reports", Some("not.a.jwt")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers[header::WWW_AUTHENTICATE],
        "Bearer error=\"invalid_token\""
    );
}

#[tokio::test]
async fn test_auth_refresh_rotates_once() {
    let app = TestApp::sqlite().await;
    let first = app.provision_and_login(&UserFixture::alice()).await;

    let refreshed = app
        .post(
            "/api/v1/auth/refresh",
            None,
            json!({ "refresh_token": first.refresh_token }),
        )
        .await;
    assert_eq!(refreshed.status, StatusCode::OK);
    assert_eq!(refreshed.body["token_type"], "Bearer");
    let second = tokens_from(&refreshed.body);

    let replay = app
        .post(
            "/api/v1/auth/refresh",
            None,
            json!({ "refresh_token": first.refresh_token }),
        )
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);

    let me = app.get("/api/v1/auth/me", Some(&second.access_token)).await;
    assert_eq!(me.status, StatusCode::OK);
}

#[tokio::test]
async fn test_auth_logout_revokes_access_in_strict_mode() {
    let app = TestApp::memory().await;
    let tokens = app.provision_and_login(&UserFixture::alice()).await;

    let logout = app
        .request(
            axum::http::Method::POST,
            "/api/v1/auth/logout",
            Some(&tokens.access_token),
            None,
        )
        .await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.data()["revoked"], 1);

    let me = app.get("/api/v1/auth/me", Some(&tokens.access_token)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);

    let refresh = app
        .post(
            "/api/v1/auth/refresh",
            None,
            json!({ "refresh_token": tokens.refresh_token }),
        )
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_logout_in_stateless_mode_keeps_access() {
    let config = test_api_config().with_jwt(
        test_jwt_config().with_revocation_mode(RevocationMode::Stateless),
    );
    let app = TestApp::with_config(Backend::Memory, config).await;
    let tokens = app.provision_and_login(&UserFixture::alice()).await;

    let logout = app
        .post("/api/v1/auth/logout", Some(&tokens.access_token), json!({}))
        .await;
    assert_eq!(logout.status, StatusCode::OK);

    let me = app.get("/api/v1/auth/me", Some(&tokens.access_token)).await;
    assert_eq!(me.status, StatusCode::OK);

    let refresh = app
        .post(
            "/api/v1/auth/refresh",
            None,
            json!({ "refresh_token": tokens.refresh_token }),
        )
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_logout_all_sessions() {
    let app = TestApp::memory().await;
    let first = app.provision_and_login(&UserFixture::alice()).await;
    let second = app.login(&UserFixture::alice()).await;

    let logout = app
        .post("/api/v1/auth/logout", Some(&first.access_token), json!({ "all": true }))
        .await;
    assert_eq!(logout.data()["revoked"], 2);

    let me = app.get("/api/v1/auth/me", Some(&second.access_token)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_logout_foreign_refresh_token() {
    let app = TestApp::memory().await;
    let alice = app.provision_and_login(&UserFixture::alice()).await;
    let bob = app.provision_and_login(&UserFixture::bob()).await;

    let response = app
        .post(
            "/api/v1/auth/logout",
            Some(&alice.access_token),
            json!({ "refresh_token": bob.refresh_token }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let refresh = app
        .post(
            "/api/v1/auth/refresh",
            None,
            json!({ "refresh_token": bob.refresh_token }),
        )
        .await;
    assert_eq!(refresh.status, StatusCode::OK);
}

#[tokio::test]
async fn test_auth_register_then_login() {
    let app = TestApp::memory().await;

    let registered = app
        .post(
            "/api/v1/auth/register",
            None,
            json!({ "handle": "Erin@Example.com", "display_name": "Erin", "secret": "erin-password" }),
        )
        .await;
    assert_eq!(registered.status, StatusCode::CREATED);
    assert_eq!(registered.data()["handle"], "erin@example.com");
    assert_eq!(registered.data()["roles"], json!(["student"]));
    assert!(registered.data().get("secret_hash").is_none());

    let login = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({ "handle": "erin@example.com", "password": "erin-password" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);

    let duplicate = app
        .post(
            "/api/v1/auth/register",
            None,
            json!({ "handle": "erin@example.com", "display_name": "Erin", "secret": "erin-password" }),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_auth_register_disabled() {
    let app = TestApp::with_config(
        Backend::Memory,
        test_api_config().with_registration(false),
    )
    .await;

    let response = app
        .post(
            "/api/v1/auth/register",
            None,
            json!({ "handle": "erin", "display_name": "Erin", "secret": "erin-password" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_auth_change_password_ends_sessions() {
    let app = TestApp::memory().await;
    let tokens = app.provision_and_login(&UserFixture::alice()).await;

    let changed = app
        .post(
            "/api/v1/auth/change-password",
            Some(&tokens.access_token),
            json!({ "current_password": "alice-password", "new_password": "alice-new-password" }),
        )
        .await;
    assert_eq!(changed.status, StatusCode::OK);

    let me = app.get("/api/v1/auth/me", Some(&tokens.access_token)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);

    let old = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({ "handle": "alice", "password": "alice-password" }),
        )
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);

    let new = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({ "handle": "alice", "password": "alice-new-password" }),
        )
        .await;
    assert_eq!(new.status, StatusCode::OK);
}

// =============================================================================
// Reports
// =============================================================================

#[tokio::test]
async fn test_reports_role_requirement() {
    init_test_logging();
    for backend in Backend::ALL {
        let app = TestApp::with_config(backend, test_api_config()).await;
        let carol = app.provision_and_login(&UserFixture::carol()).await;
        let alice = app.provision_and_login(&UserFixture::alice()).await;
        let bob = app.provision_and_login(&UserFixture::bob()).await;

        let id = app
            .create_report(
                &carol.access_token,
                json!({ "title": "Broken projector", "detail": "Room 101", "read_roles": ["editor"] }),
            )
            .await;
        let uri = format!("/api/v1/reports/{id}");

        let denied = app.get(&uri, Some(&alice.access_token)).await;
        assert_eq!(denied.status, StatusCode::FORBIDDEN, "{backend:?}");

        let allowed = app.get(&uri, Some(&bob.access_token)).await;
        assert_eq!(allowed.status, StatusCode::OK, "{backend:?}");
        assert_eq!(allowed.data()["title"], "Broken projector");

        let owner = app.get(&uri, Some(&carol.access_token)).await;
        assert_eq!(owner.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_reports_denied_and_missing_look_alike() {
    let app = TestApp::memory().await;
    let carol = app.provision_and_login(&UserFixture::carol()).await;
    let alice = app.provision_and_login(&UserFixture::alice()).await;

    let id = app
        .create_report(
            &carol.access_token,
            json!({ "title": "Leak", "detail": "Basement" }),
        )
        .await;

    let denied = app
        .get(&format!("/api/v1/reports/{id}"), Some(&alice.access_token))
        .await;
    let missing = app
        .get("/api/v1/reports/999999", Some(&alice.access_token))
        .await;

    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.status, missing.status);
    assert_eq!(denied.body, missing.body);
}

#[tokio::test]
async fn test_reports_create_requires_role() {
    let app = TestApp::memory().await;
    let alice = app.provision_and_login(&UserFixture::alice()).await;

    let response = app
        .post(
            "/api/v1/reports",
            Some(&alice.access_token),
            json!({ "title": "Nope", "detail": "viewer cannot create" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(
        app.state
            .metrics
            .value("auth_authorization_denials_total", "insufficient_role"),
        1
    );
}

#[tokio::test]
async fn test_reports_list_filters_by_gate() {
    let app = TestApp::sqlite().await;
    let carol = app.provision_and_login(&UserFixture::carol()).await;
    let bob = app.provision_and_login(&UserFixture::bob()).await;
    let dana = app.provision_and_login(&UserFixture::dana()).await;

    app.create_report(
        &carol.access_token,
        json!({ "title": "Private", "detail": "owner only" }),
    )
    .await;
    app.create_report(
        &carol.access_token,
        json!({ "title": "Editors", "detail": "editors may read", "read_roles": ["editor"] }),
    )
    .await;
    app.create_report(
        &carol.access_token,
        json!({ "title": "Everyone", "detail": "public", "visibility": "public" }),
    )
    .await;

    let titles = |response: &TestResponse| -> Vec<String> {
        response.data()
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["title"].as_str().unwrap().to_string())
            .collect()
    };

    let owner = app.get("/api/v1/reports", Some(&carol.access_token)).await;
    assert_eq!(titles(&owner), vec!["Private", "Editors", "Everyone"]);
    assert_eq!(owner.body["meta"]["total"], 3);

    let editor = app.get("/api/v1/reports", Some(&bob.access_token)).await;
    assert_eq!(titles(&editor), vec!["Editors", "Everyone"]);

    let moderator = app.get("/api/v1/reports", Some(&dana.access_token)).await;
    assert_eq!(titles(&moderator).len(), 3);

    let paged = app
        .get("/api/v1/reports?page=2&per_page=2", Some(&carol.access_token))
        .await;
    assert_eq!(titles(&paged), vec!["Everyone"]);
    assert_eq!(paged.body["meta"]["total_pages"], 2);
}

#[tokio::test]
async fn test_reports_update_and_delete_by_writers_only() {
    let app = TestApp::memory().await;
    let carol = app.provision_and_login(&UserFixture::carol()).await;
    let bob = app.provision_and_login(&UserFixture::bob()).await;

    let id = app
        .create_report(
            &carol.access_token,
            json!({ "title": "Draft", "detail": "first", "read_roles": ["editor"] }),
        )
        .await;
    let uri = format!("/api/v1/reports/{id}");

    let reader_edit = app
        .put(&uri, Some(&bob.access_token), json!({ "title": "Hijacked" }))
        .await;
    assert_eq!(reader_edit.status, StatusCode::FORBIDDEN);

    let owner_edit = app
        .put(&uri, Some(&carol.access_token), json!({ "title": "Final" }))
        .await;
    assert_eq!(owner_edit.status, StatusCode::OK);
    assert_eq!(owner_edit.data()["title"], "Final");
    assert_eq!(owner_edit.data()["detail"], "first");

    let reader_delete = app.delete(&uri, Some(&bob.access_token)).await;
    assert_eq!(reader_delete.status, StatusCode::FORBIDDEN);

    let owner_delete = app.delete(&uri, Some(&carol.access_token)).await;
    assert_eq!(owner_delete.status, StatusCode::NO_CONTENT);

    let gone = app.get(&uri, Some(&carol.access_token)).await;
    assert_eq!(gone.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_reports_status_lifecycle() {
    let app = TestApp::memory().await;
    let carol = app.provision_and_login(&UserFixture::carol()).await;
    let dana = app.provision_and_login(&UserFixture::dana()).await;

    let id = app
        .create_report(&carol.access_token, json!({ "title": "Noise", "detail": "Late" }))
        .await;
    let uri = format!("/api/v1/reports/{id}/status");

    let by_owner = app
        .post(&uri, Some(&carol.access_token), json!({ "status": "resolved" }))
        .await;
    assert_eq!(by_owner.status, StatusCode::FORBIDDEN);

    let no_reason = app
        .post(&uri, Some(&dana.access_token), json!({ "status": "rejected" }))
        .await;
    assert_eq!(no_reason.status, StatusCode::UNPROCESSABLE_ENTITY);

    let rejected = app
        .post(
            &uri,
            Some(&dana.access_token),
            json!({ "status": "rejected", "rejection": "similar_report" }),
        )
        .await;
    assert_eq!(rejected.status, StatusCode::OK);
    assert_eq!(rejected.data()["status"], "rejected");
    assert_eq!(rejected.data()["rejection"], "similar_report");

    let reopen = app
        .post(&uri, Some(&dana.access_token), json!({ "status": "open" }))
        .await;
    assert_eq!(reopen.status, StatusCode::CONFLICT);

    let edit = app
        .put(
            &format!("/api/v1/reports/{id}"),
            Some(&carol.access_token),
            json!({ "detail": "too late" }),
        )
        .await;
    assert_eq!(edit.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reports_render() {
    let app = TestApp::memory().await;
    let carol = app.provision_and_login(&UserFixture::carol()).await;
    let alice = app.provision_and_login(&UserFixture::alice()).await;

    let id = app
        .create_report(&carol.access_token, json!({ "title": "Render me", "detail": "x" }))
        .await;
    let uri = format!("/api/v1/reports/{id}/render");

    let rendered = app.get(&uri, Some(&carol.access_token)).await;
    assert_eq!(rendered.status, StatusCode::OK);
    assert!(rendered.headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    assert!(rendered.text.contains("Render me"));

    let denied = app.get(&uri, Some(&alice.access_token)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_reports_invalid_id() {
    let app = TestApp::memory().await;
    let carol = app.provision_and_login(&UserFixture::carol()).await;

    let response = app.get("/api/v1/reports/0", Some(&carol.access_token)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reports_override_role() {
    let mut config = test_api_config();
    config.override_roles = vec!["auditor".to_string()];
    let app = TestApp::with_config(Backend::Memory, config).await;
    let carol = app.provision_and_login(&UserFixture::carol()).await;
    let auditor = UserFixture {
        handle: "audrey",
        name: "Audrey",
        password: "audrey-password",
        roles: &["auditor"],
    };
    let auditor = app.provision_and_login(&auditor).await;

    let id = app
        .create_report(&carol.access_token, json!({ "title": "Secret", "detail": "x" }))
        .await;
    let response = app
        .get(&format!("/api/v1/reports/{id}"), Some(&auditor.access_token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

// =============================================================================
// User administration
// =============================================================================

#[tokio::test]
async fn test_users_admin_changes_roles() {
    let app = TestApp::memory().await;
    let root = app.provision_and_login(&UserFixture::root()).await;
    let alice = app.provision_and_login(&UserFixture::alice()).await;

    let changed = app
        .put(
            "/api/v1/users/alice/roles",
            Some(&root.access_token),
            json!({ "roles": ["Editor", "viewer"] }),
        )
        .await;
    assert_eq!(changed.status, StatusCode::OK);
    assert_eq!(changed.data()["roles"], json!(["editor", "viewer"]));

    // The new role shows up after refresh.
    let refreshed = app
        .post(
            "/api/v1/auth/refresh",
            None,
            json!({ "refresh_token": alice.refresh_token }),
        )
        .await;
    let tokens = tokens_from(&refreshed.body);
    let me = app.get("/api/v1/auth/me", Some(&tokens.access_token)).await;
    assert_eq!(me.data()["roles"], json!(["editor", "viewer"]));
}

#[tokio::test]
async fn test_users_non_admin_is_denied_before_lookup() {
    let app = TestApp::memory().await;
    let alice = app.provision_and_login(&UserFixture::alice()).await;

    let existing = app
        .put(
            "/api/v1/users/alice/roles",
            Some(&alice.access_token),
            json!({ "roles": ["admin"] }),
        )
        .await;
    let missing = app
        .put(
            "/api/v1/users/ghost/roles",
            Some(&alice.access_token),
            json!({ "roles": ["admin"] }),
        )
        .await;

    assert_eq!(existing.status, StatusCode::FORBIDDEN);
    assert_eq!(existing.body, missing.body);
}

#[tokio::test]
async fn test_users_disable_ends_sessions() {
    let app = TestApp::sqlite().await;
    let root = app.provision_and_login(&UserFixture::root()).await;
    let alice = app.provision_and_login(&UserFixture::alice()).await;

    let disabled = app
        .post("/api/v1/users/alice/disable", Some(&root.access_token), json!({}))
        .await;
    assert_eq!(disabled.status, StatusCode::OK);
    assert_eq!(disabled.data()["revoked"], 1);

    let me = app.get("/api/v1/auth/me", Some(&alice.access_token)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);

    let login = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({ "handle": "alice", "password": "alice-password" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_probes_are_public() {
    for backend in Backend::ALL {
        let app = TestApp::with_config(backend, test_api_config()).await;

        let health = app.get("/health", None).await;
        assert_eq!(health.status, StatusCode::OK);
        assert_eq!(health.body["status"], "ok");

        let ready = app.get("/ready", None).await;
        assert_eq!(ready.status, StatusCode::OK, "{backend:?}");
        assert_eq!(ready.body["ready"], true);
    }
}

#[tokio::test]
async fn test_health_metrics_exposition() {
    let app = TestApp::memory().await;
    app.provision_and_login(&UserFixture::alice()).await;
    app.get("/api/v1/reports", Some("garbage")).await;

    let metrics = app.get("/metrics", None).await;
    assert_eq!(metrics.status, StatusCode::OK);
    assert!(metrics.text.contains("auth_tokens_issued_total"));
    assert!(metrics.text.contains("malformed_token"));
}
