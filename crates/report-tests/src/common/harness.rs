// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! [`TestApp`] wires the full application state over either backend and
//! drives the router in-process with `tower::ServiceExt::oneshot`; no
//! socket is bound.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use report_api::{ApiConfig, ApiServer, AppState};
use report_core::{
    HashingConfig, InMemoryReportRepository, InMemorySessionLedger, InMemoryUserRepository,
    ReportRepository, SessionLedger, StoreHealth, UserRepository,
};
use report_store::Database;

use super::fixtures::{test_api_config, UserFixture};

/// Storage backend under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// In-process maps.
    Memory,
    /// Private in-memory SQLite database.
    Sqlite,
}

impl Backend {
    /// Both backends, for tests that must behave the same on each.
    pub const ALL: [Backend; 2] = [Backend::Memory, Backend::Sqlite];
}

/// The repositories of one backend.
pub struct TestStores {
    /// Users.
    pub users: Arc<dyn UserRepository>,
    /// Ledger.
    pub ledger: Arc<dyn SessionLedger>,
    /// Reports.
    pub reports: Arc<dyn ReportRepository>,
    /// Readiness probe.
    pub health: Arc<dyn StoreHealth>,
}

impl TestStores {
    /// Opens fresh, empty stores.
    pub async fn open(backend: Backend) -> Self {
        match backend {
            Backend::Memory => {
                let users = Arc::new(InMemoryUserRepository::new());
                Self {
                    users: users.clone(),
                    ledger: Arc::new(InMemorySessionLedger::new()),
                    reports: Arc::new(InMemoryReportRepository::new()),
                    health: users,
                }
            }
            Backend::Sqlite => {
                let db = Database::in_memory()
                    .await
                    .expect("in-memory sqlite should open");
                Self {
                    users: Arc::new(db.users()),
                    ledger: Arc::new(db.ledger()),
                    reports: Arc::new(db.reports()),
                    health: Arc::new(db),
                }
            }
        }
    }
}

// =============================================================================
// TestApp
// =============================================================================

/// A wired application.
pub struct TestApp {
    /// Shared state, for reaching services directly.
    pub state: AppState,
    /// Router with the full middleware stack.
    pub router: Router,
    /// Backend in use.
    pub backend: Backend,
}

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    /// Status code.
    pub status: StatusCode,
    /// Headers.
    pub headers: HeaderMap,
    /// Body parsed as JSON, or `Value::Null` when empty or not JSON.
    pub body: Value,
    /// Raw body.
    pub text: String,
}

impl TestResponse {
    /// Returns the `data` member of a success envelope.
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    /// Returns the `error.code` member of an error body.
    pub fn error_code(&self) -> Option<&str> {
        self.body["error"]["code"].as_str()
    }
}

/// Tokens returned by login and refresh.
#[derive(Debug, Clone)]
pub struct LoginTokens {
    /// Access token.
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
}

impl TestApp {
    /// An app over the memory backend with the default test configuration.
    pub async fn memory() -> Self {
        Self::with_config(Backend::Memory, test_api_config()).await
    }

    /// An app over in-memory SQLite with the default test configuration.
    pub async fn sqlite() -> Self {
        Self::with_config(Backend::Sqlite, test_api_config()).await
    }

    /// An app over `backend` with `config`.
    pub async fn with_config(backend: Backend, config: ApiConfig) -> Self {
        let stores = TestStores::open(backend).await;
        let state = AppState::builder()
            .config(config)
            .users(stores.users)
            .ledger(stores.ledger)
            .reports(stores.reports)
            .health(stores.health)
            .hashing(HashingConfig::minimal())
            .build()
            .expect("test state should build");
        let router = ApiServer::new(state.clone()).router();

        Self {
            state,
            router,
            backend,
        }
    }

    /// Creates a user with the fixture's roles.
    pub async fn provision(&self, user: &UserFixture) {
        self.state
            .credentials
            .provision(user.handle, user.name, user.password, &user.role_list())
            .await
            .expect("provisioning should succeed");
    }

    /// Logs a fixture user in over HTTP.
    pub async fn login(&self, user: &UserFixture) -> LoginTokens {
        let response = self
            .post(
                "/api/v1/auth/login",
                None,
                serde_json::json!({ "handle": user.handle, "password": user.password }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.text);
        tokens_from(&response.body)
    }

    /// Provisions and logs in.
    pub async fn provision_and_login(&self, user: &UserFixture) -> LoginTokens {
        self.provision(user).await;
        self.login(user).await
    }

    /// Sends a request.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("request should build");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should buffer");
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
            text,
        }
    }

    /// Sends a GET.
    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    /// Sends a POST with a JSON body.
    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    /// Sends a PUT with a JSON body.
    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    /// Sends a DELETE.
    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Creates a report as the token's owner and returns its id.
    pub async fn create_report(&self, token: &str, body: Value) -> i64 {
        let response = self.post("/api/v1/reports", Some(token), body).await;
        assert_eq!(
            response.status,
            StatusCode::CREATED,
            "create failed: {}",
            response.text
        );
        response.data()["id"].as_i64().expect("report id")
    }
}

/// Extracts the token pair from an auth response body.
pub fn tokens_from(body: &Value) -> LoginTokens {
    LoginTokens {
        access_token: body["access_token"]
            .as_str()
            .expect("access_token")
            .to_string(),
        refresh_token: body["refresh_token"]
            .as_str()
            .expect("refresh_token")
            .to_string(),
    }
}
