// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Config Integration Tests
//!
//! A configuration file carried all the way to a running application.

use std::io::Write;

use serde_json::json;
use tempfile::NamedTempFile;

use report_bin::runtime::api_config;
use report_config::{ConfigError, ConfigLoader};
use report_core::RevocationMode;
use report_tests::prelude::*;

fn write_temp(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Env overrides read a prefix nothing sets.
fn loader() -> ConfigLoader {
    ConfigLoader::new().with_env_prefix("REPORT_IT_UNSET")
}

#[tokio::test]
async fn test_config_file_drives_application() {
    let dir = tempfile::tempdir().unwrap();
    write_temp(&dir, "jwt.key", &format!("{SIGNING_KEY}\n"));
    let path = write_temp(
        &dir,
        "report.yaml",
        r#"
server:
  port: 9443
auth:
  signing_key_file: jwt.key
  issuer: campus-reports
  access_ttl_secs: 300
  allow_registration: false
store:
  backend: memory
authorization:
  admin_roles: [registrar]
"#,
    );

    let config = loader().load(&path).unwrap();
    let api = api_config(&config).unwrap();
    assert_eq!(api.port, 9443);
    assert_eq!(api.jwt.issuer, "campus-reports");
    assert_eq!(api.jwt.access_ttl_secs, 300);
    assert_eq!(api.jwt.revocation_mode, RevocationMode::Strict);
    assert_eq!(api.admin_roles, vec!["registrar".to_string()]);

    let app = TestApp::with_config(Backend::Memory, api).await;
    let tokens = app.provision_and_login(&UserFixture::alice()).await;
    let claims = app
        .state
        .tokens
        .validate_access(&tokens.access_token)
        .await
        .unwrap();
    assert_eq!(claims.iss, "campus-reports");
    assert_eq!(claims.exp - claims.iat, 300);

    let register = app
        .post(
            "/api/v1/auth/register",
            None,
            json!({ "handle": "erin", "display_name": "Erin", "secret": "erin-password" }),
        )
        .await;
    assert_eq!(register.status, StatusCode::FORBIDDEN);

    // `admin` is no longer an admin role.
    let root = app.provision_and_login(&UserFixture::root()).await;
    let denied = app
        .put(
            "/api/v1/users/alice/roles",
            Some(&root.access_token),
            json!({ "roles": ["editor"] }),
        )
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
}

#[test]
fn test_config_without_key_fails_to_load() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(b"store:\n  backend: memory\n").unwrap();

    assert!(matches!(
        loader().load(file.path()),
        Err(ConfigError::SigningKey { .. })
    ));
}

#[test]
fn test_config_short_key_fails_to_load() {
    let mut file: NamedTempFile = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(br#"{ "auth": { "signing_key": "too-short" } }"#)
        .unwrap();

    assert!(matches!(
        loader().load(file.path()),
        Err(ConfigError::SigningKey { .. })
    ));
}
