// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Pre-built users and configurations.

use report_api::{ApiConfig, JwtConfig};
use report_core::RevocationMode;

/// HS256 key used by every test application.
pub const SIGNING_KEY: &str = "integration-test-signing-key-0123456789abcdef";

/// Issuer used by every test application.
pub const ISSUER: &str = "report-gateway-test";

/// A user to provision.
#[derive(Debug, Clone)]
pub struct UserFixture {
    /// Login handle.
    pub handle: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Plain password.
    pub password: &'static str,
    /// Roles.
    pub roles: &'static [&'static str],
}

impl UserFixture {
    /// A reader with the `viewer` role.
    pub fn alice() -> Self {
        Self {
            handle: "alice",
            name: "Alice",
            password: "alice-password",
            roles: &["viewer"],
        }
    }

    /// A reader with the `editor` role.
    pub fn bob() -> Self {
        Self {
            handle: "bob",
            name: "Bob",
            password: "bob-password",
            roles: &["editor"],
        }
    }

    /// A student; may create reports.
    pub fn carol() -> Self {
        Self {
            handle: "carol",
            name: "Carol",
            password: "carol-password",
            roles: &["student"],
        }
    }

    /// Staff; moderates reports.
    pub fn dana() -> Self {
        Self {
            handle: "dana",
            name: "Dana",
            password: "dana-password",
            roles: &["staff"],
        }
    }

    /// An administrator.
    pub fn root() -> Self {
        Self {
            handle: "root",
            name: "Root",
            password: "root-password",
            roles: &["admin"],
        }
    }

    /// Roles as owned strings.
    pub fn role_list(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.to_string()).collect()
    }
}

/// Token settings with the test key and default lifetimes.
pub fn test_jwt_config() -> JwtConfig {
    JwtConfig::new(SIGNING_KEY).with_issuer(ISSUER)
}

/// Token settings whose access tokens expire almost immediately.
pub fn short_lived_jwt_config() -> JwtConfig {
    test_jwt_config().with_ttls(1, 60).with_leeway(0)
}

/// Token settings in stateless mode.
pub fn stateless_jwt_config() -> JwtConfig {
    test_jwt_config().with_revocation_mode(RevocationMode::Stateless)
}

/// API configuration for in-process tests.
pub fn test_api_config() -> ApiConfig {
    ApiConfig::default().with_jwt(test_jwt_config())
}
