// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use report_core::ReportPolicy;
use serde::{Deserialize, Serialize};

use crate::auth::JwtConfig;

// =============================================================================
// ApiConfig
// =============================================================================

/// Configuration for the API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host address.
    pub host: IpAddr,
    /// Server port.
    pub port: u16,
    /// Allowed CORS origins. Empty disables CORS headers; `*` allows any.
    pub cors_origins: Vec<String>,
    /// JWT configuration.
    pub jwt: JwtConfig,
    /// Report role requirements.
    pub reports: ReportPolicy,
    /// Roles that may manage users.
    pub admin_roles: Vec<String>,
    /// Roles that pass every gate check.
    pub override_roles: Vec<String>,
    /// Whether `POST /api/v1/auth/register` is open.
    pub allow_registration: bool,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
            cors_origins: Vec::new(),
            jwt: JwtConfig::default(),
            reports: ReportPolicy::default(),
            admin_roles: vec!["admin".to_string()],
            override_roles: Vec::new(),
            allow_registration: true,
            request_timeout_secs: 30,
            max_body_size: 1024 * 1024,
        }
    }
}

impl ApiConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns the request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Sets the host address.
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the JWT configuration.
    pub fn with_jwt(mut self, jwt: JwtConfig) -> Self {
        self.jwt = jwt;
        self
    }

    /// Sets the report policy.
    pub fn with_reports(mut self, reports: ReportPolicy) -> Self {
        self.reports = reports;
        self
    }

    /// Enables or disables self-registration.
    pub fn with_registration(mut self, allow: bool) -> Self {
        self.allow_registration = allow;
        self
    }
}
