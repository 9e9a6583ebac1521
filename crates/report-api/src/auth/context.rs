// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Authentication context.

use std::net::IpAddr;

use report_core::Principal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Claims;

/// Authentication context for a request.
///
/// Attached to request extensions by the auth middleware after the access
/// token validated. Handlers turn it into a [`Principal`] before calling
/// into the service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// User handle.
    pub identity: String,
    /// Roles carried by the token.
    pub roles: Vec<String>,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Ledger id of the refresh token the access token derives from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Access token id.
    pub token_id: String,
    /// Client IP address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,
    /// Request ID for tracing.
    pub request_id: Uuid,
}

impl AuthContext {
    /// Creates a context from validated access claims.
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            identity: claims.sub.clone(),
            roles: claims.roles.clone(),
            name: claims.name.clone(),
            session_id: claims.sid.clone(),
            token_id: claims.jti.clone(),
            client_ip: None,
            request_id: Uuid::now_v7(),
        }
    }

    /// Sets the client IP address.
    pub fn with_client_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.client_ip = ip;
        self
    }

    /// Sets the request ID.
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    /// Returns `true` if the context has the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Returns the principal the service layer authorizes against.
    pub fn principal(&self) -> Principal {
        Principal::new(self.identity.clone(), self.roles.clone())
    }
}
