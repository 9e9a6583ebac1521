// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! JWT claims structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which of the two token kinds a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived bearer token for API calls.
    Access,
    /// Long-lived token exchanged for a new pair.
    Refresh,
}

impl TokenKind {
    /// Returns the metric/log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    // =========================================================================
    // Standard JWT Claims (RFC 7519)
    // =========================================================================
    /// Subject: the user handle.
    pub sub: String,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at time (Unix timestamp).
    pub iat: i64,

    /// Issuer.
    pub iss: String,

    /// JWT ID. For refresh tokens this is the ledger id.
    pub jti: String,

    // =========================================================================
    // Custom Claims
    // =========================================================================
    /// Token kind.
    pub typ: TokenKind,

    /// Roles at issuance. Empty on refresh tokens.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Ledger id of the refresh token this access token was issued with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Claims {
    /// Creates access claims.
    pub fn access(
        subject: impl Into<String>,
        roles: Vec<String>,
        issued_at: DateTime<Utc>,
        ttl_secs: i64,
    ) -> Self {
        Self {
            sub: subject.into(),
            exp: issued_at.timestamp() + ttl_secs,
            iat: issued_at.timestamp(),
            iss: String::new(),
            jti: Uuid::now_v7().to_string(),
            typ: TokenKind::Access,
            roles,
            sid: None,
            name: None,
        }
    }

    /// Creates refresh claims with the given ledger id.
    pub fn refresh(
        subject: impl Into<String>,
        token_id: impl Into<String>,
        issued_at: DateTime<Utc>,
        ttl_secs: i64,
    ) -> Self {
        Self {
            sub: subject.into(),
            exp: issued_at.timestamp() + ttl_secs,
            iat: issued_at.timestamp(),
            iss: String::new(),
            jti: token_id.into(),
            typ: TokenKind::Refresh,
            roles: Vec::new(),
            sid: None,
            name: None,
        }
    }

    /// Sets the issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.iss = issuer.into();
        self
    }

    /// Sets the session id.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.sid = Some(session_id.into());
        self
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns `true` if the claims have the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Returns the expiration time as a DateTime.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Returns the issued at time as a DateTime.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }
}

// =============================================================================
// Tests
// =============================================================================
