// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Identity, role and session types shared by every layer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Roles
// =============================================================================

/// Pseudo-role granted to the caller on resources they own.
///
/// Reserved: it can appear in a resource's required roles, never in a
/// user's role set.
pub const OWNER_ROLE: &str = "owner";

/// Role assigned to self-registered users.
pub const DEFAULT_ROLE: &str = "student";

/// Maximum accepted role name length.
pub const MAX_ROLE_LEN: usize = 32;

/// Normalizes a role name for assignment to a user.
///
/// Role names are lowercase ASCII letters, digits, `_` and `-`.
///
/// # Examples
///
/// ```
/// use report_core::types::normalize_role;
///
/// assert_eq!(normalize_role(" Editor ").unwrap(), "editor");
/// assert!(normalize_role("owner").is_err());
/// assert!(normalize_role("").is_err());
/// ```
pub fn normalize_role(raw: &str) -> CoreResult<String> {
    let role = raw.trim().to_ascii_lowercase();

    if role.is_empty() || role.len() > MAX_ROLE_LEN {
        return Err(CoreError::validation(format!(
            "role name must be 1..={MAX_ROLE_LEN} characters"
        )));
    }
    if !role
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(CoreError::validation(format!("invalid role name '{role}'")));
    }
    if role == OWNER_ROLE {
        return Err(CoreError::validation("'owner' is a reserved role"));
    }

    Ok(role)
}

/// Normalizes, sorts and deduplicates a list of role names.
pub fn normalize_roles<I, S>(raw: I) -> CoreResult<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut roles = raw
        .into_iter()
        .map(|r| normalize_role(r.as_ref()))
        .collect::<CoreResult<Vec<_>>>()?;
    roles.sort();
    roles.dedup();
    Ok(roles)
}

// =============================================================================
// Principal
// =============================================================================

/// The authenticated caller, as extracted from a validated access token.
///
/// Roles come from the token claims only; the store is never consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// User handle.
    pub identity: String,
    /// Roles embedded in the token at issuance.
    pub roles: Vec<String>,
}

impl Principal {
    /// Creates a new principal.
    pub fn new(identity: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            identity: identity.into(),
            roles,
        }
    }

    /// Returns `true` if the principal carries the role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Returns the role set to present to the gate for a resource with the
    /// given owner: the token roles plus [`OWNER_ROLE`] on a match.
    pub fn effective_roles(&self, owner: Option<&str>) -> Vec<String> {
        let mut roles = self.roles.clone();
        if owner == Some(self.identity.as_str()) {
            roles.push(OWNER_ROLE.to_string());
        }
        roles
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.identity, self.roles.join(","))
    }
}

// =============================================================================
// User
// =============================================================================

/// A persisted user identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique login handle.
    pub handle: String,
    /// Display name.
    pub display_name: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub secret_hash: String,
    /// Sorted, deduplicated role names.
    pub roles: Vec<String>,
    /// Soft-delete flag.
    pub disabled: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("handle", &self.handle)
            .field("display_name", &self.display_name)
            .field("secret_hash", &"[REDACTED]")
            .field("roles", &self.roles)
            .field("disabled", &self.disabled)
            .finish()
    }
}

// =============================================================================
// Refresh tokens
// =============================================================================

/// Lifecycle state of a refresh token in the ledger.
///
/// ```text
/// Issued -> Active -> { Rotated | Revoked | Expired }
/// ```
///
/// `Expired` is not stored; it is derived from `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    /// Usable for exactly one rotation.
    Active,
    /// Consumed by a rotation.
    Rotated,
    /// Revoked by logout or forced invalidation.
    Revoked,
}

impl RefreshState {
    /// Returns the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshState::Active => "active",
            RefreshState::Rotated => "rotated",
            RefreshState::Revoked => "revoked",
        }
    }

    /// Parses the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(RefreshState::Active),
            "rotated" => Some(RefreshState::Rotated),
            "revoked" => Some(RefreshState::Revoked),
            _ => None,
        }
    }
}

impl fmt::Display for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger row for one issued refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
    /// Token id (`jti`).
    pub id: String,
    /// Owning user handle.
    pub identity: String,
    /// Issuance time.
    pub issued_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
    /// Current state.
    pub state: RefreshState,
    /// Successor id after rotation.
    pub replaced_by: Option<String>,
}

impl RefreshRecord {
    /// Creates an active record.
    pub fn active(
        id: impl Into<String>,
        identity: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            identity: identity.into(),
            issued_at,
            expires_at,
            state: RefreshState::Active,
            replaced_by: None,
        }
    }

    /// Returns `true` once the record no longer authorizes anything.
    pub fn is_revoked(&self) -> bool {
        self.state != RefreshState::Active
    }

    /// Returns `true` if the record is past its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// =============================================================================
// Tests
// =============================================================================
