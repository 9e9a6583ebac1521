// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Role-based authorization gate.
//!
//! The gate is a pure function of `(roles, resource, action)`. It fails
//! closed: an action without a declared requirement, or with an empty one,
//! is denied. Public resources are open for read-only actions only.
//!
//! ```text
//!              ┌──────────── public && action.is_read_only() ──> Allow
//! (roles, r, a)┤
//!              ├── override role present ─────────────────────> Allow
//!              ├── no requirement for a ──> Deny(MissingPolicy)
//!              ├── requirement empty ─────> Deny(EmptyRequirement)
//!              └── roles ∩ requirement ───> Allow | Deny(InsufficientRole)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Action
// =============================================================================

/// An action a caller attempts on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Read a single resource.
    Read,
    /// Enumerate resources.
    List,
    /// Create a resource in a collection.
    Create,
    /// Modify resource content.
    Update,
    /// Remove a resource.
    Delete,
    /// Move a resource through its review lifecycle.
    Moderate,
    /// Manage users and their roles.
    Administer,
}

impl Action {
    /// Returns the action name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::List => "list",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Moderate => "moderate",
            Action::Administer => "administer",
        }
    }

    /// Parses an action name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Some(Action::Read),
            "list" => Some(Action::List),
            "create" => Some(Action::Create),
            "update" => Some(Action::Update),
            "delete" => Some(Action::Delete),
            "moderate" => Some(Action::Moderate),
            "administer" => Some(Action::Administer),
            _ => None,
        }
    }

    /// Returns `true` for actions that never mutate state.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Action::Read | Action::List)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Resource Descriptor
// =============================================================================

/// What the gate knows about a resource: whether it is public, and which
/// roles each action requires.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceDescriptor {
    kind: String,
    id: Option<String>,
    public: bool,
    requirements: BTreeMap<Action, BTreeSet<String>>,
}

impl ResourceDescriptor {
    /// Creates a restricted descriptor with no requirements.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// Sets the resource id, for logs.
    pub fn with_id(mut self, id: impl ToString) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Marks the resource public for read-only actions.
    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    /// Declares the roles that may perform an action. Repeated calls for the
    /// same action accumulate.
    pub fn require<I, S>(mut self, action: Action, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements
            .entry(action)
            .or_default()
            .extend(roles.into_iter().map(Into::into));
        self
    }

    /// Returns the resource kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the resource id, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns `true` if the resource is public.
    pub fn is_public(&self) -> bool {
        self.public
    }

    /// Returns the declared requirement for an action.
    pub fn requirement(&self, action: Action) -> Option<&BTreeSet<String>> {
        self.requirements.get(&action)
    }
}

// =============================================================================
// Decision
// =============================================================================

/// Why the gate denied an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// The resource declares nothing for this action.
    MissingPolicy,
    /// The resource declares an empty role set for this action.
    EmptyRequirement,
    /// None of the caller's roles is in the required set.
    InsufficientRole,
}

impl DenyReason {
    /// Returns a stable label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingPolicy => "missing_policy",
            DenyReason::EmptyRequirement => "empty_requirement",
            DenyReason::InsufficientRole => "insufficient_role",
        }
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The action may proceed.
    Allow,
    /// The action must not proceed.
    Deny(DenyReason),
}

impl Decision {
    /// Returns `true` if allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

// =============================================================================
// Authorization Gate
// =============================================================================

/// Evaluates role requirements.
///
/// Cloning is cheap; the override set is shared.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationGate {
    override_roles: Arc<BTreeSet<String>>,
}

impl AuthorizationGate {
    /// Creates a gate with no override roles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gate where the given roles pass every check.
    ///
    /// This is the only way a role acts as a wildcard.
    pub fn with_override_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            override_roles: Arc::new(roles.into_iter().map(Into::into).collect()),
        }
    }

    /// Returns the configured override roles.
    pub fn override_roles(&self) -> &BTreeSet<String> {
        &self.override_roles
    }

    /// Decides whether `roles` may perform `action` on `resource`.
    pub fn authorize(
        &self,
        roles: &[String],
        resource: &ResourceDescriptor,
        action: Action,
    ) -> Decision {
        if resource.public && action.is_read_only() {
            return Decision::Allow;
        }

        if roles.iter().any(|r| self.override_roles.contains(r)) {
            return Decision::Allow;
        }

        let required = match resource.requirement(action) {
            Some(required) => required,
            None => return Decision::Deny(DenyReason::MissingPolicy),
        };

        if required.is_empty() {
            return Decision::Deny(DenyReason::EmptyRequirement);
        }

        if roles.iter().any(|r| required.contains(r)) {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::InsufficientRole)
        }
    }

    /// Like [`authorize`](Self::authorize), but returns `Forbidden` on deny.
    pub fn check(
        &self,
        roles: &[String],
        resource: &ResourceDescriptor,
        action: Action,
    ) -> CoreResult<()> {
        match self.authorize(roles, resource, action) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                tracing::debug!(
                    kind = %resource.kind(),
                    id = resource.id().unwrap_or("-"),
                    action = %action,
                    reason = reason.as_str(),
                    "Authorization denied"
                );
                Err(CoreError::Forbidden)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
