// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Reports and the resource service in front of them.
//!
//! Every [`ReportService`] operation asks the [`AuthorizationGate`] before
//! touching report content. A missing report and a denied one both surface
//! as [`CoreError::Forbidden`] / [`CoreError::NotFound`], which outward
//! layers render identically.
//!
//! # Status lifecycle
//!
//! ```text
//! open ──> in_progress ──> resolved ──> closed
//!   │            │             ▲
//!   │            └──> rejected ┼──> closed
//!   └──────────────────────────┘
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::gate::{Action, AuthorizationGate, Decision, ResourceDescriptor};
use crate::metrics::AuthMetrics;
use crate::render::{RenderedReport, ReportRenderer};
use crate::types::{normalize_role, Principal, OWNER_ROLE};

/// Maximum title length.
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum detail length.
pub const MAX_DETAIL_LEN: usize = 10_000;

// =============================================================================
// Model
// =============================================================================

/// Report identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(i64);

impl ReportId {
    /// Wraps a raw id.
    #[inline]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Review status of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Submitted, editable by its writers.
    Open,
    /// Picked up by a moderator.
    InProgress,
    /// Handled.
    Resolved,
    /// Declined, with a reason.
    Rejected,
    /// Archived. Terminal.
    Closed,
}

impl ReportStatus {
    /// Returns the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Open => "open",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Rejected => "rejected",
            ReportStatus::Closed => "closed",
        }
    }

    /// Parses the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(ReportStatus::Open),
            "in_progress" => Some(ReportStatus::InProgress),
            "resolved" => Some(ReportStatus::Resolved),
            "rejected" => Some(ReportStatus::Rejected),
            "closed" => Some(ReportStatus::Closed),
            _ => None,
        }
    }

    /// Returns `true` if the lifecycle allows moving to `next`.
    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        use ReportStatus::*;
        matches!(
            (self, next),
            (Open, InProgress)
                | (Open, Resolved)
                | (Open, Rejected)
                | (InProgress, Resolved)
                | (InProgress, Rejected)
                | (Resolved, Closed)
                | (Rejected, Closed)
        )
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a report was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Not enough detail to act on.
    IncompleteDetail,
    /// Duplicates another report.
    SimilarReport,
    /// Anything else.
    Other,
}

impl RejectionReason {
    /// Returns the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::IncompleteDetail => "incomplete_detail",
            RejectionReason::SimilarReport => "similar_report",
            RejectionReason::Other => "other",
        }
    }

    /// Parses the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "incomplete_detail" => Some(RejectionReason::IncompleteDetail),
            "similar_report" => Some(RejectionReason::SimilarReport),
            "other" => Some(RejectionReason::Other),
            _ => None,
        }
    }
}

/// Whether a report is open to every authenticated caller for reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Readable by anyone authenticated.
    Public,
    /// Readable per `read_roles`.
    #[default]
    Restricted,
}

impl Visibility {
    /// Returns the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Restricted => "restricted",
        }
    }

    /// Parses the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "restricted" => Some(Visibility::Restricted),
            _ => None,
        }
    }
}

/// A stored report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Identifier.
    pub id: ReportId,
    /// Handle of the creator.
    pub owner: String,
    /// Title.
    pub title: String,
    /// Body text.
    pub detail: String,
    /// Review status.
    pub status: ReportStatus,
    /// Set when `status` is `rejected`.
    pub rejection: Option<RejectionReason>,
    /// Read visibility.
    pub visibility: Visibility,
    /// Roles that may read. May contain `owner`.
    pub read_roles: Vec<String>,
    /// Roles that may update and delete. May contain `owner`.
    pub write_roles: Vec<String>,
    /// Opaque reference to externally stored content.
    pub content_ref: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Bumped by every stored change. Writes are conditional on it.
    pub version: i64,
}

/// A report about to be inserted; the repository assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDraft {
    /// Handle of the creator.
    pub owner: String,
    /// Title.
    pub title: String,
    /// Body text.
    pub detail: String,
    /// Initial status.
    pub status: ReportStatus,
    /// Read visibility.
    pub visibility: Visibility,
    /// Roles that may read.
    pub read_roles: Vec<String>,
    /// Roles that may write.
    pub write_roles: Vec<String>,
    /// Content reference.
    pub content_ref: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl ReportDraft {
    /// Turns the draft into a report with the given id.
    pub fn into_report(self, id: ReportId) -> Report {
        Report {
            id,
            owner: self.owner,
            title: self.title,
            detail: self.detail,
            status: self.status,
            rejection: None,
            visibility: self.visibility,
            read_roles: self.read_roles,
            write_roles: self.write_roles,
            content_ref: self.content_ref,
            created_at: self.created_at,
            updated_at: self.created_at,
            version: 0,
        }
    }
}

/// Caller input for creating a report.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewReport {
    /// Title.
    pub title: String,
    /// Body text.
    pub detail: String,
    /// Read visibility; restricted when absent.
    #[serde(default)]
    pub visibility: Option<Visibility>,
    /// Read roles; policy default when absent.
    #[serde(default)]
    pub read_roles: Option<Vec<String>>,
    /// Write roles; policy default when absent.
    #[serde(default)]
    pub write_roles: Option<Vec<String>>,
    /// Content reference.
    #[serde(default)]
    pub content_ref: Option<String>,
}

/// Caller input for editing a report. Absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportUpdate {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New body text.
    #[serde(default)]
    pub detail: Option<String>,
    /// New content reference.
    #[serde(default)]
    pub content_ref: Option<String>,
}

/// Caller input for a lifecycle transition.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    /// Target status.
    pub status: ReportStatus,
    /// Required when the target is `rejected`, refused otherwise.
    #[serde(default)]
    pub rejection: Option<RejectionReason>,
}

/// Repository-level listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReportFilter {
    /// Only reports owned by this handle.
    #[serde(default)]
    pub owner: Option<String>,
    /// Only reports in this status.
    #[serde(default)]
    pub status: Option<ReportStatus>,
}

impl ReportFilter {
    /// Returns `true` if the report passes the filter.
    pub fn matches(&self, report: &Report) -> bool {
        self.owner.as_deref().map_or(true, |o| report.owner == o)
            && self.status.map_or(true, |s| report.status == s)
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Result of a conditional [`ReportRepository::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The row was replaced and its version bumped.
    Written,
    /// The row changed after it was read.
    Stale,
    /// The row no longer exists.
    Missing,
}

/// Persistence of reports.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Looks a report up.
    async fn find(&self, id: ReportId) -> CoreResult<Option<Report>>;

    /// Lists reports matching the filter, ordered by id.
    async fn list(&self, filter: &ReportFilter) -> CoreResult<Vec<Report>>;

    /// Inserts a draft and returns the stored report.
    async fn insert(&self, draft: ReportDraft) -> CoreResult<Report>;

    /// Overwrites a stored report only if the stored version still equals
    /// `report.version`, then stores `report.version + 1`.
    async fn update(&self, report: &Report) -> CoreResult<WriteOutcome>;

    /// Deletes a report. Returns `false` if it was unknown.
    async fn delete(&self, id: ReportId) -> CoreResult<bool>;
}

// =============================================================================
// Policy
// =============================================================================

/// Service-wide role requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPolicy {
    /// Roles that may create reports.
    #[serde(default = "default_create_roles")]
    pub create_roles: Vec<String>,
    /// Roles that may read every report and move it through its lifecycle.
    #[serde(default = "default_moderate_roles")]
    pub moderate_roles: Vec<String>,
    /// Read roles for reports that declare none.
    #[serde(default = "default_read_roles")]
    pub default_read_roles: Vec<String>,
    /// Write roles for reports that declare none.
    #[serde(default = "default_write_roles")]
    pub default_write_roles: Vec<String>,
}

fn default_create_roles() -> Vec<String> {
    vec!["student".into(), "staff".into(), "admin".into()]
}

fn default_moderate_roles() -> Vec<String> {
    vec!["staff".into(), "admin".into()]
}

fn default_read_roles() -> Vec<String> {
    vec![OWNER_ROLE.into()]
}

fn default_write_roles() -> Vec<String> {
    vec![OWNER_ROLE.into()]
}

impl Default for ReportPolicy {
    fn default() -> Self {
        Self {
            create_roles: default_create_roles(),
            moderate_roles: default_moderate_roles(),
            default_read_roles: default_read_roles(),
            default_write_roles: default_write_roles(),
        }
    }
}

/// Normalizes roles for a resource requirement, where `owner` is allowed.
fn normalize_requirement(raw: &[String]) -> CoreResult<Vec<String>> {
    let mut roles = raw
        .iter()
        .map(|r| {
            let trimmed = r.trim().to_ascii_lowercase();
            if trimmed == OWNER_ROLE {
                Ok(trimmed)
            } else {
                normalize_role(&trimmed)
            }
        })
        .collect::<CoreResult<Vec<_>>>()?;
    roles.sort();
    roles.dedup();
    Ok(roles)
}

fn validate_text(field: &str, value: &str, max: usize) -> CoreResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > max {
        return Err(CoreError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value.to_string())
}

// =============================================================================
// Report Service
// =============================================================================

/// Gated access to reports.
pub struct ReportService {
    repository: Arc<dyn ReportRepository>,
    gate: AuthorizationGate,
    policy: ReportPolicy,
    renderer: Arc<dyn ReportRenderer>,
    metrics: AuthMetrics,
}

impl ReportService {
    /// Creates the service.
    pub fn new(
        repository: Arc<dyn ReportRepository>,
        gate: AuthorizationGate,
        policy: ReportPolicy,
        renderer: Arc<dyn ReportRenderer>,
        metrics: AuthMetrics,
    ) -> Self {
        Self {
            repository,
            gate,
            policy,
            renderer,
            metrics,
        }
    }

    /// Returns the policy.
    pub fn policy(&self) -> &ReportPolicy {
        &self.policy
    }

    /// Describes the report collection to the gate.
    pub fn collection_descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor::new("reports").require(Action::Create, self.policy.create_roles.clone())
    }

    /// Describes a single report to the gate.
    pub fn descriptor(&self, report: &Report) -> ResourceDescriptor {
        let readers = report
            .read_roles
            .iter()
            .chain(&report.write_roles)
            .chain(&self.policy.moderate_roles)
            .cloned()
            .collect::<BTreeSet<_>>();

        ResourceDescriptor::new("report")
            .with_id(report.id)
            .public(report.visibility == Visibility::Public)
            .require(Action::Read, readers.clone())
            .require(Action::List, readers)
            .require(Action::Update, report.write_roles.clone())
            .require(Action::Delete, report.write_roles.clone())
            .require(Action::Moderate, self.policy.moderate_roles.clone())
    }

    fn enforce(
        &self,
        roles: &[String],
        resource: &ResourceDescriptor,
        action: Action,
        principal: &Principal,
    ) -> CoreResult<()> {
        match self.gate.authorize(roles, resource, action) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                self.metrics.authorization_denied(reason.as_str());
                tracing::info!(
                    identity = %principal.identity,
                    kind = resource.kind(),
                    id = resource.id().unwrap_or("-"),
                    action = %action,
                    reason = reason.as_str(),
                    "Access denied"
                );
                Err(CoreError::Forbidden)
            }
        }
    }

    async fn load(&self, id: ReportId) -> CoreResult<Report> {
        self.repository
            .find(id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("report {id}")))
    }

    /// Fetches a report the caller may read.
    pub async fn fetch(&self, principal: &Principal, id: ReportId) -> CoreResult<Report> {
        let report = self.load(id).await?;
        let roles = principal.effective_roles(Some(&report.owner));
        self.enforce(&roles, &self.descriptor(&report), Action::Read, principal)?;
        Ok(report)
    }

    /// Lists the reports matching `filter` that the caller may see.
    pub async fn list(&self, principal: &Principal, filter: &ReportFilter) -> CoreResult<Vec<Report>> {
        let candidates = self.repository.list(filter).await?;

        let visible = candidates
            .into_iter()
            .filter(|report| {
                let roles = principal.effective_roles(Some(&report.owner));
                self.gate
                    .authorize(&roles, &self.descriptor(report), Action::List)
                    .is_allowed()
            })
            .collect::<Vec<_>>();

        tracing::debug!(identity = %principal.identity, count = visible.len(), "Listed reports");
        Ok(visible)
    }

    /// Creates a report owned by the caller.
    pub async fn create(&self, principal: &Principal, input: NewReport) -> CoreResult<Report> {
        self.enforce(
            &principal.roles,
            &self.collection_descriptor(),
            Action::Create,
            principal,
        )?;

        let title = validate_text("title", &input.title, MAX_TITLE_LEN)?;
        let detail = validate_text("detail", &input.detail, MAX_DETAIL_LEN)?;
        let read_roles =
            normalize_requirement(input.read_roles.as_deref().unwrap_or(&self.policy.default_read_roles))?;
        let write_roles = normalize_requirement(
            input
                .write_roles
                .as_deref()
                .unwrap_or(&self.policy.default_write_roles),
        )?;

        let draft = ReportDraft {
            owner: principal.identity.clone(),
            title,
            detail,
            status: ReportStatus::Open,
            visibility: input.visibility.unwrap_or_default(),
            read_roles,
            write_roles,
            content_ref: input.content_ref,
            created_at: Utc::now(),
        };

        let report = self.repository.insert(draft).await?;
        tracing::info!(id = %report.id, owner = %report.owner, "Report created");
        Ok(report)
    }

    /// Edits an open report.
    pub async fn update(
        &self,
        principal: &Principal,
        id: ReportId,
        update: ReportUpdate,
    ) -> CoreResult<Report> {
        let mut report = self.load(id).await?;
        let roles = principal.effective_roles(Some(&report.owner));
        self.enforce(&roles, &self.descriptor(&report), Action::Update, principal)?;

        if report.status != ReportStatus::Open {
            return Err(CoreError::conflict("only open reports can be edited"));
        }

        if let Some(title) = update.title {
            report.title = validate_text("title", &title, MAX_TITLE_LEN)?;
        }
        if let Some(detail) = update.detail {
            report.detail = validate_text("detail", &detail, MAX_DETAIL_LEN)?;
        }
        if update.content_ref.is_some() {
            report.content_ref = update.content_ref;
        }
        report.updated_at = Utc::now();

        self.store(&mut report).await?;
        tracing::info!(id = %id, identity = %principal.identity, "Report updated");
        Ok(report)
    }

    /// Deletes a report.
    pub async fn delete(&self, principal: &Principal, id: ReportId) -> CoreResult<()> {
        let report = self.load(id).await?;
        let roles = principal.effective_roles(Some(&report.owner));
        self.enforce(&roles, &self.descriptor(&report), Action::Delete, principal)?;

        if !self.repository.delete(id).await? {
            return Err(CoreError::not_found(format!("report {id}")));
        }
        tracing::info!(id = %id, identity = %principal.identity, "Report deleted");
        Ok(())
    }

    /// Moves a report through its lifecycle.
    pub async fn change_status(
        &self,
        principal: &Principal,
        id: ReportId,
        change: StatusChange,
    ) -> CoreResult<Report> {
        let mut report = self.load(id).await?;
        let roles = principal.effective_roles(Some(&report.owner));
        self.enforce(&roles, &self.descriptor(&report), Action::Moderate, principal)?;

        match (change.status, change.rejection) {
            (ReportStatus::Rejected, None) => {
                return Err(CoreError::validation("rejection requires a reason"));
            }
            (ReportStatus::Rejected, Some(_)) => {}
            (_, Some(_)) => {
                return Err(CoreError::validation(
                    "a reason is only accepted when rejecting",
                ));
            }
            (_, None) => {}
        }

        if !report.status.can_transition_to(change.status) {
            return Err(CoreError::conflict(format!(
                "cannot move report from {} to {}",
                report.status, change.status
            )));
        }

        let previous = report.status;
        report.status = change.status;
        if change.status == ReportStatus::Rejected {
            report.rejection = change.rejection;
        }
        report.updated_at = Utc::now();

        self.store(&mut report).await?;
        tracing::info!(
            id = %id,
            identity = %principal.identity,
            from = %previous,
            to = %report.status,
            "Report status changed"
        );
        Ok(report)
    }

    async fn store(&self, report: &mut Report) -> CoreResult<()> {
        match self.repository.update(report).await? {
            WriteOutcome::Written => {
                report.version += 1;
                Ok(())
            }
            WriteOutcome::Stale => {
                tracing::debug!(id = %report.id, version = report.version, "Lost write race");
                Err(CoreError::conflict(format!(
                    "report {} was changed by another request",
                    report.id
                )))
            }
            WriteOutcome::Missing => Err(CoreError::not_found(format!("report {}", report.id))),
        }
    }

    /// Renders a report the caller may read.
    pub async fn render(&self, principal: &Principal, id: ReportId) -> CoreResult<RenderedReport> {
        let report = self.fetch(principal, id).await?;
        self.renderer.render(&report)
    }
}

impl fmt::Debug for ReportService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportService")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
