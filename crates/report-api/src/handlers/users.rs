// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! User administration handlers.
//!
//! Both endpoints run the gate before touching the store, so a caller
//! without an admin role learns nothing about which handles exist.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use report_core::{Action, Decision, ResourceDescriptor};
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::extractors::{Auth, ValidatedJson};
use crate::response::{ApiResponse, RevocationResponse};
use crate::state::AppState;

fn authorize_admin(state: &AppState, ctx: &AuthContext, handle: &str) -> ApiResult<()> {
    let resource = ResourceDescriptor::new("user")
        .with_id(handle)
        .require(Action::Administer, state.config.admin_roles.clone());

    match state.gate.authorize(&ctx.roles, &resource, Action::Administer) {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => {
            state.metrics.authorization_denied(reason.as_str());
            tracing::info!(
                identity = %ctx.identity,
                target = %handle,
                reason = reason.as_str(),
                "User administration denied"
            );
            Err(ApiError::forbidden("administer denied"))
        }
    }
}

// =============================================================================
// Roles
// =============================================================================

/// Role update request body.
#[derive(Debug, Deserialize)]
pub struct RolesRequest {
    /// Replacement role set.
    pub roles: Vec<String>,
}

/// Role update response.
#[derive(Debug, Serialize, Deserialize)]
pub struct RolesResponse {
    /// User handle.
    pub handle: String,
    /// Normalized roles now stored.
    pub roles: Vec<String>,
}

/// PUT /api/v1/users/{handle}/roles
///
/// Replaces a user's roles. Tokens already issued keep their roles until
/// the next refresh.
pub async fn set_user_roles(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(handle): Path<String>,
    ValidatedJson(request): ValidatedJson<RolesRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize_admin(&state, &ctx, &handle)?;

    let roles = state.credentials.set_roles(&handle, &request.roles).await?;
    tracing::info!(admin = %ctx.identity, target = %handle, roles = ?roles, "Roles changed");

    Ok(Json(ApiResponse::success(RolesResponse { handle, roles })))
}

// =============================================================================
// Disable
// =============================================================================

/// POST /api/v1/users/{handle}/disable
///
/// Soft-disables a user and revokes every session they hold.
pub async fn disable_user(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Path(handle): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authorize_admin(&state, &ctx, &handle)?;

    state.credentials.disable(&handle).await?;
    let revoked = state.tokens.revoke_all(&handle).await?;
    tracing::info!(admin = %ctx.identity, target = %handle, revoked, "User disabled");

    Ok(Json(ApiResponse::success(RevocationResponse { revoked })))
}
