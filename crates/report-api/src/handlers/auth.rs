// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Authentication handlers.

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use report_core::{CoreError, Registration};
use serde::Deserialize;

use crate::auth::TokenKind;
use crate::error::{ApiError, ApiResult};
use crate::extractors::{Auth, ClientIp, ValidatedJson};
use crate::response::{ApiResponse, AuthResponse, MeResponse, RevocationResponse, UserResponse};
use crate::state::AppState;

// =============================================================================
// Register
// =============================================================================

/// POST /api/v1/auth/register
///
/// Creates an account with the default role. Disabled by configuration
/// returns 403.
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<Registration>,
) -> ApiResult<impl IntoResponse> {
    if !state.config.allow_registration {
        return Err(ApiError::forbidden("registration disabled"));
    }

    let user = state.credentials.register(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserResponse::from(&user))),
    ))
}

// =============================================================================
// Login
// =============================================================================

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// User handle.
    pub handle: String,
    /// Password.
    pub password: String,
}

/// POST /api/v1/auth/login
///
/// Verifies credentials and issues an access/refresh pair.
pub async fn login(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.handle.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("handle and password are required"));
    }

    let identity = match state
        .credentials
        .verify(&request.handle, &request.password)
        .await
    {
        Ok(identity) => identity,
        Err(e) => {
            if e == CoreError::InvalidCredentials {
                state.metrics.login("failure");
                tracing::info!(handle = %request.handle, client_ip = ?client_ip, "Login failed");
            }
            return Err(e.into());
        }
    };

    let tokens = state.tokens.issue(&identity).await?;
    state.metrics.login("success");
    tracing::info!(identity = %identity.identity(), client_ip = ?client_ip, "User logged in");

    Ok(Json(AuthResponse::from(tokens)))
}

// =============================================================================
// Refresh
// =============================================================================

/// Refresh request body.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token.
    pub refresh_token: String,
}

/// POST /api/v1/auth/refresh
///
/// Exchanges a refresh token for a new pair. Each refresh token works once.
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> ApiResult<impl IntoResponse> {
    let tokens = state.tokens.rotate(&request.refresh_token).await?;
    Ok(Json(AuthResponse::from(tokens)))
}

// =============================================================================
// Logout
// =============================================================================

/// Logout request body. Every field is optional; an empty body ends the
/// current session.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogoutRequest {
    /// End every session of the caller.
    pub all: bool,
    /// End the session of this refresh token instead of the current one.
    pub refresh_token: Option<String>,
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: LogoutRequest = if body.is_empty() {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let revoked = if request.all {
        state.tokens.revoke_all(&ctx.identity).await?
    } else {
        let session = match request.refresh_token {
            Some(token) => {
                let claims = state.tokens.decode(&token, TokenKind::Refresh)?;
                if claims.sub != ctx.identity {
                    return Err(ApiError::forbidden("refresh token of another identity"));
                }
                claims.jti
            }
            None => ctx
                .session_id
                .clone()
                .ok_or_else(|| ApiError::bad_request("no session to end"))?,
        };
        u64::from(state.tokens.revoke(&session).await?)
    };

    tracing::info!(identity = %ctx.identity, all = request.all, revoked, "User logged out");
    Ok(Json(ApiResponse::success(RevocationResponse { revoked })))
}

// =============================================================================
// Me
// =============================================================================

/// GET /api/v1/auth/me
///
/// Returns the identity and roles carried by the access token.
pub async fn me(Auth(ctx): Auth) -> impl IntoResponse {
    Json(ApiResponse::success(MeResponse {
        identity: ctx.identity,
        name: ctx.name,
        roles: ctx.roles,
        session_id: ctx.session_id,
    }))
}

// =============================================================================
// Change Password
// =============================================================================

/// Password change request body.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    /// Current password.
    pub current_password: String,
    /// New password.
    pub new_password: String,
}

/// POST /api/v1/auth/change-password
///
/// Rotates the caller's secret and ends every session, the current one
/// included.
pub async fn change_password(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .credentials
        .change_secret(&ctx.identity, &request.current_password, &request.new_password)
        .await?;
    let revoked = state.tokens.revoke_all(&ctx.identity).await?;

    Ok(Json(ApiResponse::success(RevocationResponse { revoked })))
}
