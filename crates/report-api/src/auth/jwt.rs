// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Token issuing, validation and rotation.
//!
//! Validation runs in a fixed order and stops at the first failure:
//!
//! ```text
//! structure ──> signature/alg/issuer ──> expiry ──> kind ──> ledger
//! MalformedToken  InvalidSignature       TokenExpired  Malformed  TokenRevoked
//! ```

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use report_core::{
    AuthMetrics, CoreError, CoreResult, CredentialStore, RefreshRecord, RevocationMode,
    SessionLedger, VerifiedIdentity,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Claims, TokenKind};
use crate::error::{ApiError, ApiResult};

/// Minimum HS256 key length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

// =============================================================================
// JwtConfig
// =============================================================================

/// JWT configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Secret key for signing tokens.
    #[serde(skip_serializing)]
    pub secret: String,
    /// Token issuer.
    pub issuer: String,
    /// Access token lifetime in seconds.
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_ttl_secs: i64,
    /// Clock skew tolerance in seconds.
    pub leeway_secs: u64,
    /// Whether access tokens are checked against the ledger.
    pub revocation_mode: RevocationMode,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: "report-gateway".to_string(),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
            leeway_secs: 30,
            revocation_mode: RevocationMode::Strict,
        }
    }
}

impl JwtConfig {
    /// Creates a new configuration with the given secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    /// Sets the issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets both token lifetimes.
    pub fn with_ttls(mut self, access_secs: i64, refresh_secs: i64) -> Self {
        self.access_ttl_secs = access_secs;
        self.refresh_ttl_secs = refresh_secs;
        self
    }

    /// Sets the clock skew tolerance.
    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }

    /// Sets the revocation mode.
    pub fn with_revocation_mode(mut self, mode: RevocationMode) -> Self {
        self.revocation_mode = mode;
        self
    }

    /// Validates the configuration. A weak key is fatal.
    pub fn validate(&self) -> ApiResult<()> {
        if self.secret.is_empty() {
            return Err(ApiError::internal("JWT secret is not configured"));
        }
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(ApiError::internal(format!(
                "JWT secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.access_ttl_secs <= 0 || self.refresh_ttl_secs <= self.access_ttl_secs {
            return Err(ApiError::internal(
                "token lifetimes must satisfy 0 < access < refresh",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("leeway_secs", &self.leeway_secs)
            .field("revocation_mode", &self.revocation_mode)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// IssuedTokens
// =============================================================================

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    /// Signed access token.
    pub access_token: String,
    /// Signed refresh token.
    pub refresh_token: String,
    /// Ledger id of the refresh token.
    pub session_id: String,
    /// Access token lifetime in seconds.
    pub access_expires_in: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_expires_in: i64,
}

// =============================================================================
// TokenService
// =============================================================================

/// Issues, validates, rotates and revokes tokens.
///
/// Keys are derived once and shared read-only.
#[derive(Clone)]
pub struct TokenService {
    config: Arc<JwtConfig>,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
    ledger: Arc<dyn SessionLedger>,
    credentials: Arc<CredentialStore>,
    metrics: AuthMetrics,
}

impl TokenService {
    /// Creates a token service. Fails on a missing or short key.
    pub fn new(
        config: JwtConfig,
        ledger: Arc<dyn SessionLedger>,
        credentials: Arc<CredentialStore>,
        metrics: AuthMetrics,
    ) -> ApiResult<Self> {
        config.validate()?;

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        // `iat` is not a spec claim here; `Claims` fails to deserialize without it.
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = config.leeway_secs;
        validation.validate_aud = false;

        Ok(Self {
            config: Arc::new(config),
            encoding_key: Arc::new(encoding_key),
            decoding_key: Arc::new(decoding_key),
            validation: Arc::new(validation),
            ledger,
            credentials,
            metrics,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Returns the revocation mode.
    pub fn revocation_mode(&self) -> RevocationMode {
        self.config.revocation_mode
    }

    /// Signs arbitrary claims with the service key.
    pub fn sign(&self, claims: &Claims) -> CoreResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| CoreError::internal(format!("Failed to create token: {}", e)))
    }

    // =========================================================================
    // Issuing
    // =========================================================================

    /// Issues an access/refresh pair for a verified identity.
    ///
    /// The refresh token is recorded in the ledger before anything is
    /// returned.
    pub async fn issue(&self, identity: &VerifiedIdentity) -> CoreResult<IssuedTokens> {
        if identity.identity().is_empty() {
            return Err(CoreError::InvalidCredentials);
        }

        let now = Utc::now();
        let record = self.refresh_record(identity.identity(), now);
        self.ledger.record(&record).await?;

        let tokens = self.sign_pair(identity, &record, now)?;
        tracing::info!(identity = %identity.identity(), session = %record.id, "Tokens issued");
        Ok(tokens)
    }

    fn refresh_record(&self, identity: &str, now: DateTime<Utc>) -> RefreshRecord {
        RefreshRecord::active(
            Uuid::now_v7().to_string(),
            identity,
            now,
            now + Duration::seconds(self.config.refresh_ttl_secs),
        )
    }

    fn sign_pair(
        &self,
        identity: &VerifiedIdentity,
        record: &RefreshRecord,
        now: DateTime<Utc>,
    ) -> CoreResult<IssuedTokens> {
        let access = Claims::access(
            identity.identity(),
            identity.roles().to_vec(),
            now,
            self.config.access_ttl_secs,
        )
        .with_issuer(&self.config.issuer)
        .with_session_id(&record.id)
        .with_name(identity.display_name());

        let refresh = Claims::refresh(
            identity.identity(),
            &record.id,
            now,
            self.config.refresh_ttl_secs,
        )
        .with_issuer(&self.config.issuer);

        let tokens = IssuedTokens {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            session_id: record.id.clone(),
            access_expires_in: self.config.access_ttl_secs,
            refresh_expires_in: self.config.refresh_ttl_secs,
        };
        self.metrics.token_issued(TokenKind::Access.as_str());
        self.metrics.token_issued(TokenKind::Refresh.as_str());
        Ok(tokens)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validates a token's structure, signature, expiry and kind. Does not
    /// consult the ledger.
    pub fn decode(&self, token: &str, expected: TokenKind) -> CoreResult<Claims> {
        check_structure(token)?;

        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => CoreError::TokenExpired,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::InvalidIssuer
                | ErrorKind::ImmatureSignature => CoreError::InvalidSignature,
                _ => CoreError::MalformedToken,
            })?;

        if claims.typ != expected {
            return Err(CoreError::MalformedToken);
        }
        Ok(claims)
    }

    /// Validates an access token. In strict mode the session it was issued
    /// with must still be active.
    pub async fn validate_access(&self, token: &str) -> CoreResult<Claims> {
        let result = self.validate_access_inner(token).await;
        if let Err(e) = &result {
            self.metrics.validation_failed(e);
        }
        result
    }

    async fn validate_access_inner(&self, token: &str) -> CoreResult<Claims> {
        let claims = self.decode(token, TokenKind::Access)?;

        if self.config.revocation_mode == RevocationMode::Strict {
            let sid = claims.sid.as_deref().ok_or(CoreError::MalformedToken)?;
            if self.ledger.is_revoked(sid).await? {
                return Err(CoreError::TokenRevoked);
            }
        }
        Ok(claims)
    }

    /// Validates a refresh token, including the ledger.
    pub async fn validate_refresh(&self, token: &str) -> CoreResult<Claims> {
        let result = async {
            let claims = self.decode(token, TokenKind::Refresh)?;
            if self.ledger.is_revoked(&claims.jti).await? {
                return Err(CoreError::TokenRevoked);
            }
            Ok(claims)
        }
        .await;

        if let Err(e) = &result {
            self.metrics.validation_failed(e);
        }
        result
    }

    // =========================================================================
    // Rotation & Revocation
    // =========================================================================

    /// Exchanges a refresh token for a new pair.
    ///
    /// The presented id is consumed atomically; presenting it again fails
    /// with `TokenRevoked`. Roles are re-read so changes take effect here.
    pub async fn rotate(&self, refresh_token: &str) -> CoreResult<IssuedTokens> {
        let claims = self.decode(refresh_token, TokenKind::Refresh).map_err(|e| {
            self.metrics.validation_failed(&e);
            e
        })?;

        if self.ledger.is_revoked(&claims.jti).await? {
            return Err(self.refused_reuse(&claims));
        }

        let identity = match self.credentials.reload(&claims.sub).await {
            Ok(identity) => identity,
            Err(CoreError::InvalidCredentials) => {
                self.ledger.revoke(&claims.jti).await?;
                tracing::info!(identity = %claims.sub, "Refresh refused for inactive user");
                return Err(CoreError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        let record = self.refresh_record(identity.identity(), now);
        if let Err(e) = self.ledger.rotate(&claims.jti, &record, now).await {
            if e == CoreError::TokenRevoked {
                return Err(self.refused_reuse(&claims));
            }
            return Err(e);
        }
        self.metrics.revoked("rotation", 1);

        let tokens = self.sign_pair(&identity, &record, now)?;
        tracing::debug!(identity = %claims.sub, from = %claims.jti, to = %record.id, "Tokens rotated");
        Ok(tokens)
    }

    fn refused_reuse(&self, claims: &Claims) -> CoreError {
        let error = CoreError::TokenRevoked;
        self.metrics.validation_failed(&error);
        tracing::warn!(
            identity = %claims.sub,
            session = %claims.jti,
            "Rejected reuse of a consumed refresh token"
        );
        error
    }

    /// Revokes one session. Returns `false` if it was already inactive.
    pub async fn revoke(&self, session_id: &str) -> CoreResult<bool> {
        let revoked = self.ledger.revoke(session_id).await?;
        if revoked {
            self.metrics.revoked("single", 1);
            tracing::info!(session = %session_id, "Session revoked");
        }
        Ok(revoked)
    }

    /// Revokes every active session of an identity.
    pub async fn revoke_all(&self, identity: &str) -> CoreResult<u64> {
        let count = self.ledger.revoke_all(identity).await?;
        self.metrics.revoked("all", count);
        tracing::info!(identity = %identity, count, "All sessions revoked");
        Ok(count)
    }

    /// Deletes expired ledger rows.
    pub async fn purge_expired(&self) -> CoreResult<u64> {
        self.ledger.purge_expired(Utc::now()).await
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Three dot-separated segments; header and payload are base64url JSON
/// objects; signature is non-empty.
fn check_structure(token: &str) -> CoreResult<()> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CoreError::MalformedToken);
    };
    if signature.is_empty() {
        return Err(CoreError::MalformedToken);
    }

    for segment in [header, payload] {
        let bytes = URL_SAFE_NO_PAD
            .decode(segment)
            .map_err(|_| CoreError::MalformedToken)?;
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|_| CoreError::MalformedToken)?;
        if !value.is_object() {
            return Err(CoreError::MalformedToken);
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
