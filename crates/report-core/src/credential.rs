// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Credential store: user identities, hashed secrets and roles.
//!
//! Secrets are hashed with Argon2id on the blocking thread pool. Token
//! issuance takes a [`VerifiedIdentity`], which only this module can build,
//! so a token can never be minted for an unverified caller.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{normalize_roles, User, DEFAULT_ROLE};

/// Minimum secret length in bytes.
pub const MIN_SECRET_LEN: usize = 8;

/// Maximum secret length in bytes.
pub const MAX_SECRET_LEN: usize = 128;

// =============================================================================
// Repository
// =============================================================================

/// Persistence of users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Looks a user up by handle.
    async fn find(&self, handle: &str) -> CoreResult<Option<User>>;

    /// Inserts a new user. Fails with `Conflict` if the handle exists.
    async fn insert(&self, user: &User) -> CoreResult<()>;

    /// Replaces the secret hash. Returns `false` if the user is unknown.
    async fn update_secret(
        &self,
        handle: &str,
        secret_hash: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<bool>;

    /// Replaces the role set. Returns `false` if the user is unknown.
    async fn update_roles(&self, handle: &str, roles: &[String], now: DateTime<Utc>)
        -> CoreResult<bool>;

    /// Sets the soft-disable flag. Returns `false` if the user is unknown.
    async fn set_disabled(&self, handle: &str, disabled: bool, now: DateTime<Utc>)
        -> CoreResult<bool>;
}

// =============================================================================
// Hashing
// =============================================================================

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashingConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Number of passes.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Degree of parallelism.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    Params::DEFAULT_M_COST
}

fn default_iterations() -> u32 {
    Params::DEFAULT_T_COST
}

fn default_parallelism() -> u32 {
    Params::DEFAULT_P_COST
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl HashingConfig {
    /// The cheapest parameters Argon2 accepts. Test use only.
    pub fn minimal() -> Self {
        Self {
            memory_kib: Params::MIN_M_COST,
            iterations: Params::MIN_T_COST,
            parallelism: Params::MIN_P_COST,
        }
    }
}

/// Hashes and verifies secrets.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretHasher {
    config: HashingConfig,
}

impl SecretHasher {
    /// Creates a hasher with the given cost parameters.
    pub fn new(config: HashingConfig) -> Self {
        Self { config }
    }

    fn argon2(&self) -> CoreResult<Argon2<'static>> {
        let params = Params::new(
            self.config.memory_kib,
            self.config.iterations,
            self.config.parallelism,
            None,
        )
        .map_err(|e| CoreError::internal(format!("invalid argon2 parameters: {e}")))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hashes a secret into a PHC string. CPU-bound.
    pub fn hash(&self, secret: &str) -> CoreResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()?
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CoreError::internal(format!("password hashing failed: {e}")))
    }

    /// Verifies a secret against a PHC string. CPU-bound.
    ///
    /// The cost parameters are read from the hash itself.
    pub fn verify(&self, secret: &str, hash: &str) -> CoreResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| CoreError::internal(format!("invalid password hash: {e}")))?;

        match Argon2::default().verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CoreError::internal(format!("password verification failed: {e}"))),
        }
    }

    /// [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(&self, secret: String) -> CoreResult<String> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| CoreError::internal(format!("hashing task failed: {e}")))?
    }

    /// [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_blocking(&self, secret: String, hash: String) -> CoreResult<bool> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.verify(&secret, &hash))
            .await
            .map_err(|e| CoreError::internal(format!("verification task failed: {e}")))?
    }
}

// =============================================================================
// Verified Identity
// =============================================================================

/// An identity whose credentials were checked by the [`CredentialStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    identity: String,
    display_name: String,
    roles: Vec<String>,
}

impl VerifiedIdentity {
    fn from_user(user: &User) -> Self {
        Self {
            identity: user.handle.clone(),
            display_name: user.display_name.clone(),
            roles: user.roles.clone(),
        }
    }

    /// Returns the user handle.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Returns the display name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the roles at verification time.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

// =============================================================================
// Registration
// =============================================================================

/// Input for self-registration.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    /// Login handle.
    pub handle: String,
    /// Display name.
    pub display_name: String,
    /// Plain secret.
    pub secret: String,
}

/// Normalizes and validates a login handle.
///
/// Handles are 3 to 254 characters of ASCII letters, digits and `+_.-@`,
/// compared case-insensitively. E-mail addresses qualify.
pub fn normalize_handle(raw: &str) -> CoreResult<String> {
    let handle = raw.trim().to_ascii_lowercase();
    if handle.len() < 3 || handle.len() > 254 {
        return Err(CoreError::validation("handle must be 3..=254 characters"));
    }
    if !handle
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '.' | '-' | '@'))
    {
        return Err(CoreError::validation("handle contains invalid characters"));
    }
    if handle.matches('@').count() > 1 || handle.starts_with('@') || handle.ends_with('@') {
        return Err(CoreError::validation("handle is not a valid e-mail address"));
    }
    Ok(handle)
}

fn validate_secret(secret: &str) -> CoreResult<()> {
    if secret.len() < MIN_SECRET_LEN {
        return Err(CoreError::validation(format!(
            "secret must be at least {MIN_SECRET_LEN} characters"
        )));
    }
    if secret.len() > MAX_SECRET_LEN {
        return Err(CoreError::validation(format!(
            "secret must be at most {MAX_SECRET_LEN} characters"
        )));
    }
    Ok(())
}

// =============================================================================
// Credential Store
// =============================================================================

/// Verifies credentials and manages user secrets and roles.
pub struct CredentialStore {
    users: Arc<dyn UserRepository>,
    hasher: SecretHasher,
    dummy_hash: tokio::sync::OnceCell<String>,
}

impl CredentialStore {
    /// Creates a store over a user repository.
    pub fn new(users: Arc<dyn UserRepository>, hasher: SecretHasher) -> Self {
        Self {
            users,
            hasher,
            dummy_hash: tokio::sync::OnceCell::new(),
        }
    }

    /// Returns the hasher.
    pub fn hasher(&self) -> SecretHasher {
        self.hasher
    }

    /// Looks a user up.
    pub async fn find(&self, handle: &str) -> CoreResult<Option<User>> {
        self.users.find(&handle.to_ascii_lowercase()).await
    }

    /// Checks a handle/secret pair.
    ///
    /// Unknown handle, wrong secret and disabled account all fail with
    /// `InvalidCredentials`.
    pub async fn verify(&self, handle: &str, secret: &str) -> CoreResult<VerifiedIdentity> {
        let handle = handle.trim().to_ascii_lowercase();
        let user = self.users.find(&handle).await?;

        let Some(user) = user else {
            // Burn comparable CPU for unknown handles.
            let dummy = self.dummy_hash().await?;
            let _ = self
                .hasher
                .verify_blocking(secret.to_string(), dummy)
                .await;
            tracing::debug!(handle = %handle, "Login for unknown handle");
            return Err(CoreError::InvalidCredentials);
        };

        let matches = self
            .hasher
            .verify_blocking(secret.to_string(), user.secret_hash.clone())
            .await?;

        if !matches {
            tracing::debug!(handle = %handle, "Secret mismatch");
            return Err(CoreError::InvalidCredentials);
        }
        if user.disabled {
            tracing::debug!(handle = %handle, "Login for disabled account");
            return Err(CoreError::InvalidCredentials);
        }

        Ok(VerifiedIdentity::from_user(&user))
    }

    /// Re-reads an identity for a refresh, picking up role changes.
    ///
    /// Fails with `InvalidCredentials` if the user vanished or was disabled.
    pub async fn reload(&self, handle: &str) -> CoreResult<VerifiedIdentity> {
        match self.users.find(handle).await? {
            Some(user) if !user.disabled => Ok(VerifiedIdentity::from_user(&user)),
            _ => Err(CoreError::InvalidCredentials),
        }
    }

    /// Creates a user with the default role.
    pub async fn register(&self, registration: Registration) -> CoreResult<User> {
        let handle = normalize_handle(&registration.handle)?;
        let display_name = registration.display_name.trim().to_string();
        if display_name.is_empty() || display_name.len() > 100 {
            return Err(CoreError::validation("name must be 1..=100 characters"));
        }
        validate_secret(&registration.secret)?;

        if self.users.find(&handle).await?.is_some() {
            return Err(CoreError::conflict("handle already registered"));
        }

        let secret_hash = self.hasher.hash_blocking(registration.secret).await?;
        let now = Utc::now();
        let user = User {
            handle,
            display_name,
            secret_hash,
            roles: vec![DEFAULT_ROLE.to_string()],
            disabled: false,
            created_at: now,
            updated_at: now,
        };

        self.users.insert(&user).await?;
        tracing::info!(handle = %user.handle, "User registered");
        Ok(user)
    }

    /// Creates a user with explicit roles, bypassing self-registration
    /// defaults. Used for provisioning.
    pub async fn provision(
        &self,
        handle: &str,
        display_name: &str,
        secret: &str,
        roles: &[String],
    ) -> CoreResult<User> {
        let handle = normalize_handle(handle)?;
        validate_secret(secret)?;
        let roles = normalize_roles(roles)?;

        let secret_hash = self.hasher.hash_blocking(secret.to_string()).await?;
        let now = Utc::now();
        let user = User {
            handle,
            display_name: display_name.trim().to_string(),
            secret_hash,
            roles,
            disabled: false,
            created_at: now,
            updated_at: now,
        };

        self.users.insert(&user).await?;
        tracing::info!(handle = %user.handle, roles = ?user.roles, "User provisioned");
        Ok(user)
    }

    /// Replaces a user's secret hash.
    pub async fn rotate_secret(&self, handle: &str, new_secret_hash: &str) -> CoreResult<()> {
        PasswordHash::new(new_secret_hash)
            .map_err(|_| CoreError::validation("secret hash is not a PHC string"))?;

        if self
            .users
            .update_secret(handle, new_secret_hash, Utc::now())
            .await?
        {
            tracing::info!(handle = %handle, "Secret rotated");
            Ok(())
        } else {
            Err(CoreError::not_found(format!("user {handle}")))
        }
    }

    /// Verifies the current secret, then rotates to a new one.
    pub async fn change_secret(&self, handle: &str, current: &str, new: &str) -> CoreResult<()> {
        validate_secret(new)?;
        if current == new {
            return Err(CoreError::validation(
                "new secret must differ from the current one",
            ));
        }

        self.verify(handle, current).await?;
        let hash = self.hasher.hash_blocking(new.to_string()).await?;
        self.rotate_secret(handle, &hash).await
    }

    /// Replaces a user's roles. Applies to future token issuances only.
    pub async fn set_roles(&self, handle: &str, roles: &[String]) -> CoreResult<Vec<String>> {
        let roles = normalize_roles(roles)?;
        if self.users.update_roles(handle, &roles, Utc::now()).await? {
            tracing::info!(handle = %handle, roles = ?roles, "Roles updated");
            Ok(roles)
        } else {
            Err(CoreError::not_found(format!("user {handle}")))
        }
    }

    /// Soft-disables a user.
    pub async fn disable(&self, handle: &str) -> CoreResult<()> {
        if self.users.set_disabled(handle, true, Utc::now()).await? {
            tracing::info!(handle = %handle, "User disabled");
            Ok(())
        } else {
            Err(CoreError::not_found(format!("user {handle}")))
        }
    }

    /// Computes the hash that unknown-handle logins are checked against, so
    /// the first such login costs the same as any other.
    pub async fn warm_up(&self) -> CoreResult<()> {
        self.dummy_hash().await.map(|_| ())
    }

    async fn dummy_hash(&self) -> CoreResult<String> {
        self.dummy_hash
            .get_or_try_init(|| {
                self.hasher
                    .hash_blocking("dummy-secret-for-timing".to_string())
            })
            .await
            .cloned()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
