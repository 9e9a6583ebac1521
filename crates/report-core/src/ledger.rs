// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session/revocation ledger for refresh tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::types::RefreshRecord;

/// How access tokens are checked against the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationMode {
    /// Access tokens carry their session id and are rejected once that
    /// session is revoked. One ledger read per request.
    #[default]
    Strict,
    /// Access tokens stay valid until expiry; only refresh tokens consult
    /// the ledger.
    Stateless,
}

impl RevocationMode {
    /// Returns the configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Stateless => "stateless",
        }
    }

    /// Parses a configuration name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "stateless" => Some(Self::Stateless),
            _ => None,
        }
    }
}

/// Persistence of issued and invalidated refresh tokens.
///
/// Every write is a single atomic store operation. Implementations must be
/// safe to call concurrently from many request tasks.
#[async_trait]
pub trait SessionLedger: Send + Sync {
    /// Records a newly issued, active refresh token.
    async fn record(&self, record: &RefreshRecord) -> CoreResult<()>;

    /// Revokes one token. Returns `false` if it was unknown or already
    /// inactive.
    async fn revoke(&self, token_id: &str) -> CoreResult<bool>;

    /// Revokes every active token of an identity. Returns the count.
    async fn revoke_all(&self, identity: &str) -> CoreResult<u64>;

    /// Returns `true` unless the token is known and active. Unknown ids
    /// count as revoked.
    async fn is_revoked(&self, token_id: &str) -> CoreResult<bool>;

    /// Consumes `old_id` and records `replacement` in one step.
    ///
    /// Fails with `TokenRevoked` if `old_id` is unknown, inactive or expired
    /// at `now`. Concurrent rotations of the same id: exactly one wins.
    async fn rotate(
        &self,
        old_id: &str,
        replacement: &RefreshRecord,
        now: DateTime<Utc>,
    ) -> CoreResult<()>;

    /// Looks a record up.
    async fn find(&self, token_id: &str) -> CoreResult<Option<RefreshRecord>>;

    /// Deletes records that expired before `now`. Returns the count.
    async fn purge_expired(&self, now: DateTime<Utc>) -> CoreResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revocation_mode_parse() {
        assert_eq!(RevocationMode::parse("Strict"), Some(RevocationMode::Strict));
        assert_eq!(RevocationMode::parse(" stateless "), Some(RevocationMode::Stateless));
        assert_eq!(RevocationMode::parse("lax"), None);
        assert_eq!(RevocationMode::default(), RevocationMode::Strict);
    }
}
