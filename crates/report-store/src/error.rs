// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! sqlx error classification and column conversions.

use chrono::{DateTime, Utc};
use report_core::StoreError;

/// SQLite primary result codes that clear up on their own.
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

/// Classifies a sqlx error for the retry layer.
pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::unavailable(err.to_string()),
        sqlx::Error::Database(db) => {
            if db.is_unique_violation() {
                return StoreError::conflict(db.message().to_string());
            }
            // Extended codes carry the primary code in the low byte.
            let primary = db
                .code()
                .and_then(|c| c.parse::<i32>().ok())
                .map(|c| (c & 0xff).to_string());
            match primary.as_deref() {
                Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => {
                    StoreError::unavailable(db.message().to_string())
                }
                _ => StoreError::query(db.message().to_string()),
            }
        }
        _ => StoreError::query(err.to_string()),
    }
}

/// Stores timestamps as Unix seconds.
pub(crate) fn to_unix(ts: DateTime<Utc>) -> i64 {
    ts.timestamp()
}

pub(crate) fn from_unix(secs: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::query(format!("timestamp out of range: {secs}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_transient() {
        assert!(map_sqlx_error(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!map_sqlx_error(sqlx::Error::RowNotFound).is_retryable());
    }

    #[test]
    fn test_unix_round_trip() {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(from_unix(to_unix(now)).unwrap(), now);
        assert!(from_unix(i64::MAX).is_err());
    }
}
