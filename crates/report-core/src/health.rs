// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Store readiness probing.

use async_trait::async_trait;

use crate::error::CoreResult;

/// Something the readiness endpoint can ping.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Backend name for status output.
    fn backend(&self) -> &'static str;

    /// Round-trips to the store.
    async fn ping(&self) -> CoreResult<()>;
}
