// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Authentication module.
//!
//! This module provides:
//! - JWT claims for access and refresh tokens
//! - Token issuing, validation, rotation and revocation
//! - The per-request authentication context

mod claims;
mod context;
mod jwt;

pub use claims::{Claims, TokenKind};
pub use context::AuthContext;
pub use jwt::{IssuedTokens, JwtConfig, TokenService, MIN_SECRET_LEN};
