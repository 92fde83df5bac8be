// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Self-issued HS256 tokens for the storefront API.
//!
//! ## Auth Flow
//!
//! 1. Client registers or logs in with email + password
//! 2. Server verifies the bcrypt hash and issues an access token
//!    (`sub` = account id, `name`, `role`, `purpose = access`)
//! 3. Client sends `Authorization: Bearer <token>` on every protected route,
//!    or `?token=<token>` when opening the chat WebSocket
//! 4. The `Auth` / `AdminOnly` extractors verify the token before the
//!    handler body runs
//!
//! Email verification and password reset links are tokens too, with their
//! own purposes and short lifetimes.

pub mod claims;
pub mod credentials;
pub mod error;
pub mod extractor;
pub mod roles;
pub mod tokens;

pub use claims::{AuthenticatedUser, Claims, TokenPurpose, TokenSubject};
pub use credentials::{hash_password, normalize_email, verify_password};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use roles::Role;
pub use tokens::{IssuedToken, TokenService};
