// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Bearer credential for API and WebSocket access
    Access,
    /// Link sent to confirm an email address
    EmailVerification,
    /// Single-use password reset link
    PasswordReset,
}

/// Identity embedded into an issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: String,
    pub name: String,
    pub role: Role,
}

/// Claims carried by every token issued by this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ID)
    pub sub: String,
    /// Display label
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Role,
    pub purpose: TokenPurpose,
    /// Unique token ID
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated user information extracted from a verified access token.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Account ID
    pub user_id: String,
    /// Display label used in chat
    pub name: String,
    pub role: Role,
    /// Token expiration timestamp
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Check if the user has a specific role or higher.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            role: claims.role,
            expires_at: claims.exp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticated_user_from_claims() {
        let claims = Claims {
            sub: "u1".to_string(),
            name: "Ada".to_string(),
            role: Role::Admin,
            purpose: TokenPurpose::Access,
            jti: "j".to_string(),
            iat: 1,
            exp: 2,
        };
        let user = AuthenticatedUser::from(claims);
        assert_eq!(user.user_id, "u1");
        assert!(user.is_admin());
        assert!(user.has_role(Role::Customer));
        assert_eq!(user.expires_at, 2);
    }

    #[test]
    fn purpose_serializes_snake_case() {
        let json = serde_json::to_string(&TokenPurpose::PasswordReset).unwrap();
        assert_eq!(json, "\"password_reset\"");
    }
}
