// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token Service: issues and verifies HS256 bearer tokens.
//!
//! Every token carries a [`TokenPurpose`]; `verify` only accepts tokens of
//! the purpose the caller asks for, so a password-reset link can never be
//! replayed as an access token.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use uuid::Uuid;

use super::claims::{Claims, TokenPurpose, TokenSubject};
use super::AuthError;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

pub const EMAIL_VERIFICATION_TTL_HOURS: i64 = 24;
pub const PASSWORD_RESET_TTL_MINUTES: i64 = 10;

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &[u8], access_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl,
        }
    }

    /// Sign a token for `subject` that expires after `ttl`.
    pub fn issue(
        &self,
        subject: &TokenSubject,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.user_id.clone(),
            name: subject.name.clone(),
            role: subject.role,
            purpose,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(format!("token signing failed: {e}")))?;

        Ok(IssuedToken { token, claims })
    }

    /// Issue a bearer token with the configured access lifetime.
    pub fn issue_access(&self, subject: &TokenSubject) -> Result<IssuedToken, AuthError> {
        self.issue(subject, TokenPurpose::Access, self.access_ttl)
    }

    /// Validate signature, expiry and purpose, returning the embedded claims.
    pub fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<Claims, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_aud = false;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            })?
            .claims;

        if claims.purpose != purpose {
            return Err(AuthError::WrongPurpose);
        }
        Ok(claims)
    }
}
