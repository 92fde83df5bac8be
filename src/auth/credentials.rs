// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password hashing and email normalization.

use unicode_normalization::UnicodeNormalization;

use super::AuthError;

/// Canonical form of an email address: NFKC, trimmed, lowercased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().nfkc().collect::<String>().to_lowercase()
}

/// Hash a password with bcrypt on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AuthError::InternalError(format!("hashing task failed: {e}")))?
        .map_err(|e| AuthError::InternalError(format!("password hashing failed: {e}")))
}

/// Check a password against a stored bcrypt hash.
///
/// A corrupt hash counts as a mismatch.
pub async fn verify_password(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|e| AuthError::InternalError(format!("verification task failed: {e}")))
}
