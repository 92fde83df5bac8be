// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account repository.
//!
//! Accounts are keyed by document id; a secondary `account_emails` table
//! maps the normalized email to the id and guarantees uniqueness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::{Collection, DocumentStore, StorageError, StorageResult};
use crate::auth::Role;

/// Account stored in the document store.
///
/// `password_hash` is a bcrypt hash and never leaves the storage layer;
/// API responses are built from `AccountResponse` instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredAccount {
    pub id: String,
    /// Normalized email (see `auth::normalize_email`)
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub favorite_product_ids: Vec<String>,
    #[serde(default)]
    pub order_ids: Vec<String>,
    /// `jti` of the single outstanding password-reset token, if any
    #[serde(default)]
    pub reset_token_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredAccount {
    /// Label used for chat messages and token claims.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string()
        } else {
            full.to_string()
        }
    }
}

/// Repository for account operations.
pub struct AccountRepository<'a> {
    storage: &'a DocumentStore,
}

impl<'a> AccountRepository<'a> {
    pub fn new(storage: &'a DocumentStore) -> Self {
        Self { storage }
    }

    pub fn get(&self, account_id: &str) -> StorageResult<StoredAccount> {
        self.storage.get(Collection::Accounts, account_id)
    }

    /// Look up an account by normalized email.
    pub fn find_by_email(&self, email: &str) -> StorageResult<Option<StoredAccount>> {
        match self.storage.account_id_by_email(email)? {
            Some(id) => self.storage.find(Collection::Accounts, &id),
            None => Ok(None),
        }
    }

    /// Create a new account.
    ///
    /// # Errors
    /// `StorageError::AlreadyExists("Email")` if the email is registered.
    pub fn create(&self, account: &StoredAccount) -> StorageResult<()> {
        self.storage
            .insert_account(&account.id, &account.email, account)
    }

    /// Change an account inside one write transaction and bump `updated_at`.
    ///
    /// The email must not be changed here; the email index is not touched.
    pub fn modify<R, E>(
        &self,
        account_id: &str,
        f: impl FnOnce(&mut StoredAccount) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StorageError>,
    {
        self.storage
            .modify(Collection::Accounts, account_id, |account: &mut StoredAccount| {
                account.updated_at = Utc::now();
                f(account)
            })
    }

    pub fn delete(&self, account_id: &str) -> StorageResult<()> {
        let account = self.get(account_id)?;
        self.storage.remove_account(&account.id, &account.email)
    }

    /// List all accounts (admin view).
    pub fn list_all(&self) -> StorageResult<Vec<StoredAccount>> {
        self.storage.list(Collection::Accounts)
    }

    /// Record an order reference on its owner's account.
    pub fn add_order_ref(&self, account_id: &str, order_id: &str) -> StorageResult<()> {
        self.modify(account_id, |account| {
            if !account.order_ids.iter().any(|id| id == order_id) {
                account.order_ids.push(order_id.to_string());
            }
            Ok(())
        })
    }

    /// Drop an order reference. A missing account is not an error.
    pub fn remove_order_ref(&self, account_id: &str, order_id: &str) -> StorageResult<()> {
        let removed = self.modify(account_id, |account| {
            account.order_ids.retain(|id| id != order_id);
            Ok(())
        });
        match removed {
            Err(StorageError::NotFound(_)) => Ok(()),
            other => other,
        }
    }
}
