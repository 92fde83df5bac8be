// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment attempt repository.
//!
//! A `StoredPayment` is the authoritative record of one processor charge.
//! Orders only carry a point-in-time copy of it (`PaymentLinkage`). A
//! `payment_transactions` index keeps processor transaction ids unique.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{Collection, DocumentStore, OwnedResource, StorageError, StorageResult};

/// Payment status as reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Processing,
    RequiresAction,
    RequiresPaymentMethod,
    Canceled,
    Failed,
}

impl PaymentStatus {
    /// Map a raw processor status string.
    ///
    /// Unknown values are treated as `Processing` so the attempt is kept
    /// rather than misreported as settled.
    pub fn from_processor(raw_status: &str) -> Self {
        match raw_status.trim().to_ascii_lowercase().as_str() {
            "succeeded" => PaymentStatus::Succeeded,
            "requires_action" | "requires_confirmation" | "requires_capture" => {
                PaymentStatus::RequiresAction
            }
            "requires_payment_method" => PaymentStatus::RequiresPaymentMethod,
            "canceled" | "cancelled" => PaymentStatus::Canceled,
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Processing,
        }
    }

    /// Whether the processor rejected the charge outright.
    pub fn is_rejection(self) -> bool {
        matches!(
            self,
            PaymentStatus::RequiresPaymentMethod | PaymentStatus::Canceled | PaymentStatus::Failed
        )
    }
}

/// Payment attempt stored in the document store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredPayment {
    pub id: String,
    /// Account that initiated the payment
    pub owner_user_id: String,
    /// Order the payment was made for
    pub order_id: String,
    /// Processor payment method reference
    pub method: String,
    /// Amount in minor currency units
    pub amount: u64,
    pub currency: String,
    /// Processor transaction identifier
    pub transaction_id: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl OwnedResource for StoredPayment {
    fn owner_user_id(&self) -> &str {
        &self.owner_user_id
    }

    fn resource_kind(&self) -> &'static str {
        "payment"
    }
}

pub struct PaymentRepository<'a> {
    storage: &'a DocumentStore,
}

impl<'a> PaymentRepository<'a> {
    pub fn new(storage: &'a DocumentStore) -> Self {
        Self { storage }
    }

    pub fn get(&self, payment_id: &str) -> StorageResult<StoredPayment> {
        self.storage.get(Collection::Payments, payment_id)
    }

    /// Record a new payment.
    ///
    /// # Errors
    /// `StorageError::AlreadyExists("Transaction")` if a payment with the same
    /// processor transaction id is already stored.
    pub fn create(&self, payment: &StoredPayment) -> StorageResult<()> {
        self.storage
            .insert_payment(&payment.id, &payment.transaction_id, payment)
    }

    pub fn delete(&self, payment_id: &str) -> StorageResult<()> {
        let payment = self.get(payment_id)?;
        self.storage.remove_payment(&payment.id, &payment.transaction_id)
    }

    /// Payment that recorded the given processor transaction id.
    pub fn find_by_transaction_id(&self, transaction_id: &str) -> StorageResult<Option<StoredPayment>> {
        match self.storage.payment_id_by_transaction(transaction_id)? {
            Some(id) => match self.get(&id) {
                Ok(payment) => Ok(Some(payment)),
                Err(StorageError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    }

    /// List all payments (admin view).
    pub fn list_all(&self) -> StorageResult<Vec<StoredPayment>> {
        self.storage.list(Collection::Payments)
    }

    pub fn list_by_owner(&self, owner_user_id: &str) -> StorageResult<Vec<StoredPayment>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|p| p.owner_user_id == owner_user_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(id: &str, owner: &str, tx: &str) -> StoredPayment {
        StoredPayment {
            id: id.to_string(),
            owner_user_id: owner.to_string(),
            order_id: "000000000000000000000001".to_string(),
            method: "card_1".to_string(),
            amount: 2500,
            currency: "usd".to_string(),
            transaction_id: tx.to_string(),
            status: PaymentStatus::Succeeded,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn status_mapping_is_stable() {
        assert_eq!(PaymentStatus::from_processor("succeeded"), PaymentStatus::Succeeded);
        assert_eq!(PaymentStatus::from_processor("PROCESSING"), PaymentStatus::Processing);
        assert_eq!(
            PaymentStatus::from_processor("requires_action"),
            PaymentStatus::RequiresAction
        );
        assert_eq!(PaymentStatus::from_processor("canceled"), PaymentStatus::Canceled);
        assert_eq!(PaymentStatus::from_processor("something_new"), PaymentStatus::Processing);

        assert!(PaymentStatus::RequiresPaymentMethod.is_rejection());
        assert!(!PaymentStatus::Succeeded.is_rejection());
    }

    #[test]
    fn list_by_owner_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DocumentStore::open(&dir.path().join("payments.redb")).unwrap();
        let repo = PaymentRepository::new(&storage);

        repo.create(&payment("p1", "alice", "pi_1")).unwrap();
        repo.create(&payment("p2", "bob", "pi_2")).unwrap();

        let alice = repo.list_by_owner("alice").unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].id, "p1");

        assert_eq!(repo.get("p2").unwrap().transaction_id, "pi_2");
        repo.delete("p2").unwrap();
        assert!(matches!(repo.get("p2"), Err(StorageError::NotFound(_))));
        assert_eq!(repo.list_all().unwrap().len(), 1);
    }

    #[test]
    fn transaction_id_is_unique_per_payment() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DocumentStore::open(&dir.path().join("payments.redb")).unwrap();
        let repo = PaymentRepository::new(&storage);

        repo.create(&payment("p1", "alice", "pi_1")).unwrap();
        let err = repo.create(&payment("p2", "alice", "pi_1")).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(ref what) if what == "Transaction"));
        assert_eq!(repo.list_all().unwrap().len(), 1);
        assert_eq!(repo.find_by_transaction_id("pi_1").unwrap().unwrap().id, "p1");

        // deleting the payment frees its transaction id
        repo.delete("p1").unwrap();
        assert!(repo.find_by_transaction_id("pi_1").unwrap().is_none());
        repo.create(&payment("p2", "alice", "pi_1")).unwrap();
    }
}
