// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Order ledger repository.
//!
//! An order's `total` is computed once, at creation, from its line items and
//! is never re-derived afterwards. The embedded `payment` field is a
//! projection of the payment record it was linked to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{Collection, DocumentStore, OwnedResource, StorageError, StorageResult};
use super::payments::{PaymentStatus, StoredPayment};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

/// One line of an order, priced at order time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: u32,
    /// Unit price in minor currency units
    pub price: u64,
}

/// Denormalized copy of a payment attached to an order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PaymentLinkage {
    pub payment_id: String,
    pub method: String,
    pub transaction_id: String,
    pub amount: u64,
    pub status: PaymentStatus,
    pub linked_at: DateTime<Utc>,
}

impl From<&StoredPayment> for PaymentLinkage {
    fn from(payment: &StoredPayment) -> Self {
        Self {
            payment_id: payment.id.clone(),
            method: payment.method.clone(),
            transaction_id: payment.transaction_id.clone(),
            amount: payment.amount,
            status: payment.status,
            linked_at: Utc::now(),
        }
    }
}

/// Order stored in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredOrder {
    pub id: String,
    pub owner_user_id: String,
    pub items: Vec<OrderItem>,
    /// Sum of quantity × price over `items`, in minor units
    pub total: u64,
    pub status: OrderStatus,
    /// `None` while the order is unpaid
    #[serde(default)]
    pub payment: Option<PaymentLinkage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredOrder {
    /// Build a new unpaid order, computing its total.
    ///
    /// Returns `None` if the total overflows.
    pub fn new(id: String, owner_user_id: String, items: Vec<OrderItem>) -> Option<Self> {
        let total = compute_total(&items)?;
        let now = Utc::now();
        Some(Self {
            id,
            owner_user_id,
            items,
            total,
            status: OrderStatus::Processing,
            payment: None,
            created_at: now,
            updated_at: now,
        })
    }
}

impl OwnedResource for StoredOrder {
    fn owner_user_id(&self) -> &str {
        &self.owner_user_id
    }

    fn resource_kind(&self) -> &'static str {
        "order"
    }
}

/// Sum of quantity × unit price, or `None` on overflow.
pub fn compute_total(items: &[OrderItem]) -> Option<u64> {
    items.iter().try_fold(0u64, |acc, item| {
        item.price
            .checked_mul(u64::from(item.quantity))
            .and_then(|line| acc.checked_add(line))
    })
}

pub struct OrderRepository<'a> {
    storage: &'a DocumentStore,
}

impl<'a> OrderRepository<'a> {
    pub fn new(storage: &'a DocumentStore) -> Self {
        Self { storage }
    }

    pub fn get(&self, order_id: &str) -> StorageResult<StoredOrder> {
        self.storage.get(Collection::Orders, order_id)
    }

    pub fn find(&self, order_id: &str) -> StorageResult<Option<StoredOrder>> {
        self.storage.find(Collection::Orders, order_id)
    }

    pub fn create(&self, order: &StoredOrder) -> StorageResult<()> {
        self.storage.insert(Collection::Orders, &order.id, order)
    }

    /// Change an order inside one write transaction and bump `updated_at`.
    /// `NotFound` if it was deleted meanwhile.
    pub fn modify<R, E>(&self, order_id: &str, f: impl FnOnce(&mut StoredOrder) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StorageError>,
    {
        self.storage
            .modify(Collection::Orders, order_id, |order: &mut StoredOrder| {
                order.updated_at = Utc::now();
                f(order)
            })
    }

    pub fn delete(&self, order_id: &str) -> StorageResult<()> {
        self.storage.remove(Collection::Orders, order_id)
    }

    /// List all orders (admin view).
    pub fn list_all(&self) -> StorageResult<Vec<StoredOrder>> {
        self.storage.list(Collection::Orders)
    }

    pub fn list_by_owner(&self, owner_user_id: &str) -> StorageResult<Vec<StoredOrder>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|o| o.owner_user_id == owner_user_id)
            .collect())
    }
}
