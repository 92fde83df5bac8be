// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the document store.
//!
//! Each repository provides CRUD operations for a specific entity type,
//! using the [`DocumentStore`](super::DocumentStore) for all reads and writes.

use uuid::Uuid;

pub mod accounts;
pub mod orders;
pub mod payments;
pub mod products;

pub use accounts::{AccountRepository, StoredAccount};
pub use orders::{OrderItem, OrderRepository, OrderStatus, PaymentLinkage, StoredOrder};
pub use payments::{PaymentRepository, PaymentStatus, StoredPayment};
pub use products::{ProductRepository, StoredProduct};

/// Length of a document identifier in hex characters.
pub const DOCUMENT_ID_LEN: usize = 24;

/// Generate a fresh 24-hex-character document identifier.
pub fn new_document_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(DOCUMENT_ID_LEN);
    id
}

/// Whether `value` is a well-formed document identifier.
pub fn is_document_id(value: &str) -> bool {
    value.len() == DOCUMENT_ID_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}
