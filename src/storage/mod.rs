// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent storage for accounts, products, orders and payments, kept as
//! JSON documents in an embedded redb database.
//!
//! ## Layers
//!
//! ```text
//! DocumentStore          one redb table per collection, per-call transactions
//!   └─ repository/*      typed CRUD per entity (AccountRepository, ...)
//!        └─ ownership    owner-or-admin checks on account-scoped documents
//! ```

pub mod document_store;
pub mod ownership;
pub mod repository;

pub use document_store::{Collection, DocumentStore, StorageError, StorageResult};
pub use ownership::{OwnedResource, OwnershipCheck, OwnershipEnforcer};
pub use repository::{
    is_document_id, new_document_id, AccountRepository, OrderItem, OrderRepository, OrderStatus,
    PaymentLinkage, PaymentRepository, PaymentStatus, ProductRepository, StoredAccount,
    StoredOrder, StoredPayment, StoredProduct,
};
