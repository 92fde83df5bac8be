// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded document store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `accounts`: account_id → serialized StoredAccount
//! - `account_emails`: normalized email → account_id
//! - `products`: product_id → serialized StoredProduct
//! - `orders`: order_id → serialized StoredOrder
//! - `payments`: payment_id → serialized StoredPayment
//! - `payment_transactions`: processor transaction id → payment_id
//!
//! Every write is its own redb transaction. Updates go through
//! [`DocumentStore::modify`], which reads and writes the document inside one
//! write transaction, so concurrent updates to the same document cannot
//! overwrite each other. The account/email and payment/transaction pairs are
//! written together.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};

// =============================================================================
// Table Definitions
// =============================================================================

const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");
const ACCOUNT_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("account_emails");
const PRODUCTS: TableDefinition<&str, &[u8]> = TableDefinition::new("products");
const ORDERS: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");
const PAYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("payments");
const PAYMENT_TRANSACTIONS: TableDefinition<&str, &str> = TableDefinition::new("payment_transactions");

/// A document collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Accounts,
    Products,
    Orders,
    Payments,
}

impl Collection {
    fn table(self) -> TableDefinition<'static, &'static str, &'static [u8]> {
        match self {
            Collection::Accounts => ACCOUNTS,
            Collection::Products => PRODUCTS,
            Collection::Orders => ORDERS,
            Collection::Payments => PAYMENTS,
        }
    }

    /// Singular entity name used in error messages.
    pub fn entity(self) -> &'static str {
        match self {
            Collection::Accounts => "User",
            Collection::Products => "Product",
            Collection::Orders => "Order",
            Collection::Payments => "Payment",
        }
    }
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("permission denied: user {user_id} cannot access {resource}")]
    PermissionDenied { user_id: String, resource: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// DocumentStore
// =============================================================================

/// JSON document store with one redb table per collection.
pub struct DocumentStore {
    db: Database,
}

impl DocumentStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ACCOUNTS)?;
            let _ = write_txn.open_table(ACCOUNT_EMAILS)?;
            let _ = write_txn.open_table(PRODUCTS)?;
            let _ = write_txn.open_table(ORDERS)?;
            let _ = write_txn.open_table(PAYMENTS)?;
            let _ = write_txn.open_table(PAYMENT_TRANSACTIONS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Cheap liveness probe used by the health endpoints.
    pub fn ping(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(ACCOUNTS)?;
        Ok(())
    }

    /// Look up a document, returning `None` when absent.
    pub fn find<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> StorageResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(collection.table())?;
        let doc = match table.get(id)? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        Ok(doc)
    }

    /// Look up a document, failing with `NotFound` when absent.
    pub fn get<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> StorageResult<T> {
        self.find(collection, id)?
            .ok_or_else(|| StorageError::NotFound(collection.entity().to_string()))
    }

    pub fn exists(&self, collection: Collection, id: &str) -> StorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(collection.table())?;
        let found = table.get(id)?.is_some();
        Ok(found)
    }

    /// Insert a new document; fails with `AlreadyExists` if the id is taken.
    pub fn insert<T: Serialize>(&self, collection: Collection, id: &str, doc: &T) -> StorageResult<()> {
        let json = serde_json::to_vec(doc)?;

        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(collection.table())?;
            if table.get(id)?.is_some() {
                false
            } else {
                table.insert(id, json.as_slice())?;
                true
            }
        };
        if !inserted {
            write_txn.abort()?;
            return Err(StorageError::AlreadyExists(collection.entity().to_string()));
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Read, change and write back one document in a single write transaction.
    ///
    /// An error from `f` aborts the transaction and leaves the stored document
    /// untouched. Fails with `NotFound` if the document does not exist.
    pub fn modify<T, R, E, F>(&self, collection: Collection, id: &str, f: F) -> Result<R, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<StorageError>,
        F: FnOnce(&mut T) -> Result<R, E>,
    {
        self.modify_in_txn(collection, id, f)?
    }

    fn modify_in_txn<T, R, E, F>(&self, collection: Collection, id: &str, f: F) -> StorageResult<Result<R, E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T) -> Result<R, E>,
    {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(collection.table())?;
            let current: Option<T> = match table.get(id)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            match current {
                None => None,
                Some(mut doc) => match f(&mut doc) {
                    Ok(value) => {
                        let json = serde_json::to_vec(&doc)?;
                        table.insert(id, json.as_slice())?;
                        Some(Ok(value))
                    }
                    Err(e) => Some(Err(e)),
                },
            }
        };

        match outcome {
            Some(Ok(value)) => {
                write_txn.commit()?;
                Ok(Ok(value))
            }
            Some(Err(e)) => {
                write_txn.abort()?;
                Ok(Err(e))
            }
            None => {
                write_txn.abort()?;
                Err(StorageError::NotFound(collection.entity().to_string()))
            }
        }
    }

    /// Delete a document; fails with `NotFound` if it was not there.
    pub fn remove(&self, collection: Collection, id: &str) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(collection.table())?;
            let existed = table.remove(id)?.is_some();
            existed
        };
        if !removed {
            write_txn.abort()?;
            return Err(StorageError::NotFound(collection.entity().to_string()));
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Full scan of a collection in key order.
    pub fn list<T: DeserializeOwned>(&self, collection: Collection) -> StorageResult<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(collection.table())?;

        let mut docs = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            docs.push(serde_json::from_slice(value.value())?);
        }
        Ok(docs)
    }

    // =========================================================================
    // Account email index
    // =========================================================================

    /// Insert an account together with its email index entry.
    ///
    /// Fails with `AlreadyExists("Email")` when the email is already taken.
    pub fn insert_account<T: Serialize>(&self, id: &str, email: &str, doc: &T) -> StorageResult<()> {
        let json = serde_json::to_vec(doc)?;

        let write_txn = self.db.begin_write()?;
        let conflict = {
            let mut emails = write_txn.open_table(ACCOUNT_EMAILS)?;
            let mut accounts = write_txn.open_table(ACCOUNTS)?;
            if emails.get(email)?.is_some() {
                Some("Email")
            } else if accounts.get(id)?.is_some() {
                Some(Collection::Accounts.entity())
            } else {
                emails.insert(email, id)?;
                accounts.insert(id, json.as_slice())?;
                None
            }
        };
        if let Some(what) = conflict {
            write_txn.abort()?;
            return Err(StorageError::AlreadyExists(what.to_string()));
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Resolve a normalized email to its account id.
    pub fn account_id_by_email(&self, email: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNT_EMAILS)?;
        let account_id = table.get(email)?.map(|value| value.value().to_string());
        Ok(account_id)
    }

    /// Delete an account and its email index entry.
    pub fn remove_account(&self, id: &str, email: &str) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut accounts = write_txn.open_table(ACCOUNTS)?;
            let mut emails = write_txn.open_table(ACCOUNT_EMAILS)?;
            let existed = accounts.remove(id)?.is_some();
            if existed {
                emails.remove(email)?;
            }
            existed
        };
        if !removed {
            write_txn.abort()?;
            return Err(StorageError::NotFound(Collection::Accounts.entity().to_string()));
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Payment transaction index
    // =========================================================================

    /// Insert a payment together with its processor transaction id.
    ///
    /// Fails with `AlreadyExists("Transaction")` when another payment already
    /// records the same transaction id.
    pub fn insert_payment<T: Serialize>(&self, id: &str, transaction_id: &str, doc: &T) -> StorageResult<()> {
        let json = serde_json::to_vec(doc)?;

        let write_txn = self.db.begin_write()?;
        let conflict = {
            let mut transactions = write_txn.open_table(PAYMENT_TRANSACTIONS)?;
            let mut payments = write_txn.open_table(PAYMENTS)?;
            if transactions.get(transaction_id)?.is_some() {
                Some("Transaction")
            } else if payments.get(id)?.is_some() {
                Some(Collection::Payments.entity())
            } else {
                transactions.insert(transaction_id, id)?;
                payments.insert(id, json.as_slice())?;
                None
            }
        };
        if let Some(what) = conflict {
            write_txn.abort()?;
            return Err(StorageError::AlreadyExists(what.to_string()));
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Resolve a processor transaction id to the payment that recorded it.
    pub fn payment_id_by_transaction(&self, transaction_id: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PAYMENT_TRANSACTIONS)?;
        let payment_id = table.get(transaction_id)?.map(|value| value.value().to_string());
        Ok(payment_id)
    }

    /// Delete a payment and its transaction index entry.
    pub fn remove_payment(&self, id: &str, transaction_id: &str) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut payments = write_txn.open_table(PAYMENTS)?;
            let mut transactions = write_txn.open_table(PAYMENT_TRANSACTIONS)?;
            let existed = payments.remove(id)?.is_some();
            if existed {
                transactions.remove(transaction_id)?;
            }
            existed
        };
        if !removed {
            write_txn.abort()?;
            return Err(StorageError::NotFound(Collection::Payments.entity().to_string()));
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        name: String,
    }

    fn doc(name: &str) -> Doc {
        Doc {
            name: name.to_string(),
        }
    }

    fn open_temp() -> (DocumentStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(&dir.path().join("test.redb")).unwrap();
        (store, dir)
    }

    #[test]
    fn insert_get_and_list() {
        let (store, _dir) = open_temp();
        store.insert(Collection::Products, "a", &doc("alpha")).unwrap();
        store.insert(Collection::Products, "b", &doc("beta")).unwrap();

        let fetched: Doc = store.get(Collection::Products, "a").unwrap();
        assert_eq!(fetched, doc("alpha"));

        let all: Vec<Doc> = store.list(Collection::Products).unwrap();
        assert_eq!(all.len(), 2);

        // collections are isolated
        let orders: Vec<Doc> = store.list(Collection::Orders).unwrap();
        assert!(orders.is_empty());
    }

    #[test]
    fn duplicate_insert_is_rejected_and_keeps_original() {
        let (store, _dir) = open_temp();
        store.insert(Collection::Orders, "o1", &doc("first")).unwrap();
        let err = store.insert(Collection::Orders, "o1", &doc("second")).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(ref what) if what == "Order"));

        let kept: Doc = store.get(Collection::Orders, "o1").unwrap();
        assert_eq!(kept, doc("first"));
    }

    #[test]
    fn remove_requires_existing_document() {
        let (store, _dir) = open_temp();
        assert!(matches!(
            store.remove(Collection::Payments, "p1"),
            Err(StorageError::NotFound(_))
        ));

        store.insert(Collection::Payments, "p1", &doc("x")).unwrap();
        store.remove(Collection::Payments, "p1").unwrap();
        assert!(!store.exists(Collection::Payments, "p1").unwrap());
    }

    #[test]
    fn account_email_index_enforces_uniqueness() {
        let (store, _dir) = open_temp();
        store.insert_account("u1", "a@x.com", &doc("a")).unwrap();

        let err = store.insert_account("u2", "a@x.com", &doc("b")).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(ref what) if what == "Email"));
        assert!(!store.exists(Collection::Accounts, "u2").unwrap());

        assert_eq!(store.account_id_by_email("a@x.com").unwrap().as_deref(), Some("u1"));

        store.remove_account("u1", "a@x.com").unwrap();
        assert_eq!(store.account_id_by_email("a@x.com").unwrap(), None);
        // email is free again
        store.insert_account("u3", "a@x.com", &doc("c")).unwrap();
    }

    #[test]
    fn modify_applies_change_in_place() {
        let (store, _dir) = open_temp();
        store.insert(Collection::Products, "p", &doc("old")).unwrap();

        let previous = store
            .modify(Collection::Products, "p", |d: &mut Doc| {
                let previous = d.name.clone();
                d.name = "new".to_string();
                Ok::<_, StorageError>(previous)
            })
            .unwrap();
        assert_eq!(previous, "old");
        let fetched: Doc = store.get(Collection::Products, "p").unwrap();
        assert_eq!(fetched, doc("new"));
    }

    #[test]
    fn failed_modify_leaves_document_untouched() {
        let (store, _dir) = open_temp();
        store.insert(Collection::Orders, "o", &doc("kept")).unwrap();

        let err = store
            .modify(Collection::Orders, "o", |d: &mut Doc| {
                d.name = "discarded".to_string();
                Err::<(), _>(StorageError::AlreadyExists("Order".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
        let fetched: Doc = store.get(Collection::Orders, "o").unwrap();
        assert_eq!(fetched, doc("kept"));

        let missing = store.modify(Collection::Orders, "ghost", |_: &mut Doc| Ok::<_, StorageError>(()));
        assert!(matches!(missing, Err(StorageError::NotFound(ref what)) if what == "Order"));
    }

    #[test]
    fn concurrent_modifies_do_not_lose_updates() {
        #[derive(Serialize, Deserialize)]
        struct Counter {
            hits: Vec<u32>,
        }

        let (store, _dir) = open_temp();
        store
            .insert(Collection::Accounts, "c", &Counter { hits: vec![] })
            .unwrap();

        std::thread::scope(|scope| {
            for worker in 0..8u32 {
                let store = &store;
                scope.spawn(move || {
                    for round in 0..10u32 {
                        store
                            .modify(Collection::Accounts, "c", |c: &mut Counter| {
                                c.hits.push(worker * 100 + round);
                                Ok::<_, StorageError>(())
                            })
                            .unwrap();
                    }
                });
            }
        });

        let counter: Counter = store.get(Collection::Accounts, "c").unwrap();
        assert_eq!(counter.hits.len(), 80);
    }

    #[test]
    fn payment_transaction_ids_are_unique() {
        let (store, _dir) = open_temp();
        store.insert_payment("p1", "pi_1", &doc("first")).unwrap();

        let err = store.insert_payment("p2", "pi_1", &doc("replay")).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(ref what) if what == "Transaction"));
        assert!(!store.exists(Collection::Payments, "p2").unwrap());
        assert_eq!(store.payment_id_by_transaction("pi_1").unwrap().as_deref(), Some("p1"));

        store.remove_payment("p1", "pi_1").unwrap();
        assert_eq!(store.payment_id_by_transaction("pi_1").unwrap(), None);
        assert!(matches!(
            store.remove_payment("p1", "pi_1"),
            Err(StorageError::NotFound(_))
        ));
        store.insert_payment("p3", "pi_1", &doc("retry")).unwrap();
    }

    #[test]
    fn reopen_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persist.redb");
        {
            let store = DocumentStore::open(&path).unwrap();
            store.insert(Collection::Products, "p", &doc("kept")).unwrap();
        }
        let store = DocumentStore::open(&path).unwrap();
        let fetched: Doc = store.get(Collection::Products, "p").unwrap();
        assert_eq!(fetched, doc("kept"));
        store.ping().unwrap();
    }
}
