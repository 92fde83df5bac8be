// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Catalog repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{Collection, DocumentStore, StorageError, StorageResult};

/// Product stored in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredProduct {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Price in minor currency units
    pub price: u64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub stock: u32,
    /// Hosted image URL
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct ProductRepository<'a> {
    storage: &'a DocumentStore,
}

impl<'a> ProductRepository<'a> {
    pub fn new(storage: &'a DocumentStore) -> Self {
        Self { storage }
    }

    pub fn exists(&self, product_id: &str) -> StorageResult<bool> {
        self.storage.exists(Collection::Products, product_id)
    }

    pub fn get(&self, product_id: &str) -> StorageResult<StoredProduct> {
        self.storage.get(Collection::Products, product_id)
    }

    pub fn create(&self, product: &StoredProduct) -> StorageResult<()> {
        self.storage
            .insert(Collection::Products, &product.id, product)
    }

    /// Change a product inside one write transaction and bump `updated_at`.
    pub fn modify<R, E>(&self, product_id: &str, f: impl FnOnce(&mut StoredProduct) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StorageError>,
    {
        self.storage
            .modify(Collection::Products, product_id, |product: &mut StoredProduct| {
                product.updated_at = Utc::now();
                f(product)
            })
    }

    pub fn delete(&self, product_id: &str) -> StorageResult<()> {
        self.storage.remove(Collection::Products, product_id)
    }

    /// List products, optionally restricted to one category (case-insensitive).
    pub fn list(&self, category: Option<&str>) -> StorageResult<Vec<StoredProduct>> {
        let products: Vec<StoredProduct> = self.storage.list(Collection::Products)?;
        Ok(match category {
            Some(category) => products
                .into_iter()
                .filter(|p| p.category.eq_ignore_ascii_case(category))
                .collect(),
            None => products,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, category: &str) -> StoredProduct {
        StoredProduct {
            id: id.to_string(),
            name: format!("Product {id}"),
            description: String::new(),
            price: 1999,
            category: category.to_string(),
            brand: "Acme".to_string(),
            stock: 3,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn crud_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DocumentStore::open(&dir.path().join("products.redb")).unwrap();
        let repo = ProductRepository::new(&storage);

        repo.create(&product("p1", "books")).unwrap();
        assert!(repo.exists("p1").unwrap());

        let updated = repo
            .modify("p1", |p| {
                p.stock = 0;
                Ok::<_, StorageError>(p.clone())
            })
            .unwrap();
        assert_eq!(updated.stock, 0);
        assert_eq!(repo.get("p1").unwrap(), updated);

        repo.delete("p1").unwrap();
        assert!(matches!(repo.get("p1"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn list_filters_by_category() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DocumentStore::open(&dir.path().join("products.redb")).unwrap();
        let repo = ProductRepository::new(&storage);

        repo.create(&product("p1", "Books")).unwrap();
        repo.create(&product("p2", "garden")).unwrap();

        assert_eq!(repo.list(None).unwrap().len(), 2);
        let books = repo.list(Some("books")).unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].id, "p1");
    }
}
