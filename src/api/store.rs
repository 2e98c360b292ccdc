//! Purpose: Abstract the product store and provide an in-memory implementation.
//! Exports: `ProductStore`, `MemoryStore`, `Snapshot`.
//! Role: Seam between the inventory service and its backing store (HTTP or memory).
//! Invariants: `replace_product` writes the whole record; there is no partial patch.
//! Invariants: `MemoryStore` assigns ids as `max(id) + 1`, matching the dev server.
#![allow(clippy::result_large_err)]

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

use crate::core::error::{Error, ErrorKind};
use crate::core::product::{Product, ProductDraft, Warehouseman};

pub type ApiResult<T> = Result<T, Error>;

/// Operations the inventory service needs from a product store.
pub trait ProductStore {
    fn list_products(&self) -> ApiResult<Vec<Product>>;
    fn products_by_barcode(&self, barcode: &str) -> ApiResult<Vec<Product>>;
    fn get_product(&self, id: u64) -> ApiResult<Product>;
    fn create_product(&self, draft: &ProductDraft) -> ApiResult<Product>;
    fn replace_product(&self, product: &Product) -> ApiResult<Product>;
    fn delete_product(&self, id: u64) -> ApiResult<()>;
    fn list_warehousemen(&self) -> ApiResult<Vec<Warehouseman>>;
}

impl<S: ProductStore + ?Sized> ProductStore for &S {
    fn list_products(&self) -> ApiResult<Vec<Product>> {
        (**self).list_products()
    }

    fn products_by_barcode(&self, barcode: &str) -> ApiResult<Vec<Product>> {
        (**self).products_by_barcode(barcode)
    }

    fn get_product(&self, id: u64) -> ApiResult<Product> {
        (**self).get_product(id)
    }

    fn create_product(&self, draft: &ProductDraft) -> ApiResult<Product> {
        (**self).create_product(draft)
    }

    fn replace_product(&self, product: &Product) -> ApiResult<Product> {
        (**self).replace_product(product)
    }

    fn delete_product(&self, id: u64) -> ApiResult<()> {
        (**self).delete_product(id)
    }

    fn list_warehousemen(&self) -> ApiResult<Vec<Warehouseman>> {
        (**self).list_warehousemen()
    }
}

/// On-disk shape of a store database: `{ "products": [...], "warehousemans": [...] }`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub warehousemans: Vec<Warehouseman>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> ApiResult<Snapshot> {
        Ok(self.lock()?.clone())
    }

    /// Replace the whole state, e.g. to undo a mutation that could not be saved.
    pub fn restore(&self, snapshot: Snapshot) -> ApiResult<()> {
        *self.lock()? = snapshot;
        Ok(())
    }

    pub fn add_warehouseman(&self, user: Warehouseman) -> ApiResult<()> {
        self.lock()?.warehousemans.push(user);
        Ok(())
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, Snapshot>> {
        self.state
            .lock()
            .map_err(|_| Error::new(ErrorKind::Internal).with_message("store lock poisoned"))
    }
}

impl ProductStore for MemoryStore {
    fn list_products(&self) -> ApiResult<Vec<Product>> {
        Ok(self.lock()?.products.clone())
    }

    fn products_by_barcode(&self, barcode: &str) -> ApiResult<Vec<Product>> {
        Ok(self
            .lock()?
            .products
            .iter()
            .filter(|product| product.barcode == barcode)
            .cloned()
            .collect())
    }

    fn get_product(&self, id: u64) -> ApiResult<Product> {
        self.lock()?
            .products
            .iter()
            .find(|product| product.id == id)
            .cloned()
            .ok_or_else(|| product_not_found(id))
    }

    fn create_product(&self, draft: &ProductDraft) -> ApiResult<Product> {
        let mut state = self.lock()?;
        let id = state
            .products
            .iter()
            .map(|product| product.id)
            .max()
            .unwrap_or(0)
            + 1;
        let product = draft.clone().into_product(id);
        state.products.push(product.clone());
        Ok(product)
    }

    fn replace_product(&self, product: &Product) -> ApiResult<Product> {
        let mut state = self.lock()?;
        let slot = state
            .products
            .iter_mut()
            .find(|existing| existing.id == product.id)
            .ok_or_else(|| product_not_found(product.id))?;
        *slot = product.clone();
        Ok(product.clone())
    }

    fn delete_product(&self, id: u64) -> ApiResult<()> {
        let mut state = self.lock()?;
        let before = state.products.len();
        state.products.retain(|product| product.id != id);
        if state.products.len() == before {
            return Err(product_not_found(id));
        }
        Ok(())
    }

    fn list_warehousemen(&self) -> ApiResult<Vec<Warehouseman>> {
        Ok(self.lock()?.warehousemans.clone())
    }
}

fn product_not_found(id: u64) -> Error {
    Error::new(ErrorKind::NotFound)
        .with_message("product not found")
        .with_product_id(id)
}

#[cfg(test)]
mod tests {
    use super::{MemoryStore, ProductStore, Snapshot};
    use crate::core::error::ErrorKind;
    use crate::core::product::{Actor, NewProduct, ProductDraft};

    fn draft(barcode: &str) -> ProductDraft {
        let new = NewProduct {
            name: "Crate".to_string(),
            kind: "Packaging".to_string(),
            barcode: barcode.to_string(),
            price: 2.5,
            supplier: "Acme".to_string(),
            image: String::new(),
            stocks: Vec::new(),
        };
        ProductDraft::from_new(&new, Actor::fallback(), "2024-01-01T00:00:00Z")
    }

    #[test]
    fn create_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let first = store.create_product(&draft("a")).expect("create");
        let second = store.create_product(&draft("b")).expect("create");
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        store.delete_product(2).expect("delete");
        let third = store.create_product(&draft("c")).expect("create");
        assert_eq!(third.id, 2);
    }

    #[test]
    fn barcode_query_filters_exactly() {
        let store = MemoryStore::new();
        store.create_product(&draft("123")).expect("create");
        store.create_product(&draft("1234")).expect("create");
        assert_eq!(store.products_by_barcode("123").expect("query").len(), 1);
        assert!(store.products_by_barcode("9").expect("query").is_empty());
    }

    #[test]
    fn missing_ids_are_not_found() {
        let store = MemoryStore::from_snapshot(Snapshot::default());
        assert_eq!(store.get_product(5).expect_err("missing").kind(), ErrorKind::NotFound);
        assert_eq!(store.delete_product(5).expect_err("missing").kind(), ErrorKind::NotFound);
        let product = draft("x").into_product(5);
        assert_eq!(
            store.replace_product(&product).expect_err("missing").kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn replace_overwrites_whole_record() {
        let store = MemoryStore::new();
        let mut product = store.create_product(&draft("a")).expect("create");
        product.name = "Pallet".to_string();
        product.sold = 9;
        store.replace_product(&product).expect("replace");
        assert_eq!(store.get_product(product.id).expect("get"), product);
    }

    #[test]
    fn restore_discards_later_changes() {
        let store = MemoryStore::new();
        store.create_product(&draft("a")).expect("create");
        let before = store.snapshot().expect("snapshot");
        store.create_product(&draft("b")).expect("create");
        store.delete_product(1).expect("delete");
        store.restore(before.clone()).expect("restore");
        assert_eq!(store.snapshot().expect("snapshot"), before);
    }
}
