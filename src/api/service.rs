//! Purpose: Inventory operations composed from store round trips.
//! Exports: `InventoryService`.
//! Role: Login, browsing, create/edit/delete, stock updates and statistics.
//! Invariants: Mutations take the acting identity explicitly; there is no ambient session.
//! Invariants: Rejected outcomes never issue a write; writes replace the whole product.
//! Notes: Stock updates are read-then-write without a version token, so concurrent
//! writers are last-write-wins.
#![allow(clippy::result_large_err)]

use super::store::{ApiResult, ProductStore};
use crate::core::catalog::{self, SortKey};
use crate::core::error::{Error, ErrorKind};
use crate::core::outcome::{Outcome, RejectReason};
use crate::core::product::{
    Actor, NewProduct, Product, ProductDraft, ProductPatch, Warehouseman, now_rfc3339,
};
use crate::core::stats::{self, Statistics};
use crate::core::stock::{StockAdjustment, apply_adjustment};

#[derive(Clone, Debug)]
pub struct InventoryService<S> {
    store: S,
}

impl<S: ProductStore> InventoryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// First warehouseman whose secret code matches, if any.
    pub fn login(&self, secret_key: &str) -> ApiResult<Option<Warehouseman>> {
        if secret_key.trim().is_empty() {
            return Err(Error::new(ErrorKind::Validation)
                .with_message("secret code is required")
                .with_hint("Please enter your secret code."));
        }
        let user = self
            .store
            .list_warehousemen()?
            .into_iter()
            .find(|user| user.secret_key == secret_key);
        match &user {
            Some(user) => tracing::info!(user_id = user.id, "login accepted"),
            None => tracing::warn!("login rejected: unknown secret code"),
        }
        Ok(user)
    }

    pub fn list_products(&self) -> ApiResult<Vec<Product>> {
        self.store.list_products()
    }

    /// Filtered and sorted listing.
    pub fn browse(&self, query: &str, sort: SortKey) -> ApiResult<Vec<Product>> {
        let products = self.store.list_products()?;
        let mut view = catalog::search(&products, query);
        catalog::sort(&mut view, sort);
        Ok(view.into_iter().cloned().collect())
    }

    pub fn get_product(&self, id: u64) -> ApiResult<Product> {
        self.store.get_product(id)
    }

    /// Scan lookup: the product carrying `barcode`.
    pub fn find_by_barcode(&self, barcode: &str) -> ApiResult<Product> {
        let barcode = barcode.trim();
        if barcode.is_empty() {
            return Err(Error::new(ErrorKind::Validation).with_message("barcode is required"));
        }
        self.store
            .products_by_barcode(barcode)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message(format!("no product with barcode {barcode}"))
            })
    }

    pub fn create_product(&self, new: &NewProduct, actor: Actor) -> ApiResult<Outcome<Product>> {
        let new = new.normalized();
        new.validate()?;
        if !self.store.products_by_barcode(&new.barcode)?.is_empty() {
            tracing::warn!(barcode = %new.barcode, "create rejected: duplicate barcode");
            return Ok(Outcome::rejected(RejectReason::Conflict));
        }
        let draft = ProductDraft::from_new(&new, actor, now_rfc3339()?);
        let created = self.store.create_product(&draft)?;
        tracing::info!(product_id = created.id, actor = actor.id(), "product created");
        Ok(Outcome::applied(created, 201, "Product created successfully"))
    }

    pub fn update_product(
        &self,
        id: u64,
        patch: &ProductPatch,
        actor: Actor,
    ) -> ApiResult<Outcome<Product>> {
        let mut product = self.store.get_product(id)?;
        if let Some(name) = &patch.name {
            product.name = name.clone();
        }
        if let Some(kind) = &patch.kind {
            product.kind = kind.clone();
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(supplier) = &patch.supplier {
            product.supplier = supplier.clone();
        }
        if let Some(image) = &patch.image {
            product.image = image.clone();
        }
        for (stock_id, quantity) in &patch.quantities {
            let Some(stock) = product.stock_mut(*stock_id) else {
                tracing::warn!(product_id = id, stock_id, "edit rejected: unknown stock");
                return Ok(Outcome::rejected(RejectReason::StockNotFound));
            };
            stock.quantity = *quantity;
        }
        product.validate()?;
        product.stamp(actor, now_rfc3339()?);
        let updated = self.store.replace_product(&product)?;
        tracing::info!(product_id = id, actor = actor.id(), "product updated");
        Ok(Outcome::applied(updated, 200, "Product updated successfully"))
    }

    /// Read the product, adjust one stock entry, write the whole product back.
    pub fn update_stock(
        &self,
        product_id: u64,
        adjustment: StockAdjustment,
        actor: Actor,
    ) -> ApiResult<Outcome<Product>> {
        adjustment.validate()?;
        let mut product = self.store.get_product(product_id)?;
        let at = now_rfc3339()?;
        match apply_adjustment(&mut product, adjustment, actor, &at)? {
            Ok(quantity) => {
                let updated = self.store.replace_product(&product)?;
                tracing::info!(
                    product_id,
                    stock_id = adjustment.stock_id,
                    quantity,
                    actor = actor.id(),
                    "stock updated"
                );
                Ok(Outcome::applied(
                    updated,
                    200,
                    adjustment.direction.success_message(),
                ))
            }
            Err(rejection) => {
                tracing::warn!(
                    product_id,
                    stock_id = adjustment.stock_id,
                    reason = ?rejection.reason,
                    "stock update rejected"
                );
                Ok(Outcome::Rejected(rejection))
            }
        }
    }

    /// Hard delete; returns the record as it was before deletion.
    pub fn delete_product(&self, id: u64) -> ApiResult<Product> {
        let product = self.store.get_product(id)?;
        self.store.delete_product(id)?;
        tracing::info!(product_id = id, "product deleted");
        Ok(product)
    }

    /// Re-fetches and re-scans the whole collection on every call.
    pub fn statistics(&self) -> ApiResult<Statistics> {
        let products = self.store.list_products()?;
        Ok(stats::compute(&products))
    }
}
