//! Purpose: Apply a signed quantity change to one stock entry of a product.
//! Exports: `Direction`, `StockAdjustment`, `apply_adjustment`.
//! Role: Pure half of the stock update; the service does the read and the write.
//! Invariants: Quantities never go below zero; a rejected adjustment leaves the product untouched.
//! Invariants: Adds that would push the entry or the product total past `u64::MAX` fail.
//! Invariants: Successful adjustments overwrite `editedBy` with the acting identity.
use serde::Serialize;

use super::error::{Error, ErrorKind};
use super::outcome::{RejectReason, Rejection};
use super::product::{Actor, Product, total_overflow};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Add,
    Remove,
}

impl Direction {
    pub fn success_message(self) -> &'static str {
        match self {
            Direction::Add => "Stock added successfully",
            Direction::Remove => "Stock removed successfully",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StockAdjustment {
    pub stock_id: u64,
    pub quantity: u64,
    pub direction: Direction,
}

impl StockAdjustment {
    pub fn add(stock_id: u64, quantity: u64) -> Self {
        Self {
            stock_id,
            quantity,
            direction: Direction::Add,
        }
    }

    pub fn remove(stock_id: u64, quantity: u64) -> Self {
        Self {
            stock_id,
            quantity,
            direction: Direction::Remove,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.quantity == 0 {
            return Err(Error::new(ErrorKind::Validation)
                .with_message("quantity must be greater than zero")
                .with_hint("Please enter a valid quantity number."));
        }
        Ok(())
    }
}

/// Returns the new quantity of the adjusted entry.
///
/// `Err` is reserved for inputs that can never succeed (zero delta, overflow);
/// a missing stock entry or a remove larger than the entry are `Ok(Err(_))`.
pub fn apply_adjustment(
    product: &mut Product,
    adjustment: StockAdjustment,
    actor: Actor,
    at: &str,
) -> Result<Result<u64, Rejection>, Error> {
    adjustment.validate()?;
    let product_id = product.id;
    let total = product.checked_total_quantity();
    let Some(stock) = product.stock_mut(adjustment.stock_id) else {
        return Ok(Err(Rejection::new(RejectReason::StockNotFound)));
    };
    let updated = match adjustment.direction {
        Direction::Add => {
            let updated = stock.quantity.checked_add(adjustment.quantity).ok_or_else(|| {
                Error::new(ErrorKind::Validation)
                    .with_message("stock quantity would overflow")
                    .with_product_id(product_id)
            })?;
            total
                .and_then(|total| total.checked_add(adjustment.quantity))
                .ok_or_else(|| total_overflow().with_product_id(product_id))?;
            updated
        }
        Direction::Remove => match stock.quantity.checked_sub(adjustment.quantity) {
            Some(updated) => updated,
            None => return Ok(Err(Rejection::new(RejectReason::InsufficientQuantity))),
        },
    };
    stock.quantity = updated;
    product.stamp(actor, at);
    Ok(Ok(updated))
}

#[cfg(test)]
mod tests {
    use super::{StockAdjustment, apply_adjustment};
    use crate::core::error::ErrorKind;
    use crate::core::outcome::RejectReason;
    use crate::core::product::{Actor, EditHistory, Location, Product, Stock};

    const AT: &str = "2025-03-01T12:00:00Z";

    fn macbook(quantity: u64) -> Product {
        Product {
            id: 1,
            name: "MacBook Pro".to_string(),
            kind: "Laptop".to_string(),
            barcode: "456789123".to_string(),
            price: 1299.99,
            sold: 0,
            supplier: "Apple Inc".to_string(),
            image: String::new(),
            stocks: vec![Stock {
                id: 1,
                name: "Main Warehouse".to_string(),
                quantity,
                localisation: Location {
                    city: "Paris".to_string(),
                    latitude: 48.8566,
                    longitude: 2.3522,
                },
            }],
            edited_by: EditHistory {
                warehouse_man_id: 9,
                at: "2024-02-15T10:00:00.000Z".to_string(),
            },
        }
    }

    #[test]
    fn add_increases_and_stamps() {
        let mut product = macbook(25);
        let result = apply_adjustment(&mut product, StockAdjustment::add(1, 5), Actor::new(2), AT)
            .expect("valid");
        assert_eq!(result, Ok(30));
        assert_eq!(product.stocks[0].quantity, 30);
        assert_eq!(product.edited_by.warehouse_man_id, 2);
        assert_eq!(product.edited_by.at, AT);
    }

    #[test]
    fn remove_down_to_zero_is_allowed() {
        for (current, delta) in [(25, 5), (25, 25), (1, 1)] {
            let mut product = macbook(current);
            let result =
                apply_adjustment(&mut product, StockAdjustment::remove(1, delta), Actor::fallback(), AT)
                    .expect("valid");
            assert_eq!(result, Ok(current - delta));
        }
    }

    #[test]
    fn remove_more_than_available_leaves_product_untouched() {
        let mut product = macbook(25);
        let before = product.clone();
        let result =
            apply_adjustment(&mut product, StockAdjustment::remove(1, 30), Actor::new(2), AT)
                .expect("valid");
        let rejection = result.expect_err("rejected");
        assert_eq!(rejection.reason, RejectReason::InsufficientQuantity);
        assert_eq!(product, before);
    }

    #[test]
    fn unknown_stock_is_rejected() {
        let mut product = macbook(25);
        let before = product.clone();
        let result = apply_adjustment(&mut product, StockAdjustment::add(999, 5), Actor::new(2), AT)
            .expect("valid");
        assert_eq!(
            result.expect_err("rejected").reason,
            RejectReason::StockNotFound
        );
        assert_eq!(product, before);
    }

    #[test]
    fn zero_quantity_is_validation_error() {
        let mut product = macbook(25);
        let err = apply_adjustment(&mut product, StockAdjustment::add(1, 0), Actor::new(2), AT)
            .expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn overflow_is_validation_error() {
        let mut product = macbook(u64::MAX);
        let err = apply_adjustment(&mut product, StockAdjustment::add(1, 1), Actor::new(2), AT)
            .expect_err("overflow");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(product.stocks[0].quantity, u64::MAX);
    }

    #[test]
    fn add_past_product_total_is_validation_error() {
        let mut product = macbook(u64::MAX - 10);
        let mut annex = product.stocks[0].clone();
        annex.id = 2;
        annex.quantity = 0;
        product.stocks.push(annex);
        let before = product.clone();

        let err = apply_adjustment(&mut product, StockAdjustment::add(2, 100), Actor::new(2), AT)
            .expect_err("overflow");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.product_id(), Some(1));
        assert_eq!(product, before);

        let result = apply_adjustment(&mut product, StockAdjustment::add(2, 10), Actor::new(2), AT)
            .expect("fits");
        assert_eq!(result, Ok(10));
        assert_eq!(product.total_quantity(), u64::MAX);
    }
}
