//! Purpose: Aggregate inventory metrics over a full product collection.
//! Exports: `Statistics`, `compute`, `TOP_LIMIT`.
//! Role: Pure aggregation; callers fetch the collection on every request.
//! Invariants: Ranked lists are stable: equal keys keep input order.
//! Invariants: Zero-sold products never appear in `most_sold`.
use serde::Serialize;
use std::collections::HashSet;

use super::product::Product;

pub const TOP_LIMIT: usize = 5;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_products: usize,
    pub total_cities: usize,
    pub out_of_stock_products: usize,
    pub total_inventory_value: f64,
    pub top_stocked: Vec<String>,
    pub most_sold: Vec<String>,
}

pub fn compute(products: &[Product]) -> Statistics {
    let mut cities = HashSet::new();
    let mut out_of_stock_products = 0;
    let mut total_inventory_value = 0.0;
    for product in products {
        for stock in &product.stocks {
            if !stock.localisation.city.is_empty() {
                cities.insert(stock.localisation.city.as_str());
            }
        }
        if product.is_out_of_stock() {
            out_of_stock_products += 1;
        }
        total_inventory_value += product.inventory_value();
    }

    let mut by_quantity: Vec<&Product> = products.iter().collect();
    by_quantity.sort_by(|a, b| b.total_quantity().cmp(&a.total_quantity()));
    let top_stocked = by_quantity
        .into_iter()
        .take(TOP_LIMIT)
        .map(|product| product.name.clone())
        .collect();

    let mut by_sold: Vec<&Product> = products.iter().filter(|product| product.sold > 0).collect();
    by_sold.sort_by(|a, b| b.sold.cmp(&a.sold));
    let most_sold = by_sold
        .into_iter()
        .take(TOP_LIMIT)
        .map(|product| format!("{} ({})", product.name, product.sold))
        .collect();

    Statistics {
        total_products: products.len(),
        total_cities: cities.len(),
        out_of_stock_products,
        total_inventory_value,
        top_stocked,
        most_sold,
    }
}
