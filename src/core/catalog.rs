//! Purpose: Search, sort and stock breakdown for product listings.
//! Exports: `SortKey`, `search`, `sort`, `StockLine`, `stock_breakdown`.
//! Role: Client-side view shaping over a fetched product list.
use serde::Serialize;
use std::cmp::Ordering;

use super::product::Product;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SortKey {
    #[default]
    Name,
    Price,
    Quantity,
}

/// Case-insensitive substring match on name, type, supplier and price text.
pub fn search<'a>(products: &'a [Product], query: &str) -> Vec<&'a Product> {
    let needle = query.trim().to_lowercase();
    products
        .iter()
        .filter(|product| needle.is_empty() || matches_query(product, &needle))
        .collect()
}

fn matches_query(product: &Product, needle: &str) -> bool {
    product.name.to_lowercase().contains(needle)
        || product.kind.to_lowercase().contains(needle)
        || product.supplier.to_lowercase().contains(needle)
        || product.price.to_string().contains(needle)
}

/// Name and price ascending; quantity descending. Ties keep input order.
pub fn sort(products: &mut [&Product], key: SortKey) {
    match key {
        SortKey::Name => products.sort_by(|a, b| compare_names(&a.name, &b.name)),
        SortKey::Price => products.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortKey::Quantity => {
            products.sort_by(|a, b| b.total_quantity().cmp(&a.total_quantity()))
        }
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StockLine {
    pub city: String,
    pub quantity: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StockBreakdown {
    pub total: u64,
    pub lines: Vec<StockLine>,
}

impl StockBreakdown {
    /// `city: quantity` per line, in stock order.
    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(|line| format!("{}: {}", line.city, line.quantity))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn stock_breakdown(product: &Product) -> StockBreakdown {
    StockBreakdown {
        total: product.total_quantity(),
        lines: product
            .stocks
            .iter()
            .map(|stock| StockLine {
                city: stock.localisation.city.clone(),
                quantity: stock.quantity,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::{SortKey, search, sort, stock_breakdown};
    use crate::core::product::{EditHistory, Location, Product, Stock};

    fn product(id: u64, name: &str, kind: &str, supplier: &str, price: f64, quantity: u64) -> Product {
        Product {
            id,
            name: name.to_string(),
            kind: kind.to_string(),
            barcode: format!("{id}"),
            price,
            sold: 0,
            supplier: supplier.to_string(),
            image: String::new(),
            stocks: vec![Stock {
                id: 1,
                name: "Main".to_string(),
                quantity,
                localisation: Location {
                    city: "Marrakech".to_string(),
                    latitude: 31.6,
                    longitude: -8.0,
                },
            }],
            edited_by: EditHistory {
                warehouse_man_id: 1,
                at: "2024-01-01T00:00:00Z".to_string(),
            },
        }
    }

    fn fixtures() -> Vec<Product> {
        vec![
            product(1, "iPhone 13", "Smartphone", "Apple Inc", 999.99, 4),
            product(2, "galaxy S21", "Smartphone", "Samsung", 899.99, 10),
            product(3, "MacBook Pro", "Laptop", "Apple Inc", 1299.5, 2),
        ]
    }

    fn names(products: &[&Product]) -> Vec<String> {
        products.iter().map(|product| product.name.clone()).collect()
    }

    #[test]
    fn search_matches_any_field_case_insensitively() {
        let products = fixtures();
        assert_eq!(names(&search(&products, "APPLE")), vec!["iPhone 13", "MacBook Pro"]);
        assert_eq!(names(&search(&products, "laptop")), vec!["MacBook Pro"]);
        assert_eq!(names(&search(&products, "899")), vec!["galaxy S21"]);
        assert_eq!(search(&products, "").len(), 3);
        assert!(search(&products, "tablet").is_empty());
    }

    #[test]
    fn sort_by_name_ignores_case() {
        let products = fixtures();
        let mut view = search(&products, "");
        sort(&mut view, SortKey::Name);
        assert_eq!(names(&view), vec!["galaxy S21", "iPhone 13", "MacBook Pro"]);
    }

    #[test]
    fn sort_by_price_ascending_and_quantity_descending() {
        let products = fixtures();
        let mut view = search(&products, "");
        sort(&mut view, SortKey::Price);
        assert_eq!(names(&view), vec!["galaxy S21", "iPhone 13", "MacBook Pro"]);
        sort(&mut view, SortKey::Quantity);
        assert_eq!(names(&view), vec!["galaxy S21", "iPhone 13", "MacBook Pro"]);
    }

    #[test]
    fn breakdown_renders_city_lines() {
        let products = fixtures();
        let breakdown = stock_breakdown(&products[1]);
        assert_eq!(breakdown.total, 10);
        assert_eq!(breakdown.render(), "Marrakech: 10");
    }
}
