//! Purpose: Render a printable product summary document.
//! Exports: `render_summary`.
//! Role: Produces the HTML handed to a printer/PDF backend by the caller.
//! Invariants: Every interpolated field is HTML-escaped.
use std::fmt::Write as _;

use super::catalog::stock_breakdown;
use super::product::Product;

const STYLE: &str = "body { font-family: -apple-system, system-ui; padding: 20px; }
.header { text-align: center; margin-bottom: 30px; }
.product-image { max-width: 300px; margin: 0 auto; display: block; }
.product-name { font-size: 24px; font-weight: bold; margin: 10px 0; }
.product-type { color: #666; margin-bottom: 20px; }
.info-section { margin: 20px 0; }
.info-item { margin: 10px 0; }
.info-label { color: #666; }
.stock-location { padding: 10px 0; border-bottom: 1px solid #eee; }
.timestamp { text-align: center; color: #666; font-size: 12px; margin-top: 30px; }";

pub fn render_summary(product: &Product) -> String {
    let breakdown = stock_breakdown(product);
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\" />\n");
    let _ = writeln!(html, "<title>{}</title>", escape(&product.name));
    let _ = writeln!(html, "<style>\n{STYLE}\n</style>\n</head>\n<body>");

    html.push_str("<div class=\"header\">\n");
    if !product.image.is_empty() {
        let _ = writeln!(
            html,
            "<img src=\"{}\" class=\"product-image\" />",
            escape(&product.image)
        );
    }
    let _ = writeln!(html, "<h1 class=\"product-name\">{}</h1>", escape(&product.name));
    let _ = writeln!(html, "<div class=\"product-type\">{}</div>", escape(&product.kind));
    html.push_str("</div>\n");

    html.push_str("<div class=\"info-section\">\n");
    info_item(&mut html, "Price:", &format!("${:.2}", product.price));
    info_item(&mut html, "Total Stock:", &format!("{} units", breakdown.total));
    info_item(&mut html, "Supplier:", &product.supplier);
    html.push_str("</div>\n");

    html.push_str("<div class=\"info-section\">\n<h2>Stock Locations</h2>\n");
    for line in &breakdown.lines {
        html.push_str("<div class=\"stock-location\">\n");
        info_item(&mut html, "Location:", &line.city);
        info_item(&mut html, "Quantity:", &format!("{} units", line.quantity));
        html.push_str("</div>\n");
    }
    html.push_str("</div>\n");

    let _ = writeln!(
        html,
        "<div class=\"timestamp\">Last updated: {} by warehouseman #{}</div>",
        escape(&product.edited_by.at),
        product.edited_by.warehouse_man_id
    );
    html.push_str("</body>\n</html>\n");
    html
}

fn info_item(html: &mut String, label: &str, value: &str) {
    let _ = writeln!(
        html,
        "<div class=\"info-item\"><span class=\"info-label\">{}</span> {}</div>",
        escape(label),
        escape(value)
    );
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{escape, render_summary};
    use crate::core::product::{EditHistory, Location, Product, Stock};

    fn drill() -> Product {
        Product {
            id: 4,
            name: "Drill <Pro>".to_string(),
            kind: "Tools & Hardware".to_string(),
            barcode: "111".to_string(),
            price: 49.5,
            sold: 3,
            supplier: "Bosch".to_string(),
            image: String::new(),
            stocks: vec![
                Stock {
                    id: 1,
                    name: "North".to_string(),
                    quantity: 3,
                    localisation: Location {
                        city: "Lille".to_string(),
                        latitude: 50.6,
                        longitude: 3.0,
                    },
                },
                Stock {
                    id: 2,
                    name: "South".to_string(),
                    quantity: 4,
                    localisation: Location {
                        city: "Nice".to_string(),
                        latitude: 43.7,
                        longitude: 7.2,
                    },
                },
            ],
            edited_by: EditHistory {
                warehouse_man_id: 2,
                at: "2025-01-02T03:04:05Z".to_string(),
            },
        }
    }

    #[test]
    fn summary_lists_totals_and_locations() {
        let html = render_summary(&drill());
        assert!(html.contains("$49.50"));
        assert!(html.contains("7 units"));
        assert!(html.contains("Lille"));
        assert!(html.contains("Nice"));
        assert!(html.contains("Last updated: 2025-01-02T03:04:05Z by warehouseman #2"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn summary_escapes_text() {
        let html = render_summary(&drill());
        assert!(html.contains("Drill &lt;Pro&gt;"));
        assert!(html.contains("Tools &amp; Hardware"));
        assert!(!html.contains("<Pro>"));
    }

    #[test]
    fn escape_handles_quotes() {
        assert_eq!(escape(r#"a"b'c"#), "a&quot;b&#39;c");
    }
}
