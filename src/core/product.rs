//! Purpose: Wire records for products, stock entries and warehousemen.
//! Exports: `Product`, `Stock`, `Location`, `EditHistory`, `Warehouseman`,
//! `NewProduct`, `NewStock`, `ProductDraft`, `ProductPatch`, `Actor`, `now_rfc3339`.
//! Role: Single source of the JSON shape shared by client, service and dev server.
//! Invariants: Field names match the store (`editedBy`, `localisation`, `warehouseManId`).
//! Invariants: Quantities are unsigned; negative stock is unrepresentable.
use serde::{Deserialize, Serialize};

use super::error::{Error, ErrorKind};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub id: u64,
    pub name: String,
    pub quantity: u64,
    pub localisation: Location,
}

/// Last editor stamp. Overwritten on every mutation; no history is kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditHistory {
    pub warehouse_man_id: u64,
    pub at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub barcode: String,
    pub price: f64,
    #[serde(default)]
    pub sold: u64,
    pub supplier: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub stocks: Vec<Stock>,
    pub edited_by: EditHistory,
}

impl Product {
    /// Sum of stock quantities, saturating at `u64::MAX`.
    pub fn total_quantity(&self) -> u64 {
        self.stocks
            .iter()
            .fold(0u64, |total, stock| total.saturating_add(stock.quantity))
    }

    /// Sum of stock quantities, or `None` when it does not fit in a `u64`.
    pub fn checked_total_quantity(&self) -> Option<u64> {
        checked_total(self.stocks.iter().map(|stock| stock.quantity))
    }

    /// Sum of stock quantities times unit price.
    pub fn inventory_value(&self) -> f64 {
        self.total_quantity() as f64 * self.price
    }

    /// True when the product has no stock entries or every entry is at zero.
    pub fn is_out_of_stock(&self) -> bool {
        self.stocks.iter().all(|stock| stock.quantity == 0)
    }

    pub fn stock(&self, stock_id: u64) -> Option<&Stock> {
        self.stocks.iter().find(|stock| stock.id == stock_id)
    }

    pub fn stock_mut(&mut self, stock_id: u64) -> Option<&mut Stock> {
        self.stocks.iter_mut().find(|stock| stock.id == stock_id)
    }

    pub fn stamp(&mut self, actor: Actor, at: impl Into<String>) {
        self.edited_by = EditHistory {
            warehouse_man_id: actor.id(),
            at: at.into(),
        };
    }

    pub fn validate(&self) -> Result<(), Error> {
        validate_fields(&self.name, &self.kind, &self.barcode, self.price)?;
        if self.checked_total_quantity().is_none() {
            return Err(total_overflow().with_product_id(self.id));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warehouseman {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub city: String,
    pub secret_key: String,
    #[serde(default)]
    pub warehouse_id: u64,
}

/// Identity stamped into `editedBy` by mutating operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Actor(u64);

impl Actor {
    pub const FALLBACK_ID: u64 = 1;

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Actor used when no session is present.
    pub fn fallback() -> Self {
        Self(Self::FALLBACK_ID)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

impl From<&Warehouseman> for Actor {
    fn from(user: &Warehouseman) -> Self {
        Self(user.id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewStock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    pub quantity: u64,
    pub localisation: Location,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub barcode: String,
    pub price: f64,
    pub supplier: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub stocks: Vec<NewStock>,
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), Error> {
        validate_fields(&self.name, &self.kind, &self.barcode, self.price)?;
        if self.stocks.is_empty() {
            return Err(Error::new(ErrorKind::Validation)
                .with_message("at least one stock entry is required")
                .with_hint("Please fill all required fields."));
        }
        if checked_total(self.stocks.iter().map(|stock| stock.quantity)).is_none() {
            return Err(total_overflow());
        }
        Ok(())
    }

    /// Copy with surrounding whitespace stripped from the barcode.
    pub fn normalized(&self) -> Self {
        Self {
            barcode: self.barcode.trim().to_string(),
            ..self.clone()
        }
    }

    /// Stock entries with ids filled in; missing ids are numbered from the
    /// highest explicit id.
    pub fn seeded_stocks(&self) -> Vec<Stock> {
        let mut next_id = self
            .stocks
            .iter()
            .filter_map(|stock| stock.id)
            .max()
            .unwrap_or(0);
        self.stocks
            .iter()
            .map(|stock| {
                let id = match stock.id {
                    Some(id) => id,
                    None => {
                        next_id += 1;
                        next_id
                    }
                };
                Stock {
                    id,
                    name: stock.name.clone(),
                    quantity: stock.quantity,
                    localisation: stock.localisation.clone(),
                }
            })
            .collect()
    }
}

/// Body of a create request: the new record minus the store-assigned id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub barcode: String,
    pub price: f64,
    #[serde(default)]
    pub sold: u64,
    pub supplier: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub stocks: Vec<Stock>,
    pub edited_by: EditHistory,
}

impl ProductDraft {
    pub fn from_new(new: &NewProduct, actor: Actor, at: impl Into<String>) -> Self {
        Self {
            name: new.name.clone(),
            kind: new.kind.clone(),
            barcode: new.barcode.clone(),
            price: new.price,
            sold: 0,
            supplier: new.supplier.clone(),
            image: new.image.clone(),
            stocks: new.seeded_stocks(),
            edited_by: EditHistory {
                warehouse_man_id: actor.id(),
                at: at.into(),
            },
        }
    }

    pub fn into_product(self, id: u64) -> Product {
        Product {
            id,
            name: self.name,
            kind: self.kind,
            barcode: self.barcode,
            price: self.price,
            sold: self.sold,
            supplier: self.supplier,
            image: self.image,
            stocks: self.stocks,
            edited_by: self.edited_by,
        }
    }
}

/// Optional field edits plus per-stock quantity overrides.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub price: Option<f64>,
    pub supplier: Option<String>,
    pub image: Option<String>,
    pub quantities: Vec<(u64, u64)>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.kind.is_none()
            && self.price.is_none()
            && self.supplier.is_none()
            && self.image.is_none()
            && self.quantities.is_empty()
    }
}

pub fn now_rfc3339() -> Result<String, Error> {
    use time::format_description::well_known::Rfc3339;
    time::OffsetDateTime::now_utc().format(&Rfc3339).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to format timestamp")
            .with_source(err)
    })
}

pub(crate) fn checked_total(quantities: impl IntoIterator<Item = u64>) -> Option<u64> {
    quantities
        .into_iter()
        .try_fold(0u64, |total, quantity| total.checked_add(quantity))
}

pub(crate) fn total_overflow() -> Error {
    Error::new(ErrorKind::Validation).with_message("total stock quantity would overflow")
}

fn validate_fields(name: &str, kind: &str, barcode: &str, price: f64) -> Result<(), Error> {
    let missing: Vec<&str> = [("name", name), ("type", kind), ("barcode", barcode)]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();
    if !missing.is_empty() {
        return Err(Error::new(ErrorKind::Validation)
            .with_message(format!("missing required fields: {}", missing.join(", ")))
            .with_hint("Please fill all required fields."));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(Error::new(ErrorKind::Validation)
            .with_message("price must be a non-negative number"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Actor, Location, NewProduct, NewStock, Product, ProductDraft};
    use crate::core::error::ErrorKind;
    use serde_json::json;

    fn paris() -> Location {
        Location {
            city: "Paris".to_string(),
            latitude: 48.8566,
            longitude: 2.3522,
        }
    }

    fn new_product() -> NewProduct {
        NewProduct {
            name: "Samsung Galaxy S21".to_string(),
            kind: "Smartphone".to_string(),
            barcode: "987654321".to_string(),
            price: 899.99,
            supplier: "Samsung Electronics".to_string(),
            image: "https://example.com/galaxys21.jpg".to_string(),
            stocks: vec![NewStock {
                id: None,
                name: "Main Warehouse".to_string(),
                quantity: 50,
                localisation: paris(),
            }],
        }
    }

    #[test]
    fn product_parses_store_shape() {
        let value = json!({
            "id": 1,
            "name": "iPhone 13",
            "type": "Smartphone",
            "barcode": "123456789",
            "price": 999.99,
            "supplier": "Apple Inc",
            "image": "https://example.com/iphone13.jpg",
            "stocks": [{
                "id": 1,
                "name": "Main Warehouse",
                "quantity": 100,
                "localisation": {"city": "Paris", "latitude": 48.8566, "longitude": 2.3522}
            }],
            "editedBy": {"warehouseManId": 1, "at": "2024-02-15T10:00:00.000Z"}
        });
        let product: Product = serde_json::from_value(value).expect("product");
        assert_eq!(product.kind, "Smartphone");
        assert_eq!(product.sold, 0);
        assert_eq!(product.total_quantity(), 100);
        assert_eq!(product.edited_by.warehouse_man_id, 1);

        let back = serde_json::to_value(&product).expect("json");
        assert_eq!(back["type"], "Smartphone");
        assert_eq!(back["editedBy"]["warehouseManId"], 1);
        assert_eq!(back["stocks"][0]["localisation"]["city"], "Paris");
    }

    #[test]
    fn empty_stock_list_is_out_of_stock() {
        let draft = ProductDraft::from_new(
            &NewProduct {
                stocks: Vec::new(),
                ..new_product()
            },
            Actor::fallback(),
            "2024-01-01T00:00:00Z",
        );
        let product = draft.into_product(7);
        assert!(product.is_out_of_stock());
        assert_eq!(product.inventory_value(), 0.0);
    }

    #[test]
    fn draft_zeroes_sold_and_stamps_actor() {
        let draft = ProductDraft::from_new(&new_product(), Actor::new(3), "2024-01-01T00:00:00Z");
        assert_eq!(draft.sold, 0);
        assert_eq!(draft.edited_by.warehouse_man_id, 3);
        assert_eq!(draft.stocks[0].id, 1);
        let value = serde_json::to_value(&draft).expect("json");
        assert!(value.get("id").is_none());
        assert_eq!(value["sold"], 0);
    }

    #[test]
    fn seeded_stocks_number_after_explicit_ids() {
        let mut new = new_product();
        new.stocks.insert(
            0,
            NewStock {
                id: Some(4),
                name: "Annex".to_string(),
                quantity: 1,
                localisation: paris(),
            },
        );
        let ids: Vec<u64> = new.seeded_stocks().iter().map(|stock| stock.id).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn validate_reports_missing_fields() {
        let mut new = new_product();
        new.name = "  ".to_string();
        new.barcode = String::new();
        let err = new.validate().expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.message(), Some("missing required fields: name, barcode"));
    }

    #[test]
    fn validate_rejects_negative_price() {
        let mut new = new_product();
        new.price = -1.0;
        assert_eq!(
            new.validate().expect_err("invalid").kind(),
            ErrorKind::Validation
        );
        new.price = f64::NAN;
        assert!(new.validate().is_err());
    }

    #[test]
    fn validate_requires_a_stock_entry() {
        let mut new = new_product();
        new.stocks.clear();
        let err = new.validate().expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.message(), Some("at least one stock entry is required"));
    }

    #[test]
    fn validate_rejects_total_past_u64() {
        let mut new = new_product();
        new.stocks[0].quantity = u64::MAX - 10;
        new.stocks.push(NewStock {
            id: None,
            name: "Annex".to_string(),
            quantity: 11,
            localisation: paris(),
        });
        assert_eq!(
            new.validate().expect_err("overflow").kind(),
            ErrorKind::Validation
        );

        let mut product =
            ProductDraft::from_new(&new, Actor::fallback(), "2024-01-01T00:00:00Z").into_product(1);
        assert_eq!(product.checked_total_quantity(), None);
        assert_eq!(product.total_quantity(), u64::MAX);
        assert!(product.validate().is_err());
        product.stocks[1].quantity = 10;
        assert_eq!(product.checked_total_quantity(), Some(u64::MAX));
        assert!(product.validate().is_ok());
    }

    #[test]
    fn normalized_trims_barcode_only() {
        let mut new = new_product();
        new.barcode = "  987654321 \t".to_string();
        new.name = " Galaxy ".to_string();
        let normalized = new.normalized();
        assert_eq!(normalized.barcode, "987654321");
        assert_eq!(normalized.name, " Galaxy ");
    }
}
