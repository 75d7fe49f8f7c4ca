//! Cart and wishlist line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ItemId, ProductId};
use super::price::{CurrencyCode, Price};
use super::product::ProductType;

/// The de-duplication key of a collection line: one line per product and size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub product_id: ProductId,
    pub size: Option<String>,
}

impl ItemKey {
    /// Build a key from a product and an optional size.
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, size: Option<&str>) -> Self {
        Self {
            product_id: product_id.into(),
            size: size.map(str::to_owned),
        }
    }
}

/// One line of a persisted cart or wishlist.
///
/// Serialized with camelCase field names; this is the on-disk document shape,
/// so renaming a field is a storage migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionItem {
    /// Local line identifier.
    pub id: ItemId,
    pub product_id: ProductId,
    pub product_type: ProductType,
    pub name: String,
    /// Unit price in `currency`.
    pub price: Decimal,
    #[serde(default)]
    pub currency: CurrencyCode,
    /// Pre-discount unit price, shown struck through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    pub image: String,
    pub material: String,
    pub stone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    pub in_stock: bool,
    /// Always 1 for wishlist entries.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

const fn default_quantity() -> u32 {
    1
}

impl CollectionItem {
    /// Materialise a candidate into a fresh line with a new local ID.
    #[must_use]
    pub fn from_new(candidate: NewItem, added_at: DateTime<Utc>) -> Self {
        Self {
            id: ItemId::generate(),
            product_id: candidate.product_id,
            product_type: candidate.product_type,
            name: candidate.name,
            price: candidate.price,
            currency: candidate.currency,
            original_price: candidate.original_price,
            image: candidate.image,
            material: candidate.material,
            stone: candidate.stone,
            size: candidate.size,
            in_stock: candidate.in_stock,
            quantity: candidate.quantity.max(1),
            added_at: Some(added_at),
        }
    }

    /// Whether this line has the given de-duplication key.
    #[must_use]
    pub fn matches(&self, key: &ItemKey) -> bool {
        self.product_id == key.product_id && self.size == key.size
    }

    /// The de-duplication key of this line.
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey {
            product_id: self.product_id.clone(),
            size: self.size.clone(),
        }
    }

    /// Unit price with currency.
    #[must_use]
    pub const fn unit_price(&self) -> Price {
        Price::new(self.price, self.currency)
    }

    /// Unit price times quantity; `None` when a stored price is too large to
    /// multiply out.
    #[must_use]
    pub fn line_total(&self) -> Option<Price> {
        self.unit_price().checked_times(self.quantity)
    }
}

/// A product the shopper wants to add, before it becomes a collection line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub product_id: ProductId,
    pub product_type: ProductType,
    pub name: String,
    pub price: Decimal,
    pub currency: CurrencyCode,
    pub original_price: Option<Decimal>,
    pub image: String,
    pub material: String,
    pub stone: String,
    pub size: Option<String>,
    pub in_stock: bool,
    /// Units to add; ignored by wishlists.
    pub quantity: u32,
}

impl NewItem {
    /// The de-duplication key this candidate would occupy.
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey {
            product_id: self.product_id.clone(),
            size: self.size.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn candidate() -> NewItem {
        NewItem {
            product_id: ProductId::new("p1"),
            product_type: ProductType::Ring,
            name: "Solitaire".to_owned(),
            price: Decimal::new(10, 0),
            currency: CurrencyCode::USD,
            original_price: None,
            image: "/img/p1.jpg".to_owned(),
            material: "gold".to_owned(),
            stone: "diamond".to_owned(),
            size: Some("M".to_owned()),
            in_stock: true,
            quantity: 0,
        }
    }

    #[test]
    fn test_from_new_clamps_quantity_to_one() {
        let item = CollectionItem::from_new(candidate(), Utc::now());
        assert_eq!(item.quantity, 1);
        assert!(item.added_at.is_some());
    }

    #[test]
    fn test_key_matches_on_product_and_size() {
        let item = CollectionItem::from_new(candidate(), Utc::now());
        assert!(item.matches(&ItemKey::new("p1", Some("M"))));
        assert!(!item.matches(&ItemKey::new("p1", Some("L"))));
        assert!(!item.matches(&ItemKey::new("p1", None)));
    }

    #[test]
    fn test_document_uses_camel_case() {
        let item = CollectionItem::from_new(candidate(), Utc::now());
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["productId"], "p1");
        assert_eq!(json["productType"], "ring");
        assert_eq!(json["inStock"], true);
        assert!(json.get("originalPrice").is_none());
    }

    #[test]
    fn test_quantity_defaults_when_missing() {
        let json = serde_json::json!({
            "id": "6c4ad3a2-8f8b-4a4e-9a53-1b1f8f0e2a11",
            "productId": "p9",
            "productType": "bracelet",
            "name": "Tennis",
            "price": "99.50",
            "image": "",
            "material": "silver",
            "stone": "none",
            "inStock": false
        });
        let item: CollectionItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.currency, CurrencyCode::USD);
        assert_eq!(item.size, None);
    }
}
