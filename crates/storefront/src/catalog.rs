//! Conversion from CMS catalog documents to collection candidates.
//!
//! The CMS is queried once per page render; the presentation layer hands the
//! product document it rendered to [`candidate_from_product`] when the shopper
//! clicks "add to cart" or "save".

use rust_decimal::Decimal;
use serde::Deserialize;

use aurelia_core::{CurrencyCode, NewItem, ProductId, ProductType};

/// A product document as returned by the CMS query layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    #[serde(rename = "_id")]
    pub id: String,
    /// Document type, e.g. `ring` or `necklaces`.
    #[serde(rename = "_type")]
    pub category: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub currency: CurrencyCode,
    /// Compare-at price when the product is on sale.
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub stone: Option<String>,
    #[serde(default = "in_stock_by_default")]
    pub in_stock: bool,
}

const fn in_stock_by_default() -> bool {
    true
}

/// Build the collection candidate for `product` in `size`.
///
/// # Panics
///
/// Panics if the product's category is not a known [`ProductType`]. That means
/// the CMS schema and this conversion have drifted apart, which must be fixed
/// in code rather than handled at runtime.
#[must_use]
pub fn candidate_from_product(
    product: &CatalogProduct,
    size: Option<&str>,
    quantity: u32,
) -> NewItem {
    let product_type: ProductType = match product.category.parse() {
        Ok(product_type) => product_type,
        Err(err) => {
            tracing::error!(product_id = %product.id, category = %product.category, "Catalog category has no collection mapping");
            panic!("catalog conversion out of sync with CMS schema: {err}");
        }
    };

    NewItem {
        product_id: ProductId::new(product.id.as_str()),
        product_type,
        name: product.name.clone(),
        price: product.price,
        currency: product.currency,
        original_price: product
            .original_price
            .filter(|original| *original > product.price),
        image: product.image_url.clone().unwrap_or_default(),
        material: product.material.clone().unwrap_or_default(),
        stone: product.stone.clone().unwrap_or_default(),
        size: size.map(str::to_owned),
        in_stock: product.in_stock,
        quantity: quantity.max(1),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(category: &str) -> CatalogProduct {
        serde_json::from_value(serde_json::json!({
            "_id": "prod-7",
            "_type": category,
            "name": "Halo Ring",
            "price": "1200.00",
            "originalPrice": "1500.00",
            "imageUrl": "https://cdn.example/halo.jpg",
            "material": "platinum",
            "stone": "sapphire"
        }))
        .unwrap()
    }

    #[test]
    fn test_converts_known_category() {
        let candidate = candidate_from_product(&product("rings"), Some("6"), 1);

        assert_eq!(candidate.product_id, ProductId::new("prod-7"));
        assert_eq!(candidate.product_type, ProductType::Ring);
        assert_eq!(candidate.size.as_deref(), Some("6"));
        assert_eq!(candidate.original_price, Some(Decimal::new(1500, 0)));
        assert_eq!(candidate.currency, CurrencyCode::USD);
        assert!(candidate.in_stock);
    }

    #[test]
    fn test_original_price_dropped_when_not_higher() {
        let mut p = product("bracelet");
        p.original_price = Some(p.price);

        let candidate = candidate_from_product(&p, None, 0);
        assert_eq!(candidate.original_price, None);
        assert_eq!(candidate.quantity, 1);
    }

    #[test]
    #[should_panic(expected = "catalog conversion out of sync")]
    fn test_unknown_category_is_fatal() {
        let _ = candidate_from_product(&product("watch"), None, 1);
    }
}
