//! Read-only views of a collection for the presentation layer.

use rust_decimal::Decimal;

use aurelia_core::{CollectionItem, CollectionKind, CurrencyCode, Identity, Price};

/// A point-in-time copy of one manager's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSnapshot {
    pub kind: CollectionKind,
    /// Identity whose collection `items` belongs to.
    pub identity: Identity,
    pub items: Vec<CollectionItem>,
    /// True while an identity switch is in flight (`items` is empty then) and
    /// before the first identity has been settled.
    pub is_loading: bool,
}

impl CollectionSnapshot {
    pub(crate) const fn new(
        kind: CollectionKind,
        identity: Identity,
        items: Vec<CollectionItem>,
        is_loading: bool,
    ) -> Self {
        Self {
            kind,
            identity,
            items,
            is_loading,
        }
    }

    /// Derived totals.
    #[must_use]
    pub fn summary(&self) -> CollectionSummary {
        CollectionSummary::of(&self.items)
    }
}

/// Totals shown in the header badge and the cart footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSummary {
    /// Sum of quantities (for a wishlist, the number of entries).
    pub item_count: u32,
    /// Sum of line totals in the currency of the first line.
    pub subtotal: Price,
    /// Set when some lines are priced in another currency; those lines are
    /// left out of `subtotal`.
    pub mixed_currency: bool,
    /// Set when the subtotal left the `Decimal` range; `subtotal` is clamped.
    pub overflowed: bool,
}

impl CollectionSummary {
    /// Compute totals over `items`.
    #[must_use]
    pub fn of(items: &[CollectionItem]) -> Self {
        let currency = items
            .first()
            .map_or_else(CurrencyCode::default, |item| item.currency);

        let mut subtotal = Decimal::ZERO;
        let mut item_count = 0u32;
        let mut mixed_currency = false;
        let mut overflowed = false;

        for item in items {
            item_count = item_count.saturating_add(item.quantity);
            if item.currency != currency {
                mixed_currency = true;
                continue;
            }
            match item
                .line_total()
                .and_then(|line| subtotal.checked_add(line.amount))
            {
                Some(sum) => subtotal = sum,
                None => {
                    overflowed = true;
                    subtotal = Decimal::MAX;
                }
            }
        }

        if overflowed {
            tracing::warn!(lines = items.len(), "Collection subtotal out of range");
        }

        Self {
            item_count,
            subtotal: Price::new(subtotal, currency),
            mixed_currency,
            overflowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use aurelia_core::{NewItem, ProductId, ProductType};

    use super::*;

    fn line(product: &str, cents: i64, quantity: u32, currency: CurrencyCode) -> CollectionItem {
        let mut item = CollectionItem::from_new(
            NewItem {
                product_id: ProductId::new(product),
                product_type: ProductType::Necklace,
                name: product.to_owned(),
                price: Decimal::new(cents, 2),
                currency,
                original_price: None,
                image: String::new(),
                material: "silver".to_owned(),
                stone: "pearl".to_owned(),
                size: None,
                in_stock: true,
                quantity: 1,
            },
            Utc::now(),
        );
        item.quantity = quantity;
        item
    }

    #[test]
    fn test_empty_summary() {
        let summary = CollectionSummary::of(&[]);
        assert_eq!(summary.item_count, 0);
        assert_eq!(summary.subtotal, Price::zero(CurrencyCode::USD));
        assert!(!summary.mixed_currency);
    }

    #[test]
    fn test_summary_sums_quantities_and_line_totals() {
        let items = [
            line("a", 1000, 2, CurrencyCode::USD),
            line("b", 550, 1, CurrencyCode::USD),
        ];
        let summary = CollectionSummary::of(&items);

        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.subtotal.amount, Decimal::new(2550, 2));
    }

    #[test]
    fn test_summary_flags_mixed_currency() {
        let items = [
            line("a", 1000, 1, CurrencyCode::EUR),
            line("b", 550, 1, CurrencyCode::USD),
        ];
        let summary = CollectionSummary::of(&items);

        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.subtotal, Price::new(Decimal::new(1000, 2), CurrencyCode::EUR));
        assert!(summary.mixed_currency);
    }

    #[test]
    fn test_summary_clamps_out_of_range_subtotal() {
        let mut huge = line("a", 0, 2, CurrencyCode::USD);
        huge.price = Decimal::MAX;
        let items = [huge, line("b", 550, 1, CurrencyCode::USD)];

        let summary = CollectionSummary::of(&items);

        assert!(summary.overflowed);
        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.subtotal.amount, Decimal::MAX);
    }
}
