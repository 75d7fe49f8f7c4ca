//! Per-kind behaviour of a collection manager.

use aurelia_core::{CollectionItem, CollectionKind, NewItem};

/// What distinguishes a cart from a wishlist.
///
/// Implemented by the uninhabited markers [`Cart`] and [`Wishlist`]; a manager
/// is parameterised by one of them, so cart-only operations exist only on
/// cart managers.
pub trait CollectionPolicy: Send + Sync + 'static {
    /// Kind used to derive storage keys.
    const KIND: CollectionKind;

    /// Fold a repeated add into the existing line with the same key.
    ///
    /// Returns whether the line changed.
    fn merge(existing: &mut CollectionItem, candidate: &NewItem) -> bool;

    /// Normalise a freshly created line before it is appended.
    fn prepare(item: &mut CollectionItem);
}

/// Marker for shopping carts: repeated adds accumulate quantity.
#[derive(Debug)]
pub enum Cart {}

/// Marker for wishlists: an entry is either saved or not.
#[derive(Debug)]
pub enum Wishlist {}

impl CollectionPolicy for Cart {
    const KIND: CollectionKind = CollectionKind::Cart;

    fn merge(existing: &mut CollectionItem, candidate: &NewItem) -> bool {
        existing.quantity = existing.quantity.saturating_add(candidate.quantity.max(1));
        true
    }

    fn prepare(_item: &mut CollectionItem) {}
}

impl CollectionPolicy for Wishlist {
    const KIND: CollectionKind = CollectionKind::Wishlist;

    fn merge(_existing: &mut CollectionItem, _candidate: &NewItem) -> bool {
        false
    }

    fn prepare(item: &mut CollectionItem) {
        item.quantity = 1;
    }
}
