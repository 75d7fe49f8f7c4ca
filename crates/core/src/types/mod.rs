//! Core types for Aurelia.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod collection;
pub mod email;
pub mod id;
pub mod identity;
pub mod price;
pub mod product;

pub use collection::{CollectionItem, ItemKey, NewItem};
pub use email::{Email, EmailError};
pub use id::*;
pub use identity::{CollectionKind, Identity, StorageKey, StorageKeyError, validate_namespace};
pub use price::{CurrencyCode, Price};
pub use product::{ProductType, UnknownProductType};
