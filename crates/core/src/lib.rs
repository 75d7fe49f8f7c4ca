//! Aurelia Core - Shared domain types.
//!
//! This crate provides the types shared by every Aurelia component:
//! - `storefront` - Identity-scoped cart and wishlist state
//! - `cli` - Migrations and storage maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no async. Storage keys are derived here so that every component maps
//! the same `(kind, identity)` pair to the same key.
//!
//! # Modules
//!
//! - [`types`] - Identifiers, prices, emails, identities and collection items

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
