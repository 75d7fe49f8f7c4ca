//! Aurelia storefront collections library.
//!
//! Identity-scoped cart and wishlist state: a persistent [`store`], the
//! [`collections`] managers that keep one identity's collection in memory,
//! and the [`session`] bridge that switches them as shoppers sign in and out.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod catalog;
pub mod collections;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod session;
pub mod store;
