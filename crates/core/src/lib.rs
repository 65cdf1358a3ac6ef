//! LUXE Core - Shared types library.
//!
//! This crate provides the domain types used across the LUXE boutique:
//! - `storefront` - Session core (cart, navigation, checkout, try-on) and the
//!   catalog/checkout HTTP service
//! - `integration-tests` - Cross-crate behaviour tests
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients,
//! no storage. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, prices, catalog products and the view set

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
