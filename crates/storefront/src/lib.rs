//! LUXE boutique storefront.
//!
//! The shopper-facing core ([`session::StorefrontSession`] and the stores it
//! owns) plus the small HTTP service that serves the catalog and creates
//! hosted payment sessions.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod navigation;
pub mod payments;
pub mod routes;
pub mod session;
pub mod state;
pub mod tryon;
pub mod wishlist;
