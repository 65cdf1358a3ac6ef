//! Core types for the LUXE boutique.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod product;
pub mod view;

pub use id::*;
pub use price::{CurrencyCode, Price, PriceError};
pub use product::{Category, CategoryFilter, Product};
pub use view::{EntitySlot, View, ViewParseError};
