//! Logical storefront screens.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing an unknown view name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid view: {0}")]
pub struct ViewParseError(pub String);

/// The closed set of screens the storefront can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    #[default]
    Home,
    Catalog,
    ProductDetail,
    Cart,
    Checkout,
    Account,
    CustomerService,
    Legal,
    About,
}

/// Which selection slot a view reads its entity from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntitySlot {
    Product,
    CustomerServiceSection,
    LegalSection,
}

impl View {
    /// Every view, in menu order.
    pub const ALL: [Self; 9] = [
        Self::Home,
        Self::Catalog,
        Self::ProductDetail,
        Self::Cart,
        Self::Checkout,
        Self::Account,
        Self::CustomerService,
        Self::Legal,
        Self::About,
    ];

    /// Stable kebab-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Catalog => "catalog",
            Self::ProductDetail => "product-detail",
            Self::Cart => "cart",
            Self::Checkout => "checkout",
            Self::Account => "account",
            Self::CustomerService => "customer-service",
            Self::Legal => "legal",
            Self::About => "about",
        }
    }

    /// The selection slot this view uses, if any.
    #[must_use]
    pub const fn entity_slot(&self) -> Option<EntitySlot> {
        match self {
            Self::ProductDetail => Some(EntitySlot::Product),
            Self::CustomerService => Some(EntitySlot::CustomerServiceSection),
            Self::Legal => Some(EntitySlot::LegalSection),
            _ => None,
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for View {
    type Err = ViewParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ViewParseError(s.to_string()))
    }
}
