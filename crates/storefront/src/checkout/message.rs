//! Human-operator checkout via a messaging deep link.
//!
//! The order is rendered as plain text and embedded, URL-encoded, in a link
//! that opens a conversation with the store's messaging account. Building the
//! message never mutates the cart; clearing it after the handoff is the
//! caller's job.

use luxe_core::{CurrencyCode, Price, Product};
use thiserror::Error;
use url::Url;

use crate::cart::CartLineItem;

/// Default deep-link base for the messaging app.
pub const DEFAULT_MESSAGING_BASE: &str = "https://wa.me/";

/// Errors raised while building a messaging handoff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagingError {
    #[error("messaging phone number has no digits: {0:?}")]
    InvalidPhone(String),

    #[error("invalid messaging link: {0}")]
    InvalidUrl(String),
}

/// The account a handoff message is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingTarget {
    base: Url,
    phone: String,
}

impl MessagingTarget {
    /// Target a phone number on the default messaging service.
    ///
    /// Formatting (`+`, spaces, dashes, parentheses) is stripped.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::InvalidPhone` if no digits remain.
    pub fn new(phone: &str) -> Result<Self, MessagingError> {
        let base = Url::parse(DEFAULT_MESSAGING_BASE)
            .map_err(|e| MessagingError::InvalidUrl(e.to_string()))?;
        Self::with_base(base, phone)
    }

    /// Target a phone number on a custom deep-link base.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::InvalidPhone` if no digits remain.
    pub fn with_base(base: Url, phone: &str) -> Result<Self, MessagingError> {
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(MessagingError::InvalidPhone(phone.to_string()));
        }
        Ok(Self {
            base,
            phone: digits,
        })
    }

    /// Normalized phone number (digits only).
    #[must_use]
    pub fn phone(&self) -> &str {
        &self.phone
    }
}

/// A pre-filled message for the store operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderMessage {
    text: String,
}

impl OrderMessage {
    /// Itemized order summary for the whole cart.
    #[must_use]
    pub fn for_cart(store_name: &str, lines: &[CartLineItem], currency: CurrencyCode) -> Self {
        let items = lines
            .iter()
            .map(|line| {
                let product = line.product();
                let price = product.price.display(currency);
                if line.quantity() > 1 {
                    format!("- {} ({price}) x {}", product.name, line.quantity())
                } else {
                    format!("- {} ({price})", product.name)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        let total: Price = lines.iter().map(CartLineItem::line_total).sum();

        Self {
            text: format!(
                "Hello! I would like to place an order at {store_name}:\n\n{items}\n\nTotal: {}\n\nPlease confirm availability.",
                total.display(currency)
            ),
        }
    }

    /// Single-product availability question.
    #[must_use]
    pub fn for_product_inquiry(product: &Product, currency: CurrencyCode) -> Self {
        Self {
            text: format!(
                "Hello! I'm interested in {} priced at {}. Is it available?",
                product.name,
                product.price.display(currency)
            ),
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Deep link opening a conversation pre-filled with this message.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::InvalidUrl` if the link cannot be formed.
    pub fn deep_link(&self, target: &MessagingTarget) -> Result<Url, MessagingError> {
        let mut url = target
            .base
            .join(&target.phone)
            .map_err(|e| MessagingError::InvalidUrl(e.to_string()))?;
        let query = format!("text={}", urlencoding::encode(&self.text));
        url.set_query(Some(&query));
        Ok(url)
    }
}
