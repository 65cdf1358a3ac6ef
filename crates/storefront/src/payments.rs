//! Hosted payment session provider (server side).
//!
//! Creates one-time card payment sessions with Stripe Checkout. The storefront
//! posts its cart to `POST /api/checkout`; the route re-prices every line from
//! the catalog and hands the result to a [`PaymentProvider`].

use std::future::Future;

use luxe_core::CurrencyCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

/// Stripe API base URL.
const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Errors that can occur when creating a payment session.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// A line could not be converted to minor units.
    #[error("amount out of range for {0}")]
    AmountOutOfRange(String),

    /// Provider answered without a session URL.
    #[error("payment session has no URL")]
    MissingUrl,

    /// Failed to build the client or parse a response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A priced line ready for the payment provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLine {
    pub name: String,
    /// Unit price in minor units (cents).
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Return URLs for a hosted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUrls {
    pub success_url: String,
    pub cancel_url: String,
}

impl SessionUrls {
    /// Standard storefront return URLs under `base_url`.
    #[must_use]
    pub fn for_storefront(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            success_url: format!("{base}/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/cart"),
        }
    }
}

/// Boundary to a hosted payment provider.
pub trait PaymentProvider: Send + Sync {
    /// Create a session and return its redirect URL.
    fn create_session(
        &self,
        lines: &[PaymentLine],
        urls: &SessionUrls,
    ) -> impl Future<Output = Result<String, PaymentError>> + Send;
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
}

/// Stripe Checkout client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    currency: CurrencyCode,
    allowed_countries: Vec<String>,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .field("currency", &self.currency)
            .field("allowed_countries", &self.allowed_countries)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a client authenticated with `secret_key`.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(
        secret_key: &SecretString,
        currency: CurrencyCode,
        allowed_countries: Vec<String>,
    ) -> Result<Self, PaymentError> {
        Self::with_api_base(secret_key, currency, allowed_countries, STRIPE_API_BASE)
    }

    /// Create a client against a custom API base (used by tests).
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn with_api_base(
        secret_key: &SecretString,
        currency: CurrencyCode,
        allowed_countries: Vec<String>,
        api_base: &str,
    ) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| PaymentError::Parse(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            currency,
            allowed_countries,
        })
    }

    /// Form fields for a checkout session, in Stripe's bracket notation.
    fn session_form(&self, lines: &[PaymentLine], urls: &SessionUrls) -> Vec<(String, String)> {
        let currency = self.currency.code().to_ascii_lowercase();
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("success_url".to_string(), urls.success_url.clone()),
            ("cancel_url".to_string(), urls.cancel_url.clone()),
            ("automatic_tax[enabled]".to_string(), "true".to_string()),
        ];

        for (i, country) in self.allowed_countries.iter().enumerate() {
            form.push((
                format!("shipping_address_collection[allowed_countries][{i}]"),
                country.clone(),
            ));
        }

        for (i, line) in lines.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            form.push((
                format!("{prefix}[price_data][currency]"),
                currency.clone(),
            ));
            form.push((
                format!("{prefix}[price_data][product_data][name]"),
                line.name.clone(),
            ));
            form.push((
                format!("{prefix}[price_data][unit_amount]"),
                line.unit_amount.to_string(),
            ));
            form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
        }
        form
    }
}

impl PaymentProvider for StripeClient {
    #[instrument(skip(self, lines, urls), fields(lines = lines.len()))]
    async fn create_session(
        &self,
        lines: &[PaymentLine],
        urls: &SessionUrls,
    ) -> Result<String, PaymentError> {
        let url = format!("{}/checkout/sessions", self.api_base);
        let response = self
            .client
            .post(&url)
            .form(&self.session_form(lines, urls))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;
        session.url.ok_or(PaymentError::MissingUrl)
    }
}
