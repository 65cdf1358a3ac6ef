//! Application state shared across handlers.

use std::sync::Arc;

use thiserror::Error;

use crate::catalog::Catalog;
use crate::config::StorefrontConfig;
use crate::payments::{PaymentError, SessionUrls, StripeClient};
use crate::tryon::{GeminiSynthesizer, SynthesisError};

/// Error building the configured service clients.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("payment client: {0}")]
    Payments(#[from] PaymentError),

    #[error("try-on client: {0}")]
    TryOn(#[from] SynthesisError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// catalog, configuration, payment provider and image synthesizer.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: Arc<Catalog>,
    payments: Option<StripeClient>,
    synthesizer: Option<GeminiSynthesizer>,
    session_urls: SessionUrls,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Hosted checkout is enabled only when Stripe is configured, try-on
    /// only when an image model key is set.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured client cannot be built.
    pub fn new(config: StorefrontConfig, catalog: Arc<Catalog>) -> Result<Self, StateError> {
        let payments = config
            .stripe
            .as_ref()
            .map(|stripe| {
                StripeClient::new(
                    &stripe.secret_key,
                    config.store.currency,
                    stripe.allowed_countries.clone(),
                )
            })
            .transpose()?;
        let synthesizer = config
            .tryon
            .as_ref()
            .map(GeminiSynthesizer::from_config)
            .transpose()?;

        Ok(Self::with_services(config, catalog, payments, synthesizer))
    }

    /// Create state with explicit clients (used by tests).
    #[must_use]
    pub fn with_services(
        config: StorefrontConfig,
        catalog: Arc<Catalog>,
        payments: Option<StripeClient>,
        synthesizer: Option<GeminiSynthesizer>,
    ) -> Self {
        let session_urls = SessionUrls::for_storefront(config.base_url.as_str());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                payments,
                synthesizer,
                session_urls,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Stripe client, if hosted checkout is enabled.
    #[must_use]
    pub fn payments(&self) -> Option<&StripeClient> {
        self.inner.payments.as_ref()
    }

    /// Image synthesizer, if try-on is enabled.
    #[must_use]
    pub fn synthesizer(&self) -> Option<&GeminiSynthesizer> {
        self.inner.synthesizer.as_ref()
    }

    #[must_use]
    pub fn session_urls(&self) -> &SessionUrls {
        &self.inner.session_urls
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::catalog::tests::sample_catalog;
    use crate::config::{StripeConfig, TryOnConfig};
    use crate::routes::tests::test_config;

    #[test]
    fn test_services_follow_config() {
        let state = AppState::new(test_config(), Arc::new(sample_catalog())).unwrap();
        assert!(state.payments().is_none());
        assert!(state.synthesizer().is_none());

        let mut config = test_config();
        config.stripe = Some(StripeConfig {
            secret_key: SecretString::from("sk_test_51Hq8xKjT4vRz2LmN9pQwE7yU"),
            allowed_countries: vec!["US".to_string()],
        });
        config.tryon = Some(TryOnConfig {
            api_key: SecretString::from("AIzaSyD4kq9Zr8Xw2Vt7Lm3Np6Qb"),
            model: "gemini-2.5-flash-image".to_string(),
        });
        let state = AppState::new(config, Arc::new(sample_catalog())).unwrap();
        assert!(state.payments().is_some());
        assert_eq!(
            state.synthesizer().map(GeminiSynthesizer::model),
            Some("gemini-2.5-flash-image")
        );
        assert_eq!(state.session_urls().cancel_url, "https://luxe.example/cart");
    }
}
