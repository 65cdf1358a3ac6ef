//! Checkout intent dispatch.
//!
//! Two independent checkout paths are supported:
//!
//! - **Hosted payment session**: the cart is posted to a session-creation
//!   endpoint which answers with a redirect URL. Any failure falls back to the
//!   local confirmation screen after a short pacing pause (not a retry).
//! - **Messaging handoff** ([`message`]): an order summary is rendered to text
//!   and wrapped in a deep link that opens a conversation with the store.
//!
//! Outcomes are returned as a tagged [`CheckoutOutcome`] so both branches are
//! testable without network conditions.

pub mod message;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use luxe_core::{Price, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

use crate::cart::CartLineItem;
use crate::config::StorefrontConfig;

pub use message::{MessagingError, MessagingTarget, OrderMessage};

/// Request timeout for the session-creation endpoint.
pub const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors raised while talking to the session-creation endpoint.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("parse error: {0}")]
    Parse(String),
}

/// One line of a hosted checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub id: ProductId,
    pub quantity: u32,
    pub price: Price,
    pub name: String,
}

impl From<&CartLineItem> for CheckoutItem {
    fn from(line: &CartLineItem) -> Self {
        Self {
            id: line.id().clone(),
            quantity: line.quantity(),
            price: line.product().price,
            name: line.product().name.clone(),
        }
    }
}

/// Body posted to the session-creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
}

impl CheckoutRequest {
    /// Build the request from cart lines.
    #[must_use]
    pub fn from_lines(lines: &[CartLineItem]) -> Self {
        Self {
            items: lines.iter().map(CheckoutItem::from).collect(),
        }
    }
}

/// Endpoint response. Anything without a `url` triggers the local fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    #[serde(default)]
    pub url: Option<String>,
}

/// Boundary to the hosted-checkout session provider.
pub trait CheckoutGateway {
    /// Ask the provider for a checkout session.
    fn create_session(
        &self,
        request: &CheckoutRequest,
    ) -> impl Future<Output = Result<CheckoutSession, CheckoutError>> + Send;
}

/// Posts checkout requests as JSON to a session-creation endpoint.
#[derive(Debug, Clone)]
pub struct HttpCheckoutGateway {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpCheckoutGateway {
    /// Create a gateway for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, CheckoutError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    /// Gateway for the configured checkout endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self, CheckoutError> {
        Self::new(config.checkout_endpoint.clone(), CHECKOUT_TIMEOUT)
    }

    /// Endpoint this gateway posts to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl CheckoutGateway for HttpCheckoutGateway {
    #[instrument(skip(self, request), fields(endpoint = %self.endpoint, items = request.items.len()))]
    async fn create_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, CheckoutError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        // The endpoint reports failures in the body; the status is not consulted.
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| CheckoutError::Parse(format!("Failed to parse session response: {e}")))
    }
}

/// Why the dispatcher fell back to the local confirmation screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The endpoint answered without a usable URL.
    MissingUrl,
    /// The request failed or the response could not be read.
    Transport,
}

/// Result of a hosted checkout attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Hand the browsing context over to this URL.
    Redirect { url: Url },
    /// Show the local confirmation screen instead.
    Fallback { reason: FallbackReason },
    /// Another checkout is in flight; nothing was sent.
    AlreadyProcessing,
    /// Nothing to check out; nothing was sent.
    EmptyCart,
}

/// Pacing pauses before showing the fallback screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPacing {
    pub missing_url: Duration,
    pub transport_error: Duration,
}

impl Default for FallbackPacing {
    fn default() -> Self {
        Self {
            missing_url: Duration::from_millis(2000),
            transport_error: Duration::from_millis(1500),
        }
    }
}

impl FallbackPacing {
    /// No pauses at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            missing_url: Duration::ZERO,
            transport_error: Duration::ZERO,
        }
    }

    const fn delay_for(&self, reason: FallbackReason) -> Duration {
        match reason {
            FallbackReason::MissingUrl => self.missing_url,
            FallbackReason::Transport => self.transport_error,
        }
    }
}

/// Clears the in-flight flag however the attempt ends.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Turns cart contents into a hosted checkout attempt.
pub struct CheckoutDispatcher<G> {
    gateway: G,
    processing: Arc<AtomicBool>,
    pacing: FallbackPacing,
}

impl<G: CheckoutGateway> CheckoutDispatcher<G> {
    pub fn new(gateway: G, pacing: FallbackPacing) -> Self {
        Self {
            gateway,
            processing: Arc::new(AtomicBool::new(false)),
            pacing,
        }
    }

    /// True from the moment a request is issued until it resolves.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    #[must_use]
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Start a hosted checkout for `lines`.
    ///
    /// A call made while another is in flight returns
    /// [`CheckoutOutcome::AlreadyProcessing`] without issuing a request.
    /// Nothing is retried; the cart is never touched.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn initiate_hosted_checkout(&self, lines: &[CartLineItem]) -> CheckoutOutcome {
        if lines.is_empty() {
            return CheckoutOutcome::EmptyCart;
        }

        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Checkout already in flight, ignoring trigger");
            return CheckoutOutcome::AlreadyProcessing;
        }
        let _guard = ProcessingGuard(&self.processing);

        let request = CheckoutRequest::from_lines(lines);
        let reason = match self.gateway.create_session(&request).await {
            Ok(session) => match session.url.as_deref().map(Url::parse) {
                Some(Ok(url)) => {
                    info!(url = %url, "Redirecting to hosted checkout");
                    return CheckoutOutcome::Redirect { url };
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Checkout endpoint returned an invalid URL");
                    FallbackReason::MissingUrl
                }
                None => {
                    warn!("Checkout endpoint returned no URL");
                    FallbackReason::MissingUrl
                }
            },
            Err(e) => {
                warn!(error = %e, "Checkout session request failed");
                FallbackReason::Transport
            }
        };

        tokio::time::sleep(self.pacing.delay_for(reason)).await;
        CheckoutOutcome::Fallback { reason }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::catalog::tests::product;
    use luxe_core::Category;
    use tokio::sync::Notify;

    /// Gateway returning a canned result and counting calls.
    struct StubGateway {
        calls: AtomicUsize,
        result: Mutex<Option<Result<CheckoutSession, CheckoutError>>>,
        release: Option<Arc<Notify>>,
    }

    impl StubGateway {
        fn answering(result: Result<CheckoutSession, CheckoutError>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Mutex::new(Some(result)),
                release: None,
            }
        }
    }

    impl CheckoutGateway for StubGateway {
        async fn create_session(
            &self,
            _request: &CheckoutRequest,
        ) -> Result<CheckoutSession, CheckoutError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(release) = &self.release {
                release.notified().await;
            }
            self.result.lock().unwrap().take().unwrap()
        }
    }

    fn lines() -> Vec<CartLineItem> {
        vec![
            CartLineItem::new(Arc::new(product("p1", Category::Clothing, 10)), 2),
            CartLineItem::new(Arc::new(product("p2", Category::Bags, 5)), 3),
        ]
    }

    fn dispatcher(gateway: StubGateway) -> CheckoutDispatcher<StubGateway> {
        CheckoutDispatcher::new(gateway, FallbackPacing::none())
    }

    #[test]
    fn test_request_body_shape() {
        let request = CheckoutRequest::from_lines(&lines());
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"items": [
                {"id": "p1", "quantity": 2, "price": 10, "name": "Product p1"},
                {"id": "p2", "quantity": 3, "price": 5, "name": "Product p2"}
            ]})
        );
    }

    #[tokio::test]
    async fn test_redirect_on_url() {
        let d = dispatcher(StubGateway::answering(Ok(CheckoutSession {
            url: Some("https://pay.example/session/1".to_string()),
        })));

        let outcome = d.initiate_hosted_checkout(&lines()).await;
        assert_eq!(
            outcome,
            CheckoutOutcome::Redirect {
                url: Url::parse("https://pay.example/session/1").unwrap()
            }
        );
        assert!(!d.is_processing());
    }

    #[tokio::test]
    async fn test_fallback_when_url_missing() {
        let d = dispatcher(StubGateway::answering(Ok(CheckoutSession { url: None })));
        assert_eq!(
            d.initiate_hosted_checkout(&lines()).await,
            CheckoutOutcome::Fallback {
                reason: FallbackReason::MissingUrl
            }
        );
        assert!(!d.is_processing());
    }

    #[tokio::test]
    async fn test_fallback_when_url_invalid() {
        let d = dispatcher(StubGateway::answering(Ok(CheckoutSession {
            url: Some("not a url".to_string()),
        })));
        assert_eq!(
            d.initiate_hosted_checkout(&lines()).await,
            CheckoutOutcome::Fallback {
                reason: FallbackReason::MissingUrl
            }
        );
    }

    #[tokio::test]
    async fn test_fallback_on_transport_error() {
        let d = dispatcher(StubGateway::answering(Err(CheckoutError::Parse(
            "boom".to_string(),
        ))));
        assert_eq!(
            d.initiate_hosted_checkout(&lines()).await,
            CheckoutOutcome::Fallback {
                reason: FallbackReason::Transport
            }
        );
        assert!(!d.is_processing());
    }

    #[tokio::test]
    async fn test_empty_cart_sends_nothing() {
        let d = dispatcher(StubGateway::answering(Ok(CheckoutSession::default())));
        assert_eq!(
            d.initiate_hosted_checkout(&[]).await,
            CheckoutOutcome::EmptyCart
        );
        assert_eq!(d.gateway().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_trigger_while_processing_is_ignored() {
        let release = Arc::new(Notify::new());
        let mut gateway = StubGateway::answering(Ok(CheckoutSession {
            url: Some("https://pay.example/s".to_string()),
        }));
        gateway.release = Some(release.clone());
        let d = dispatcher(gateway);
        let cart = lines();

        let first = d.initiate_hosted_checkout(&cart);
        let second = async {
            // Let the first attempt reach the gateway before re-triggering.
            tokio::task::yield_now().await;
            assert!(d.is_processing());
            let outcome = d.initiate_hosted_checkout(&cart).await;
            release.notify_one();
            outcome
        };

        let (first, second) = tokio::join!(first, second);
        assert!(matches!(first, CheckoutOutcome::Redirect { .. }));
        assert_eq!(second, CheckoutOutcome::AlreadyProcessing);
        assert_eq!(d.gateway().calls.load(Ordering::SeqCst), 1);
        assert!(!d.is_processing());
    }
}
