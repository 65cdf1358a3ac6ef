//! Hosted checkout session creation.
//!
//! The client's cart is not trusted for prices or names: every line is
//! re-priced from the catalog before it reaches the payment provider.

use axum::{Json, extract::State};
use tracing::{info, instrument, warn};

use crate::catalog::Catalog;
use crate::checkout::{CheckoutRequest, CheckoutSession};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::payments::{PaymentError, PaymentLine, PaymentProvider, SessionUrls};
use crate::state::AppState;

/// Create a hosted payment session for the posted cart.
///
/// The cart is validated before the provider is looked up, so a bad cart is
/// a 400 whether or not payments are configured.
#[instrument(skip(state, request), fields(items = request.items.len()))]
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutSession>> {
    let lines = price_lines(state.catalog(), &request)?;
    let provider = state.payments().ok_or(AppError::PaymentsUnavailable)?;
    let session = create_session(provider, &lines, state.session_urls()).await?;
    Ok(Json(session))
}

/// Open a session with `provider` for already-priced `lines`.
///
/// # Errors
///
/// Returns `AppError::Payment` if the provider fails.
pub async fn create_session<P: PaymentProvider>(
    provider: &P,
    lines: &[PaymentLine],
    urls: &SessionUrls,
) -> Result<CheckoutSession> {
    let line_count = lines.len().to_string();
    add_breadcrumb(
        "checkout",
        "Creating payment session",
        &[("lines", line_count.as_str())],
    );

    let url = provider.create_session(lines, urls).await?;
    info!(lines = lines.len(), "Payment session created");
    Ok(CheckoutSession { url: Some(url) })
}

/// Build provider lines from catalog prices.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for empty carts, unknown products or zero
/// quantities.
pub fn price_lines(catalog: &Catalog, request: &CheckoutRequest) -> Result<Vec<PaymentLine>> {
    if request.items.is_empty() {
        return Err(AppError::BadRequest("cart is empty".to_string()));
    }

    request
        .items
        .iter()
        .map(|item| {
            let product = catalog
                .get(&item.id)
                .ok_or_else(|| AppError::BadRequest(format!("unknown product: {}", item.id)))?;
            if item.quantity == 0 {
                return Err(AppError::BadRequest(format!(
                    "quantity must be positive for {}",
                    item.id
                )));
            }
            if item.price != product.price {
                warn!(product = %item.id, "Client price differs from catalog, using catalog");
            }
            let unit_amount = product
                .price
                .to_minor_units()
                .ok_or_else(|| PaymentError::AmountOutOfRange(item.id.to_string()))?;

            Ok(PaymentLine {
                name: product.name.clone(),
                unit_amount,
                quantity: item.quantity,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use luxe_core::{Price, ProductId};

    use super::*;
    use crate::catalog::tests::sample_catalog;
    use crate::checkout::CheckoutItem;

    /// Provider recording the lines it was given.
    #[derive(Default)]
    struct RecordingProvider {
        seen: Mutex<Vec<PaymentLine>>,
        fail: bool,
    }

    impl PaymentProvider for RecordingProvider {
        async fn create_session(
            &self,
            lines: &[PaymentLine],
            _urls: &SessionUrls,
        ) -> std::result::Result<String, PaymentError> {
            if self.fail {
                return Err(PaymentError::Api {
                    status: 402,
                    message: "card_declined".to_string(),
                });
            }
            self.seen.lock().unwrap().extend_from_slice(lines);
            Ok("https://checkout.stripe.test/c/pay/cs_1".to_string())
        }
    }

    fn item(id: &str, quantity: u32, price: u32) -> CheckoutItem {
        CheckoutItem {
            id: ProductId::new(id),
            quantity,
            price: Price::from_units(price),
            name: "client name".to_string(),
        }
    }

    fn urls() -> SessionUrls {
        SessionUrls::for_storefront("https://luxe.example")
    }

    #[test]
    fn test_lines_use_catalog_prices() {
        let request = CheckoutRequest {
            items: vec![item("p1", 2, 1), item("p3", 1, 300)],
        };
        let lines = price_lines(&sample_catalog(), &request).unwrap();

        assert_eq!(
            lines,
            vec![
                PaymentLine {
                    name: "Product p1".to_string(),
                    unit_amount: 1000,
                    quantity: 2,
                },
                PaymentLine {
                    name: "Product p3".to_string(),
                    unit_amount: 30_000,
                    quantity: 1,
                },
            ]
        );
    }

    #[test]
    fn test_unknown_product_is_bad_request() {
        let request = CheckoutRequest {
            items: vec![item("ghost", 1, 10)],
        };
        assert!(matches!(
            price_lines(&sample_catalog(), &request),
            Err(AppError::BadRequest(msg)) if msg.contains("ghost")
        ));
    }

    #[test]
    fn test_empty_and_zero_quantity_rejected() {
        let catalog = sample_catalog();
        assert!(price_lines(&catalog, &CheckoutRequest { items: vec![] }).is_err());
        assert!(
            price_lines(
                &catalog,
                &CheckoutRequest {
                    items: vec![item("p1", 0, 10)]
                }
            )
            .is_err()
        );
    }

    #[tokio::test]
    async fn test_session_url_returned() {
        let provider = RecordingProvider::default();
        let request = CheckoutRequest {
            items: vec![item("p2", 3, 5)],
        };

        let lines = price_lines(&sample_catalog(), &request).unwrap();
        let session = create_session(&provider, &lines, &urls()).await.unwrap();
        assert_eq!(
            session.url.as_deref(),
            Some("https://checkout.stripe.test/c/pay/cs_1")
        );
        assert_eq!(provider.seen.lock().unwrap()[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_provider_failure_maps_to_payment_error() {
        let provider = RecordingProvider {
            fail: true,
            ..RecordingProvider::default()
        };
        let request = CheckoutRequest {
            items: vec![item("p2", 1, 5)],
        };

        let lines = price_lines(&sample_catalog(), &request).unwrap();
        let result = create_session(&provider, &lines, &urls()).await;
        assert!(matches!(result, Err(AppError::Payment(PaymentError::Api { status: 402, .. }))));
    }
}
