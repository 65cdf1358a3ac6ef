//! Integration tests for the LUXE storefront.
//!
//! HTTP boundaries (checkout endpoint, Stripe, Gemini) are stood up with
//! `wiremock`, so no real network traffic is made.
//!
//! ```bash
//! cargo test -p luxe-integration-tests
//! ```
//!
//! This library holds fixtures shared by the test files.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use luxe_core::{CurrencyCode, ProductId};
use luxe_storefront::cart::{CartStore, MemoryStore};
use luxe_storefront::catalog::Catalog;
use luxe_storefront::config::{CartConfig, StoreConfig, StorefrontConfig};
use luxe_storefront::routes;
use luxe_storefront::state::AppState;
use url::Url;

/// The catalog bundled with the storefront.
///
/// # Panics
///
/// Panics if the bundled document does not parse.
#[must_use]
pub fn bundled_catalog() -> Arc<Catalog> {
    let json = include_str!("../../storefront/content/catalog.json");
    Arc::new(Catalog::from_json(json).expect("bundled catalog parses"))
}

/// An in-memory cart holding one unit of each product in `ids`.
///
/// # Panics
///
/// Panics if an id is not in `catalog`.
#[must_use]
pub fn cart_with(catalog: &Catalog, ids: &[&str]) -> CartStore<MemoryStore> {
    let mut cart = CartStore::open(MemoryStore::new(), "luxe-cart");
    for id in ids {
        let product = catalog
            .get(&ProductId::new(*id))
            .expect("product in catalog");
        cart.add(Arc::clone(product));
    }
    cart
}

/// Configuration pointing at `base_url`, with every optional service off.
///
/// # Panics
///
/// Panics if `base_url` is not a valid URL.
#[must_use]
pub fn test_config(base_url: &str) -> StorefrontConfig {
    let base_url = Url::parse(base_url).expect("valid base url");
    StorefrontConfig {
        host: "127.0.0.1".parse().expect("valid host"),
        port: 0,
        checkout_endpoint: base_url.join("api/checkout").expect("valid endpoint"),
        base_url,
        catalog_path: PathBuf::from("crates/storefront/content/catalog.json"),
        store: StoreConfig {
            name: "LUXE".to_string(),
            currency: CurrencyCode::USD,
            whatsapp_number: None,
        },
        cart: CartConfig {
            storage_key: "luxe-cart".to_string(),
            storage_dir: None,
        },
        stripe: None,
        tryon: None,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Serve the storefront API on an ephemeral local port.
///
/// # Panics
///
/// Panics if the listener cannot be bound.
pub async fn spawn_service(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, routes::app(state))
            .await
            .expect("storefront service");
    });
    addr
}
