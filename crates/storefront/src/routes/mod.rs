//! HTTP route handlers for the storefront service.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                               - Health check
//!
//! # Catalog
//! GET  /api/products[?category=]             - Product listing
//! GET  /api/products/{id}                    - Product detail
//! GET  /api/products/{id}/recommendations    - "Recommended for you"
//!
//! # Checkout
//! POST /api/checkout                         - Create a hosted payment session
//!
//! # Try-on
//! POST /api/try-on                           - Generate a try-on image
//! ```

pub mod checkout;
pub mod products;
pub mod tryon;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::{Span, warn};

use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
        .route("/{id}/recommendations", get(products::recommendations))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/products", product_routes())
        .route("/api/checkout", post(checkout::create))
        .route(
            "/api/try-on",
            post(tryon::create).layer(DefaultBodyLimit::max(tryon::MAX_TRYON_BODY_BYTES)),
        )
}

/// Build the application router with tracing and CORS.
pub fn app(state: AppState) -> Router {
    let cors = build_cors(&state);
    routes()
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Allow the storefront's own origin to call the API from the browser.
fn build_cors(state: &AppState) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let origin = state.config().base_url.origin().ascii_serialization();
    match HeaderValue::from_str(&origin) {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            warn!(origin, error = %e, "Invalid CORS origin, cross-origin calls disabled");
            cors
        }
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}
