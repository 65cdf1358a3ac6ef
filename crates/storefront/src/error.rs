//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before a JSON `{"error": ...}` body is sent.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::payments::PaymentError;
use crate::tryon::{self, SynthesisError};

/// Message shown to shoppers when a payment session cannot be created.
pub const PAYMENT_FAILURE_MESSAGE: &str = "Failed to create payment session. Please try again.";

/// Application-level error type for the storefront service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Payment provider call failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// No payment provider is configured.
    #[error("Payments are not configured")]
    PaymentsUnavailable,

    /// Image synthesis call failed.
    #[error("Try-on error: {0}")]
    TryOn(#[from] SynthesisError),

    /// No image synthesizer is configured.
    #[error("Try-on is not configured")]
    TryOnUnavailable,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Payment(_) | Self::PaymentsUnavailable | Self::TryOn(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Payment(_) | Self::PaymentsUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            Self::TryOn(_) => StatusCode::BAD_GATEWAY,
            Self::TryOnUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Payment(_) | Self::PaymentsUnavailable => PAYMENT_FAILURE_MESSAGE.to_string(),
            Self::TryOn(_) | Self::TryOnUnavailable => tryon::FAILURE_MESSAGE.to_string(),
            Self::NotFound(_) | Self::BadRequest(_) => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}
