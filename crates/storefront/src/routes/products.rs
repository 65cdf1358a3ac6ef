//! Product catalog API handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use luxe_core::{CategoryFilter, Product, ProductId};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Number of "recommended for you" products shown on a detail page.
pub const RECOMMENDATION_LIMIT: usize = 4;

/// Listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Category label, or "all"/"Shop All".
    pub category: Option<String>,
}

/// List products, optionally filtered by category.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Arc<Product>>>> {
    let filter = match query.category.as_deref() {
        Some(raw) => raw
            .parse::<CategoryFilter>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?,
        None => CategoryFilter::All,
    };

    Ok(Json(state.catalog().filter(filter).cloned().collect()))
}

/// Show one product.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Arc<Product>>> {
    state
        .catalog()
        .get(&ProductId::new(id.as_str()))
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// Other products to show alongside one product.
pub async fn recommendations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Arc<Product>>>> {
    let id = ProductId::new(id.as_str());
    if state.catalog().get(&id).is_none() {
        return Err(AppError::NotFound(format!("product {id}")));
    }

    Ok(Json(
        state
            .catalog()
            .recommendations(&id, RECOMMENDATION_LIMIT)
            .cloned()
            .collect(),
    ))
}
