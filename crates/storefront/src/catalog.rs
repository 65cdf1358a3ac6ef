//! Static product catalog.
//!
//! The catalog is loaded once from the site configuration document and is
//! read-only afterwards. Products are handed out as `Arc<Product>` so carts,
//! wishlists and try-on sessions all reference the same record.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use luxe_core::{CategoryFilter, Product, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid catalog document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate product id in catalog: {0}")]
    DuplicateProduct(ProductId),
}

/// Home page hero banner copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroSection {
    pub title: String,
    pub subtitle: String,
    pub image: String,
    pub button_text: String,
}

/// Wire shape of the site configuration document.
#[derive(Debug, Deserialize)]
struct SiteDocument {
    hero: HeroSection,
    products: Vec<Product>,
}

/// The loaded, ordered product catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    hero: HeroSection,
    products: Vec<Arc<Product>>,
}

impl Catalog {
    /// Build a catalog from already-parsed parts.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateProduct` if two products share an id.
    pub fn new(hero: HeroSection, products: Vec<Product>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(products.len());
        for product in &products {
            if !seen.insert(&product.id) {
                return Err(CatalogError::DuplicateProduct(product.id.clone()));
            }
        }

        Ok(Self {
            hero,
            products: products.into_iter().map(Arc::new).collect(),
        })
    }

    /// Parse a catalog from the site configuration JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or contains duplicate ids.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let doc: SiteDocument = serde_json::from_str(json)?;
        Self::new(doc.hero, doc.products)
    }

    /// Load the catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            products = catalog.products.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// Hero banner copy.
    #[must_use]
    pub const fn hero(&self) -> &HeroSection {
        &self.hero
    }

    /// All products in catalog order.
    #[must_use]
    pub fn products(&self) -> &[Arc<Product>] {
        &self.products
    }

    /// Look up a product by id.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&Arc<Product>> {
        self.products.iter().find(|p| &p.id == id)
    }

    /// Products passing a category filter, in catalog order.
    pub fn filter(&self, filter: CategoryFilter) -> impl Iterator<Item = &Arc<Product>> {
        self.products
            .iter()
            .filter(move |p| filter.matches(p.category))
    }

    /// Products carrying the "new" badge.
    pub fn new_arrivals(&self) -> impl Iterator<Item = &Arc<Product>> {
        self.products.iter().filter(|p| p.is_new())
    }

    /// "Recommended for you": other products in catalog order, at most `limit`.
    pub fn recommendations(
        &self,
        id: &ProductId,
        limit: usize,
    ) -> impl Iterator<Item = &Arc<Product>> {
        self.products
            .iter()
            .filter(move |p| &p.id != id)
            .take(limit)
    }
}
