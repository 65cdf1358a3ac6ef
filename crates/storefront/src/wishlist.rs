//! Session wishlist.

use std::sync::Arc;

use luxe_core::{Product, ProductId};

use crate::catalog::Catalog;

/// Products the shopper has hearted, in the order they were added.
///
/// Lives for the session only; it is not persisted.
#[derive(Debug, Clone, Default)]
pub struct Wishlist {
    ids: Vec<ProductId>,
}

impl Wishlist {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the product if absent, remove it if present.
    ///
    /// Returns whether the product is wishlisted afterwards.
    pub fn toggle(&mut self, id: &ProductId) -> bool {
        if let Some(pos) = self.ids.iter().position(|w| w == id) {
            self.ids.remove(pos);
            false
        } else {
            self.ids.push(id.clone());
            true
        }
    }

    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn ids(&self) -> &[ProductId] {
        &self.ids
    }

    /// Resolve wishlisted ids against the catalog, in catalog order.
    ///
    /// Ids no longer in the catalog are skipped.
    #[must_use]
    pub fn items(&self, catalog: &Catalog) -> Vec<Arc<Product>> {
        catalog
            .products()
            .iter()
            .filter(|p| self.contains(&p.id))
            .cloned()
            .collect()
    }
}
