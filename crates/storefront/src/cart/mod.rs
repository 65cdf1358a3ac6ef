//! Shopping cart state.
//!
//! [`CartStore`] is the single owner of the session cart. Every view reads the
//! cart through the store (or a [`subscribe`](CartStore::subscribe) receiver)
//! so all readers observe the same sequence of mutations.
//!
//! # Invariants
//!
//! - At most one line per product id; adding a present product increments it.
//! - Quantities are always `>= 1`. `update_quantity` floors at 1 and never
//!   removes a line; `remove` is the only way to drop one.
//! - Totals are derived on read, never stored.
//! - The snapshot is written after every mutation. A missing or corrupt
//!   snapshot at start-up yields an empty cart.

pub mod persistence;

use std::sync::Arc;

use luxe_core::{Price, Product, ProductId};
use tokio::sync::watch;
use tracing::{debug, warn};

pub use persistence::{
    CartStorage, FileStore, MemoryStore, SnapshotError, SnapshotStore, StorageError,
};

/// One product in the cart with its quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineItem {
    product: Arc<Product>,
    quantity: u32,
}

impl CartLineItem {
    pub(crate) const fn new(product: Arc<Product>, quantity: u32) -> Self {
        Self { product, quantity }
    }

    /// The referenced catalog product.
    #[must_use]
    pub fn product(&self) -> &Product {
        &self.product
    }

    /// Shared handle to the product.
    #[must_use]
    pub const fn product_handle(&self) -> &Arc<Product> {
        &self.product
    }

    /// Product id of this line.
    #[must_use]
    pub fn id(&self) -> &ProductId {
        &self.product.id
    }

    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// What `add` did to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new line was appended with quantity 1.
    Appended,
    /// An existing line's quantity went up by one.
    Incremented,
}

/// Published to subscribers after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartSnapshot {
    /// Strictly increasing mutation counter.
    pub revision: u64,
    pub lines: Vec<CartLineItem>,
}

impl CartSnapshot {
    /// Sum of quantities.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        total_count(&self.lines)
    }

    /// Sum of price x quantity.
    #[must_use]
    pub fn total_price(&self) -> Price {
        total_price(&self.lines)
    }
}

fn total_count(lines: &[CartLineItem]) -> u64 {
    lines.iter().map(|l| u64::from(l.quantity)).sum()
}

fn total_price(lines: &[CartLineItem]) -> Price {
    lines.iter().map(CartLineItem::line_total).sum()
}

/// Owner of the session cart.
pub struct CartStore<S> {
    lines: Vec<CartLineItem>,
    storage: S,
    key: String,
    panel_open: bool,
    revision: u64,
    notifier: watch::Sender<CartSnapshot>,
}

impl<S: SnapshotStore> CartStore<S> {
    /// Create the store, rehydrating from the snapshot under `key` if present.
    ///
    /// Never fails: unreadable or malformed snapshots are logged and ignored.
    pub fn open(storage: S, key: impl Into<String>) -> Self {
        let key = key.into();
        let lines = match storage.load(&key) {
            Ok(Some(raw)) => persistence::decode(&raw).unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "Discarding malformed cart snapshot");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read cart snapshot");
                Vec::new()
            }
        };

        debug!(key = %key, lines = lines.len(), "Cart store opened");

        let (notifier, _) = watch::channel(CartSnapshot {
            revision: 0,
            lines: lines.clone(),
        });

        Self {
            lines,
            storage,
            key,
            panel_open: false,
            revision: 0,
            notifier,
        }
    }

    /// Add one unit of `product`, merging with an existing line.
    ///
    /// Also opens the cart panel.
    pub fn add(&mut self, product: Arc<Product>) -> AddOutcome {
        let outcome = if let Some(line) = self.lines.iter_mut().find(|l| l.id() == &product.id) {
            line.quantity = line.quantity.saturating_add(1);
            AddOutcome::Incremented
        } else {
            self.lines.push(CartLineItem::new(product, 1));
            AddOutcome::Appended
        };

        self.panel_open = true;
        self.commit();
        outcome
    }

    /// Remove the line for `id`. Returns `false` (and does nothing) if absent.
    pub fn remove(&mut self, id: &ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.id() != id);
        if self.lines.len() == before {
            return false;
        }
        self.commit();
        true
    }

    /// Adjust a line's quantity by `delta`, flooring at 1.
    ///
    /// Returns the resulting quantity, or `None` if `id` is not in the cart.
    pub fn update_quantity(&mut self, id: &ProductId, delta: i64) -> Option<u32> {
        let line = self.lines.iter_mut().find(|l| l.id() == id)?;

        let target = i64::from(line.quantity).saturating_add(delta).max(1);
        let quantity = u32::try_from(target).unwrap_or(u32::MAX);
        if quantity != line.quantity {
            line.quantity = quantity;
            self.commit();
        }
        Some(quantity)
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.commit();
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLineItem] {
        &self.lines
    }

    /// Line for a product, if present.
    #[must_use]
    pub fn line(&self, id: &ProductId) -> Option<&CartLineItem> {
        self.lines.iter().find(|l| l.id() == id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        total_count(&self.lines)
    }

    /// Sum of price x quantity across all lines.
    #[must_use]
    pub fn total_price(&self) -> Price {
        total_price(&self.lines)
    }

    /// Whether the cart panel is the active presentation surface.
    #[must_use]
    pub const fn is_panel_open(&self) -> bool {
        self.panel_open
    }

    pub const fn open_panel(&mut self) {
        self.panel_open = true;
    }

    pub const fn close_panel(&mut self) {
        self.panel_open = false;
    }

    /// Receive a [`CartSnapshot`] after every mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.notifier.subscribe()
    }

    /// Storage backend (mainly for inspection).
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    fn commit(&mut self) {
        self.revision += 1;
        self.persist();
        self.notifier.send_replace(CartSnapshot {
            revision: self.revision,
            lines: self.lines.clone(),
        });
    }

    fn persist(&self) {
        let encoded = match persistence::encode(&self.lines) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(error = %e, "Failed to serialize cart snapshot");
                return;
            }
        };
        if let Err(e) = self.storage.save(&self.key, &encoded) {
            warn!(key = %self.key, error = %e, "Failed to persist cart snapshot");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::tests::product;
    use luxe_core::Category;

    const KEY: &str = "luxe-cart";

    fn item(id: &str, price: u32) -> Arc<Product> {
        Arc::new(product(id, Category::Clothing, price))
    }

    fn empty_store() -> CartStore<MemoryStore> {
        CartStore::open(MemoryStore::new(), KEY)
    }

    fn ids(store: &CartStore<MemoryStore>) -> Vec<&str> {
        store.lines().iter().map(|l| l.id().as_str()).collect()
    }

    #[test]
    fn test_add_same_product_twice_merges() {
        let mut cart = empty_store();
        let p = item("p1", 10);

        assert_eq!(cart.add(p.clone()), AddOutcome::Appended);
        assert_eq!(cart.add(p), AddOutcome::Incremented);

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.line(&ProductId::new("p1")).unwrap().quantity(), 2);
    }

    #[test]
    fn test_add_opens_panel() {
        let mut cart = empty_store();
        assert!(!cart.is_panel_open());
        cart.add(item("p1", 10));
        assert!(cart.is_panel_open());
        cart.close_panel();
        assert!(!cart.is_panel_open());
    }

    #[test]
    fn test_quantity_floor() {
        let mut cart = empty_store();
        let p = item("p1", 10);
        cart.add(p.clone());
        cart.add(p.clone());
        cart.add(p);

        assert_eq!(cart.update_quantity(&ProductId::new("p1"), -100), Some(1));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.update_quantity(&ProductId::new("p1"), 4), Some(5));
        assert_eq!(cart.update_quantity(&ProductId::new("absent"), 1), None);
    }

    #[test]
    fn test_update_quantity_saturates() {
        let mut cart = empty_store();
        cart.add(item("p1", 10));
        assert_eq!(
            cart.update_quantity(&ProductId::new("p1"), i64::MAX),
            Some(u32::MAX)
        );
        assert_eq!(
            cart.update_quantity(&ProductId::new("p1"), i64::MIN),
            Some(1)
        );
    }

    #[test]
    fn test_totals() {
        let mut cart = empty_store();
        let p1 = item("p1", 10);
        let p2 = item("p2", 5);
        cart.add(p1.clone());
        cart.add(p1);
        cart.add(p2);
        cart.update_quantity(&ProductId::new("p2"), 2);

        assert_eq!(cart.total_price(), Price::from_units(35));
        assert_eq!(cart.total_count(), 5);
    }

    #[test]
    fn test_remove_is_exact() {
        let mut cart = empty_store();
        for id in ["a", "b", "c"] {
            cart.add(item(id, 1));
        }

        assert!(!cart.remove(&ProductId::new("zzz")));
        assert_eq!(ids(&cart), vec!["a", "b", "c"]);

        assert!(cart.remove(&ProductId::new("b")));
        assert_eq!(ids(&cart), vec!["a", "c"]);
    }

    #[test]
    fn test_persistence_round_trip() {
        let storage = MemoryStore::new();
        let mut cart = CartStore::open(storage.clone(), KEY);
        cart.add(item("a", 10));
        cart.add(item("b", 20));
        cart.add(item("c", 30));
        cart.update_quantity(&ProductId::new("b"), 2);

        let reloaded = CartStore::open(storage, KEY);
        assert_eq!(reloaded.lines(), cart.lines());
        assert_eq!(
            reloaded.lines().iter().map(CartLineItem::quantity).collect::<Vec<_>>(),
            vec![1, 3, 1]
        );
        assert!(!reloaded.is_panel_open());
    }

    #[test]
    fn test_corrupt_snapshot_yields_empty_cart() {
        for raw in ["{not json", r#"{"cart": 1}"#, r#"[{"id": 7}]"#] {
            let cart = CartStore::open(MemoryStore::with_entry(KEY, raw), KEY);
            assert!(cart.is_empty(), "snapshot {raw:?} should be ignored");
        }
    }

    #[test]
    fn test_clear_persists_empty_list() {
        let storage = MemoryStore::new();
        let mut cart = CartStore::open(storage.clone(), KEY);
        cart.add(item("a", 10));
        cart.clear();

        assert!(cart.is_empty());
        assert_eq!(storage.load(KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_subscribers_see_every_mutation() {
        let mut cart = empty_store();
        let mut rx = cart.subscribe();
        assert_eq!(rx.borrow().revision, 0);

        cart.add(item("a", 10));
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.revision, 1);
        assert_eq!(snapshot.total_count(), 1);

        cart.remove(&ProductId::new("missing"));
        assert!(!rx.has_changed().unwrap());

        cart.update_quantity(&ProductId::new("a"), 1);
        assert_eq!(rx.borrow_and_update().revision, 2);
        assert_eq!(rx.borrow().total_price(), Price::from_units(20));
    }
}
