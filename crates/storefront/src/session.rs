//! Per-shopper storefront session.
//!
//! [`StorefrontSession`] is the single writer for one shopper: it owns the
//! cart, navigation, wishlist, checkout dispatcher and try-on dialog, and
//! every user action goes through it.

use std::sync::Arc;

use luxe_core::{CurrencyCode, Product, ProductId, View};
use thiserror::Error;
use tracing::{info, instrument};
use url::Url;

use crate::cart::{AddOutcome, CartStorage, CartStore, SnapshotStore};
use crate::catalog::Catalog;
use crate::checkout::{
    CheckoutDispatcher, CheckoutError, CheckoutGateway, CheckoutOutcome, FallbackPacing,
    HttpCheckoutGateway, MessagingError, MessagingTarget, OrderMessage,
};
use crate::config::{ConfigError, StorefrontConfig};
use crate::navigation::{NavigationController, Viewport};
use crate::tryon::{Completion, ImageSynthesizer, TryOnDialog, TryOnError, TryOnSession};
use crate::wishlist::Wishlist;

/// Errors from session actions.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown product: {0}")]
    UnknownProduct(ProductId),

    #[error("no product selected")]
    NoProductSelected,

    #[error("cart is empty")]
    EmptyCart,

    #[error("store has no messaging account configured")]
    MessagingUnavailable,

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    TryOn(#[from] TryOnError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

/// Store identity used in customer-facing text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreProfile {
    pub name: String,
    pub currency: CurrencyCode,
    pub messaging: Option<MessagingTarget>,
}

impl Default for StoreProfile {
    fn default() -> Self {
        Self {
            name: "LUXE".to_string(),
            currency: CurrencyCode::USD,
            messaging: None,
        }
    }
}

/// One shopper's storefront state.
pub struct StorefrontSession<S, V, G> {
    catalog: Arc<Catalog>,
    cart: CartStore<S>,
    navigation: NavigationController<V>,
    checkout: CheckoutDispatcher<G>,
    wishlist: Wishlist,
    try_on: TryOnDialog,
    profile: StoreProfile,
}

impl<S, V, G> StorefrontSession<S, V, G>
where
    S: SnapshotStore,
    V: Viewport,
    G: CheckoutGateway,
{
    pub fn new(
        catalog: Arc<Catalog>,
        cart: CartStore<S>,
        navigation: NavigationController<V>,
        checkout: CheckoutDispatcher<G>,
        profile: StoreProfile,
    ) -> Self {
        Self {
            catalog,
            cart,
            navigation,
            checkout,
            wishlist: Wishlist::new(),
            try_on: TryOnDialog::new(),
            profile,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn cart(&self) -> &CartStore<S> {
        &self.cart
    }

    pub const fn cart_mut(&mut self) -> &mut CartStore<S> {
        &mut self.cart
    }

    #[must_use]
    pub const fn navigation(&self) -> &NavigationController<V> {
        &self.navigation
    }

    pub const fn navigation_mut(&mut self) -> &mut NavigationController<V> {
        &mut self.navigation
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &CheckoutDispatcher<G> {
        &self.checkout
    }

    #[must_use]
    pub const fn wishlist(&self) -> &Wishlist {
        &self.wishlist
    }

    #[must_use]
    pub const fn try_on(&self) -> &TryOnDialog {
        &self.try_on
    }

    pub const fn try_on_mut(&mut self) -> &mut TryOnDialog {
        &mut self.try_on
    }

    #[must_use]
    pub const fn profile(&self) -> &StoreProfile {
        &self.profile
    }

    fn product(&self, id: &ProductId) -> Result<Arc<Product>, SessionError> {
        self.catalog
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownProduct(id.clone()))
    }

    /// Add one unit of a catalog product; opens the cart panel.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownProduct` if the id is not in the catalog.
    pub fn add_to_cart(&mut self, id: &ProductId) -> Result<AddOutcome, SessionError> {
        let product = self.product(id)?;
        Ok(self.cart.add(product))
    }

    /// Show the detail view for a product.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownProduct` if the id is not in the catalog.
    pub fn open_product(&mut self, id: &ProductId) -> Result<(), SessionError> {
        self.product(id)?;
        self.navigation
            .navigate(View::ProductDetail, Some(id.as_str()), false);
        Ok(())
    }

    /// Product held in the detail slot, resolved against the catalog.
    #[must_use]
    pub fn selected_product(&self) -> Option<Arc<Product>> {
        let id = self.navigation.state().product_id.as_ref()?;
        self.catalog.get(id).cloned()
    }

    /// Start a hosted checkout for the cart.
    ///
    /// On fallback the session switches to the local checkout view and
    /// closes the cart panel. On redirect the caller leaves the storefront.
    #[instrument(skip(self))]
    pub async fn checkout(&mut self) -> CheckoutOutcome {
        let outcome = self
            .checkout
            .initiate_hosted_checkout(self.cart.lines())
            .await;
        if let CheckoutOutcome::Fallback { reason } = &outcome {
            info!(?reason, "Showing local checkout");
            self.cart.close_panel();
            self.navigation.navigate(View::Checkout, None, false);
        }
        outcome
    }

    /// Confirm an order on the local checkout screen; empties the cart.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyCart` if there is nothing to order.
    pub fn confirm_order(&mut self) -> Result<(), SessionError> {
        if self.cart.is_empty() {
            return Err(SessionError::EmptyCart);
        }
        info!(
            lines = self.cart.lines().len(),
            total = %self.cart.total_price().amount(),
            "Order confirmed"
        );
        self.cart.clear();
        self.cart.close_panel();
        Ok(())
    }

    /// Deep link handing the cart to the store operator.
    ///
    /// The cart is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart is empty or no messaging account is set.
    pub fn order_via_messenger(&self) -> Result<Url, SessionError> {
        if self.cart.is_empty() {
            return Err(SessionError::EmptyCart);
        }
        let target = self
            .profile
            .messaging
            .as_ref()
            .ok_or(SessionError::MessagingUnavailable)?;
        let message =
            OrderMessage::for_cart(&self.profile.name, self.cart.lines(), self.profile.currency);
        Ok(message.deep_link(target)?)
    }

    /// Deep link asking the store about one product.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is unknown or no messaging account is set.
    pub fn inquire_about(&self, id: &ProductId) -> Result<Url, SessionError> {
        let product = self.product(id)?;
        let target = self
            .profile
            .messaging
            .as_ref()
            .ok_or(SessionError::MessagingUnavailable)?;
        let message = OrderMessage::for_product_inquiry(&product, self.profile.currency);
        Ok(message.deep_link(target)?)
    }

    /// Heart or un-heart a product. Returns whether it is now wishlisted.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownProduct` if the id is not in the catalog.
    pub fn toggle_wishlist(&mut self, id: &ProductId) -> Result<bool, SessionError> {
        self.product(id)?;
        Ok(self.wishlist.toggle(id))
    }

    /// Open try-on for the selected product.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoProductSelected` without a selected product.
    pub fn open_try_on(&mut self) -> Result<&mut TryOnSession, SessionError> {
        let product = self
            .selected_product()
            .ok_or(SessionError::NoProductSelected)?;
        Ok(self.try_on.open(product))
    }

    pub fn close_try_on(&mut self) {
        self.try_on.close();
    }

    /// Run one synthesis attempt in the open try-on session.
    ///
    /// # Errors
    ///
    /// Returns an error if try-on is closed or the attempt cannot start.
    pub async fn run_try_on(
        &mut self,
        synthesizer: &impl ImageSynthesizer,
    ) -> Result<Completion, SessionError> {
        Ok(self.try_on.run(synthesizer).await?)
    }

    /// Add the tried-on product to the cart and close try-on.
    ///
    /// # Errors
    ///
    /// Returns an error if try-on is closed or shows no result.
    pub fn add_try_on_look_to_cart(&mut self) -> Result<AddOutcome, SessionError> {
        let session = self.try_on.session().ok_or(TryOnError::NotOpen)?;
        let outcome = session.add_look_to_cart(&mut self.cart)?;
        self.try_on.close();
        Ok(outcome)
    }
}

/// A session wired from [`StorefrontConfig`].
pub type ConfiguredSession<V> = StorefrontSession<CartStorage, V, HttpCheckoutGateway>;

impl<V: Viewport> ConfiguredSession<V> {
    /// Build a shopper session from configuration.
    ///
    /// The cart is rehydrated from the configured storage, checkout posts to
    /// the configured endpoint, and messages use the configured store profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the messaging number is invalid or the checkout
    /// client fails to build.
    pub fn from_config(
        config: &StorefrontConfig,
        catalog: Arc<Catalog>,
        viewport: V,
    ) -> Result<Self, SessionError> {
        let profile = config.store_profile()?;
        let gateway = HttpCheckoutGateway::from_config(config)?;
        let storage = CartStorage::from_config(&config.cart);
        Ok(Self::new(
            catalog,
            CartStore::open(storage, config.cart.storage_key.clone()),
            NavigationController::new(viewport),
            CheckoutDispatcher::new(gateway, FallbackPacing::default()),
            profile,
        ))
    }
}
