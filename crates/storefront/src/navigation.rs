//! View routing and scroll side effects.
//!
//! The [`NavigationController`] tracks the active [`View`] and the entity each
//! view has selected. It never owns business data.
//!
//! Scrolling to an in-page section on a view that is not mounted yet is a
//! two-step affair: navigate without scrolling, then scroll once the view
//! reports itself mounted via [`NavigationController::view_mounted`].
//! Consumers without a mount signal can fall back to
//! [`NavigationController::flush_pending_section`], which waits a fixed delay
//! first. That delay is a heuristic carried over for compatibility and has no
//! measured basis.

use std::time::Duration;

use luxe_core::{EntitySlot, ProductId, SectionId, View};
use tracing::debug;

/// Delay used by consumers that cannot signal a mounted view.
pub const LEGACY_MOUNT_DELAY: Duration = Duration::from_millis(100);

/// Default customer-service section.
pub const DEFAULT_CUSTOMER_SERVICE_SECTION: &str = "shipping";

/// Default legal section.
pub const DEFAULT_LEGAL_SECTION: &str = "privacy";

/// Scroll side effects performed by the page.
pub trait Viewport {
    /// Scroll the page to the top.
    fn scroll_to_top(&mut self);

    /// Scroll so the element with this anchor id is visible.
    fn scroll_to_anchor(&mut self, section: &SectionId);
}

/// Current navigation state. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    pub view: View,
    /// Last product shown on the product-detail view.
    pub product_id: Option<ProductId>,
    pub customer_service_section: SectionId,
    pub legal_section: SectionId,
    /// Set when the last navigation suppressed scroll-to-top.
    pub skip_scroll: bool,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            view: View::Home,
            product_id: None,
            customer_service_section: SectionId::new(DEFAULT_CUSTOMER_SERVICE_SECTION),
            legal_section: SectionId::new(DEFAULT_LEGAL_SECTION),
            skip_scroll: false,
        }
    }
}

/// The entity the active view has selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedEntity<'a> {
    Product(&'a ProductId),
    Section(&'a SectionId),
}

impl NavigationState {
    /// The selection relevant to the active view, if it uses one.
    #[must_use]
    pub fn selected_entity(&self) -> Option<SelectedEntity<'_>> {
        match self.view.entity_slot()? {
            EntitySlot::Product => self.product_id.as_ref().map(SelectedEntity::Product),
            EntitySlot::CustomerServiceSection => {
                Some(SelectedEntity::Section(&self.customer_service_section))
            }
            EntitySlot::LegalSection => Some(SelectedEntity::Section(&self.legal_section)),
        }
    }
}

/// How a section navigation was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionScroll {
    /// Already on the view; scrolled right away.
    Immediate,
    /// Switched views; the scroll waits for the view to mount.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingSection {
    view: View,
    section: SectionId,
}

/// Owner of [`NavigationState`].
pub struct NavigationController<V> {
    state: NavigationState,
    viewport: V,
    pending: Option<PendingSection>,
}

impl<V: Viewport> NavigationController<V> {
    /// Start on the home view.
    pub fn new(viewport: V) -> Self {
        Self {
            state: NavigationState::default(),
            viewport,
            pending: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &NavigationState {
        &self.state
    }

    #[must_use]
    pub const fn current_view(&self) -> View {
        self.state.view
    }

    #[must_use]
    pub const fn viewport(&self) -> &V {
        &self.viewport
    }

    /// Switch to `view`.
    ///
    /// `entity` is recorded only in the slot the target view uses; every other
    /// slot keeps its value. Scrolls to the top unless `skip_scroll` is set.
    pub fn navigate(&mut self, view: View, entity: Option<&str>, skip_scroll: bool) {
        if let Some(entity) = entity {
            match view.entity_slot() {
                Some(EntitySlot::Product) => self.state.product_id = Some(ProductId::new(entity)),
                Some(EntitySlot::CustomerServiceSection) => {
                    self.state.customer_service_section = SectionId::new(entity);
                }
                Some(EntitySlot::LegalSection) => {
                    self.state.legal_section = SectionId::new(entity);
                }
                None => debug!(view = %view, entity, "Ignoring entity for view without a slot"),
            }
        }

        if self.pending.as_ref().is_some_and(|p| p.view != view) {
            self.pending = None;
        }

        self.state.view = view;
        self.state.skip_scroll = skip_scroll;
        debug!(view = %view, skip_scroll, "Navigated");

        if !skip_scroll {
            self.viewport.scroll_to_top();
        }
    }

    /// Bring an in-page section of `view` into sight.
    pub fn navigate_to_section(&mut self, view: View, section: &str) -> SectionScroll {
        let section = SectionId::new(section);
        if self.state.view == view {
            self.viewport.scroll_to_anchor(&section);
            return SectionScroll::Immediate;
        }

        self.navigate(view, None, true);
        self.pending = Some(PendingSection { view, section });
        SectionScroll::Deferred
    }

    /// Section waiting for its view to mount, if any.
    #[must_use]
    pub fn pending_section(&self) -> Option<&SectionId> {
        self.pending.as_ref().map(|p| &p.section)
    }

    /// Signal that `view` has rendered; performs a deferred section scroll.
    ///
    /// Returns `true` if a scroll happened.
    pub fn view_mounted(&mut self, view: View) -> bool {
        if view != self.state.view {
            return false;
        }
        match self.pending.take_if(|p| p.view == view) {
            Some(pending) => {
                self.viewport.scroll_to_anchor(&pending.section);
                true
            }
            None => false,
        }
    }

    /// Wait `delay`, then perform any deferred section scroll.
    pub async fn flush_pending_section(&mut self, delay: Duration) -> bool {
        if self.pending.is_none() {
            return false;
        }
        tokio::time::sleep(delay).await;
        let view = self.state.view;
        self.view_mounted(view)
    }
}
