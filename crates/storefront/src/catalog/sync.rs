//! Two-way binding between local filter controls and the applied filters.
//!
//! The controller owns transient control state (selected category/brand and
//! the price slider pair). Two rules keep it from ping-ponging with its
//! owner:
//!
//! - [`FilterController::sync_from_applied`] adopts the owner's filters
//!   without emitting anything.
//! - Control changes return `Some(filters)` only when the normalized filter
//!   differs in content from the last value emitted or adopted.

use pzafira_core::{FilterState, Price, PriceRange};

use super::filter::normalize;

/// Local filter control state.
#[derive(Debug, Clone)]
pub struct FilterController {
    bounds: PriceRange,
    category: Option<String>,
    brand: Option<String>,
    min_price: Price,
    max_price: Price,
    last_emitted: FilterState,
}

impl FilterController {
    /// Controls initialized from the owner's applied filters.
    #[must_use]
    pub fn new(bounds: PriceRange, applied: &FilterState) -> Self {
        let mut controller = Self {
            bounds,
            category: None,
            brand: None,
            min_price: bounds.min,
            max_price: bounds.max,
            last_emitted: FilterState::default(),
        };
        controller.adopt(applied);
        controller
    }

    #[must_use]
    pub const fn bounds(&self) -> PriceRange {
        self.bounds
    }

    /// Current slider positions.
    #[must_use]
    pub const fn price_range(&self) -> PriceRange {
        PriceRange::new(self.min_price, self.max_price)
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    #[must_use]
    pub fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }

    /// The minimal filter object the controls currently describe.
    #[must_use]
    pub fn current(&self) -> FilterState {
        normalize(
            &FilterState {
                category: self.category.clone(),
                brand: self.brand.clone(),
                min_price: Some(self.min_price),
                max_price: Some(self.max_price),
            },
            self.bounds,
        )
    }

    /// Adopt the owner's filters when they differ in content from the last
    /// value emitted or adopted. Never emits.
    pub fn sync_from_applied(&mut self, applied: &FilterState) {
        if normalize(applied, self.bounds) == self.last_emitted {
            return;
        }
        self.adopt(applied);
    }

    /// New facet bounds (a different page was loaded); re-adopts `applied`.
    pub fn set_bounds(&mut self, bounds: PriceRange, applied: &FilterState) {
        self.bounds = bounds;
        self.adopt(applied);
    }

    fn adopt(&mut self, applied: &FilterState) {
        self.category = applied.category.clone().filter(|c| !c.is_empty());
        self.brand = applied.brand.clone().filter(|b| !b.is_empty());
        self.min_price = applied.min_price.unwrap_or(self.bounds.min);
        self.max_price = applied.max_price.unwrap_or(self.bounds.max);
        self.last_emitted = normalize(applied, self.bounds);
    }

    pub fn select_category(&mut self, category: Option<String>) -> Option<FilterState> {
        self.category = category.filter(|c| !c.is_empty());
        self.emit()
    }

    pub fn select_brand(&mut self, brand: Option<String>) -> Option<FilterState> {
        self.brand = brand.filter(|b| !b.is_empty());
        self.emit()
    }

    /// Move the lower slider; it never passes the upper one.
    pub fn set_min_price(&mut self, price: Price) -> Option<FilterState> {
        self.min_price = price.max(self.bounds.min).min(self.max_price);
        self.emit()
    }

    /// Move the upper slider; it never drops below the lower one.
    pub fn set_max_price(&mut self, price: Price) -> Option<FilterState> {
        self.max_price = price.min(self.bounds.max).max(self.min_price);
        self.emit()
    }

    /// Clear every control.
    pub fn reset(&mut self) -> Option<FilterState> {
        self.category = None;
        self.brand = None;
        self.min_price = self.bounds.min;
        self.max_price = self.bounds.max;
        self.emit()
    }

    fn emit(&mut self) -> Option<FilterState> {
        let current = self.current();
        if current == self.last_emitted {
            return None;
        }
        self.last_emitted = current.clone();
        Some(current)
    }
}
