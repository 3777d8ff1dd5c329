//! Catalog filter predicates.

use serde::{Deserialize, Serialize};

use super::price::Price;

/// Sparse set of catalog filter predicates.
///
/// Absent fields mean "no constraint". Price bounds equal to the observed
/// bounds of the loaded products are equivalent to absent; callers emitting
/// filters normalize them away so content equality stays meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    /// Required category name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Required brand name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// Inclusive lower price bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<Price>,
    /// Inclusive upper price bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Price>,
}

impl FilterState {
    /// Filter that constrains nothing.
    #[must_use]
    pub fn unconstrained() -> Self {
        Self::default()
    }

    /// Whether no predicate is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.brand.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
    }

    /// Whether either price bound is set.
    #[must_use]
    pub const fn has_price_bounds(&self) -> bool {
        self.min_price.is_some() || self.max_price.is_some()
    }

    /// Set the category predicate.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the brand predicate.
    #[must_use]
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    /// Set both price bounds.
    #[must_use]
    pub const fn with_price(mut self, min: Price, max: Price) -> Self {
        self.min_price = Some(min);
        self.max_price = Some(max);
        self
    }
}
