//! Page-local product filtering.
//!
//! Predicates are AND-combined and applied to the products already loaded;
//! filtering never triggers a request.

use pzafira_core::{FilterState, Price, PriceRange};

use super::Product;

/// Whether `product` passes every predicate in `filters` and the search text.
#[must_use]
pub fn matches(product: &Product, filters: &FilterState, search: &str) -> bool {
    if let Some(category) = &filters.category
        && product.category_label().as_deref() != Some(category.as_str())
    {
        return false;
    }

    if let Some(brand) = &filters.brand
        && product.brand_label().as_deref() != Some(brand.as_str())
    {
        return false;
    }

    if filters.has_price_bounds() {
        let min = filters.min_price.unwrap_or(Price::ZERO);
        let in_range = |price: &Price| {
            *price >= min && filters.max_price.is_none_or(|max| *price <= max)
        };
        if !product.filter_prices().iter().any(in_range) {
            return false;
        }
    }

    if !search.is_empty() {
        let needle = search.to_lowercase();
        let in_name = product.name.to_lowercase().contains(&needle);
        let in_description = product
            .description
            .as_deref()
            .is_some_and(|description| description.to_lowercase().contains(&needle));
        if !in_name && !in_description {
            return false;
        }
    }

    true
}

/// The subset of `products` visible under `filters` and `search`.
#[must_use]
pub fn apply_filters(products: &[Product], filters: &FilterState, search: &str) -> Vec<Product> {
    products
        .iter()
        .filter(|product| matches(product, filters, search))
        .cloned()
        .collect()
}

/// Drop price bounds equal to the facet bounds; they constrain nothing.
#[must_use]
pub fn normalize(filters: &FilterState, bounds: PriceRange) -> FilterState {
    FilterState {
        category: filters.category.clone().filter(|c| !c.is_empty()),
        brand: filters.brand.clone().filter(|b| !b.is_empty()),
        min_price: filters.min_price.filter(|min| *min != bounds.min),
        max_price: filters.max_price.filter(|max| *max != bounds.max),
    }
}
