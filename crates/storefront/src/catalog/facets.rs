//! Filter facets derived from the loaded products.

use pzafira_core::{Price, PriceRange};
use serde::Serialize;

use super::Product;

/// Price range offered when no loaded variant carries a price.
pub const FALLBACK_PRICE_RANGE: PriceRange = PriceRange::new(Price::ZERO, Price::whole(20_000));

/// Options a filter UI can offer for the loaded products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facets {
    /// Distinct category names in first-seen order.
    pub categories: Vec<String>,
    /// Distinct brand names in first-seen order.
    pub brands: Vec<String>,
    /// Lowest and highest variant price.
    pub price: PriceRange,
}

impl Facets {
    #[must_use]
    pub const fn min_price(&self) -> Price {
        self.price.min
    }

    #[must_use]
    pub const fn max_price(&self) -> Price {
        self.price.max
    }
}

/// Derive facets from a product collection.
///
/// Pure: the same products always yield the same facets.
#[must_use]
pub fn compute_facets(products: &[Product]) -> Facets {
    let mut categories: Vec<String> = Vec::new();
    let mut brands: Vec<String> = Vec::new();

    for product in products {
        if let Some(category) = product.category_label()
            && !categories.contains(&category)
        {
            categories.push(category);
        }
        if let Some(brand) = product.brand_label()
            && !brands.contains(&brand)
        {
            brands.push(brand);
        }
    }

    let mut prices = products
        .iter()
        .flat_map(|product| product.variants.iter().filter_map(|variant| variant.price));
    let price = prices.next().map_or(FALLBACK_PRICE_RANGE, |first| {
        let (min, max) = prices.fold((first, first), |(min, max), price| {
            (min.min(price), max.max(price))
        });
        PriceRange::new(min, max)
    });

    Facets {
        categories,
        brands,
        price,
    }
}
