//! Catalog product types as returned by `/products/api/detail-products/`.

use pzafira_core::{NamedRef, Price, ProductId, VariantId};
use serde::{Deserialize, Serialize};

/// A catalog product with its purchasable variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<NamedRef>,
    #[serde(default)]
    pub brand: Option<NamedRef>,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    /// Used only when the product has no variants.
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub target_audience: Option<String>,
}

/// One color/size combination of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    #[serde(default)]
    pub color: Option<NamedRef>,
    #[serde(default)]
    pub size: Option<NamedRef>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub price: Option<Price>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub image: String,
}

impl Product {
    /// Normalized category name.
    #[must_use]
    pub fn category_label(&self) -> Option<String> {
        self.category.as_ref().and_then(NamedRef::label)
    }

    /// Normalized brand name.
    #[must_use]
    pub fn brand_label(&self) -> Option<String> {
        self.brand.as_ref().and_then(NamedRef::label)
    }

    /// The variant a product card acts on (wishlist toggle).
    #[must_use]
    pub fn primary_variant(&self) -> Option<&ProductVariant> {
        self.variants.first()
    }

    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<&ProductVariant> {
        self.variants.iter().find(|variant| variant.id == id)
    }

    /// Prices the price filter compares against.
    ///
    /// Variant prices when the product has variants, otherwise the
    /// top-level price. Missing prices count as zero.
    #[must_use]
    pub fn filter_prices(&self) -> Vec<Price> {
        if self.variants.is_empty() {
            vec![self.price.unwrap_or(Price::ZERO)]
        } else {
            self.variants
                .iter()
                .map(|variant| variant.price.unwrap_or(Price::ZERO))
                .collect()
        }
    }

    /// Cheapest known price, for listings.
    #[must_use]
    pub fn display_price(&self) -> Option<Price> {
        self.variants
            .iter()
            .filter_map(|variant| variant.price)
            .min()
            .or(self.price)
    }

    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(|image| image.image.as_str())
    }
}
