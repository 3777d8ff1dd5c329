//! Catalog browsing: product types, facets, page-local filtering and the
//! paged listing.

mod facets;
mod filter;
mod product;
mod shop;
mod sync;

pub use facets::{FALLBACK_PRICE_RANGE, Facets, compute_facets};
pub use filter::{apply_filters, matches, normalize};
pub use product::{Product, ProductImage, ProductVariant};
pub use shop::{CachedProducts, ShopView};
pub use sync::FilterController;
