//! REST endpoint paths exposed by the backend.
//!
//! Collection paths end with a slash; item paths are built from the
//! collection path and the item's primary key.

use std::fmt::Display;

/// Cart line items of the current user.
pub const CART_ITEMS: &str = "/cart/api/cart-items/";

/// Bulk-clear of the current user's cart.
pub const CART_CLEAR: &str = "/cart/api/cart/clear/";

/// Wishlist items of the current user.
pub const WISHLIST: &str = "/wishlist/api/wishlist/";

/// Orders of the current user (all orders for staff).
pub const ORDERS: &str = "/orders/api/orders/";

/// Products with nested variants and images.
pub const PRODUCTS: &str = "/products/api/detail-products/";

/// Catalog lookup lists.
pub const CATEGORIES: &str = "/products/api/categories/";
pub const BRANDS: &str = "/products/api/brands/";
pub const COLORS: &str = "/products/api/colors/";
pub const SIZES: &str = "/products/api/sizes/";

/// Profile of the authenticated user.
pub const CURRENT_USER: &str = "/auth/users/me/";

/// Path of one item within a collection.
#[must_use]
pub fn item(collection: &str, id: impl Display) -> String {
    format!("{collection}{id}/")
}

/// Path of one page of the order collection.
#[must_use]
pub fn orders_page(page: u32) -> String {
    format!("{ORDERS}?page={page}")
}

/// Path of the first product page, optionally narrowed to a target audience.
#[must_use]
pub fn products(target_audience: Option<&str>) -> String {
    match target_audience {
        Some(audience) if !audience.is_empty() => format!(
            "{PRODUCTS}?target_audience={}",
            url::form_urlencoded::byte_serialize(audience.as_bytes()).collect::<String>()
        ),
        _ => PRODUCTS.to_string(),
    }
}
