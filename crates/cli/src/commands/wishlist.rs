//! Wishlist commands. All of them require a signed-in user.

use pzafira_core::{NamedRef, VariantId, WishlistItemId};
use pzafira_storefront::Storefront;
use pzafira_storefront::store::WishlistItem;

use super::{CommandError, emit, sign_in};

/// # Errors
///
/// Returns `CommandError::NotSignedIn` or the fetch error.
pub async fn list(storefront: &Storefront) -> Result<(), CommandError> {
    sign_in(storefront).await?;
    let items = storefront.wishlist().items();
    for item in &items {
        emit(&entry_row(item));
    }
    emit(&format!("{} item(s)", items.len()));
    Ok(())
}

/// # Errors
///
/// Returns the backend error.
pub async fn toggle(storefront: &Storefront, variant_id: VariantId) -> Result<(), CommandError> {
    sign_in(storefront).await?;
    let wishlisted = storefront.wishlist().toggle(variant_id).await?;
    tracing::debug!(%variant_id, wishlisted, "Wishlist toggled");
    Ok(())
}

/// # Errors
///
/// Returns the backend error.
pub async fn remove(storefront: &Storefront, id: WishlistItemId) -> Result<(), CommandError> {
    sign_in(storefront).await?;
    storefront.wishlist().remove(id).await?;
    Ok(())
}

fn entry_row(item: &WishlistItem) -> String {
    let label = |name: &Option<NamedRef>| name.as_ref().and_then(NamedRef::label).unwrap_or_default();
    format!(
        "{:>6}  variant {:<6}  {:<32}  {:<10}  {:<6}  {}",
        item.id.as_i64(),
        item.variant.id.as_i64(),
        label(&item.variant.product),
        label(&item.variant.color),
        label(&item.variant.size),
        item.variant
            .price
            .map_or_else(|| "-".to_string(), |price| price.to_string())
    )
}
