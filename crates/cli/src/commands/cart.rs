//! Cart commands. All of them require a signed-in user.

use pzafira_core::{CartItemId, NamedRef, ProductId, VariantId};
use pzafira_storefront::Storefront;
use pzafira_storefront::store::{CartItem, NewCartItem};

use super::{CommandError, emit, sign_in};

/// # Errors
///
/// Returns `CommandError::NotSignedIn` or the fetch error.
pub async fn list(storefront: &Storefront) -> Result<(), CommandError> {
    sign_in(storefront).await?;
    let cart = storefront.cart();
    for item in cart.items() {
        emit(&line_row(&item));
    }
    emit(&format!("{} item(s), subtotal {}", cart.item_count(), cart.subtotal()));
    Ok(())
}

/// Add `quantity` of a product variant. Without `--variant` the product's
/// first variant is used.
///
/// # Errors
///
/// Returns a selection error (missing variant, out of stock, bad quantity)
/// or the backend error.
pub async fn add(
    storefront: &Storefront,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: u32,
) -> Result<(), CommandError> {
    sign_in(storefront).await?;
    let product = storefront.shop().product(product_id).await?;
    let variant = match variant_id {
        Some(id) => product.variant(id),
        None => product.primary_variant(),
    };
    let item = NewCartItem::for_selection(&product, variant, quantity)?;
    let added = storefront.cart().add(item).await?;
    emit(&line_row(&added));
    Ok(())
}

/// # Errors
///
/// Returns the validation or backend error.
pub async fn set_quantity(
    storefront: &Storefront,
    id: CartItemId,
    quantity: u32,
) -> Result<(), CommandError> {
    sign_in(storefront).await?;
    storefront.cart().update_quantity(id, quantity).await?;
    Ok(())
}

/// # Errors
///
/// Returns the backend error.
pub async fn remove(storefront: &Storefront, id: CartItemId) -> Result<(), CommandError> {
    sign_in(storefront).await?;
    storefront.cart().remove(id).await?;
    Ok(())
}

/// # Errors
///
/// Returns the backend error.
pub async fn clear(storefront: &Storefront) -> Result<(), CommandError> {
    sign_in(storefront).await?;
    storefront.cart().clear_all().await?;
    Ok(())
}

fn line_row(item: &CartItem) -> String {
    let label = |name: &Option<NamedRef>| name.as_ref().and_then(NamedRef::label).unwrap_or_default();
    format!(
        "{:>6}  {:<32}  {:<10}  {:<6}  {:>3} x {}  = {}",
        item.id.as_i64(),
        label(&item.variant.product),
        label(&item.variant.color),
        label(&item.variant.size),
        item.quantity,
        item.variant.price,
        item.line_total()
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_line_row() {
        let item: CartItem = serde_json::from_str(
            r#"{"id": 14, "variant": {"product": "Runner", "color": {"name": "Red"}, "size": "42", "stock": 5, "price": "500"}, "quantity": 2}"#,
        )
        .unwrap();
        let row = line_row(&item);
        assert!(row.contains("Runner"));
        assert!(row.contains("Red"));
        assert!(row.ends_with("= ৳1000.00"));
    }
}
