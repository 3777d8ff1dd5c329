//! Shopping cart store.

use pzafira_core::{CartId, CartItemId, NamedRef, Page, Price, ProductId, VariantId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use super::{Collection, KeyedLocks, StoreContext, StoreStatus};
use crate::api::{ApiError, decode, endpoints};
use crate::catalog::{Product, ProductVariant};
use crate::error::{Result, StoreError};
use crate::session::SessionListener;
use crate::snapshot::keys;

/// Variant details embedded in a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartVariant {
    /// Product name (or reference) the variant belongs to.
    #[serde(default)]
    pub product: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub color: Option<NamedRef>,
    #[serde(default)]
    pub size: Option<NamedRef>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub price: Price,
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    #[serde(default)]
    pub cart: Option<CartId>,
    pub variant: CartVariant,
    #[serde(default)]
    pub variant_detail: Option<VariantId>,
    pub quantity: u32,
    #[serde(default)]
    pub image: Option<String>,
}

impl CartItem {
    /// Price × quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.variant.price.times(self.quantity)
    }
}

/// Payload for adding a variant to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCartItem {
    pub variant: CartVariant,
    pub variant_detail: VariantId,
    pub quantity: u32,
}

impl NewCartItem {
    /// Build the payload for the selected variant of `product`.
    ///
    /// # Errors
    ///
    /// - `StoreError::MissingVariant` if nothing is selected
    /// - `StoreError::OutOfStock` if the variant has no stock
    /// - `StoreError::InvalidQuantity` unless `1 <= quantity <= stock`
    pub fn for_selection(
        product: &Product,
        variant: Option<&ProductVariant>,
        quantity: u32,
    ) -> Result<Self> {
        let variant = variant.ok_or(StoreError::MissingVariant)?;
        let item = Self {
            variant: CartVariant {
                product: Some(NamedRef::Name(product.name.clone())),
                product_id: Some(product.id),
                color: variant.color.clone(),
                size: variant.size.clone(),
                stock: variant.stock,
                price: variant.price.unwrap_or(Price::ZERO),
            },
            variant_detail: variant.id,
            quantity,
        };
        item.validate()?;
        Ok(item)
    }

    /// Check the quantity against the stock captured in the payload.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::OutOfStock` or `StoreError::InvalidQuantity`.
    pub fn validate(&self) -> Result<()> {
        if self.variant.stock == 0 {
            return Err(StoreError::OutOfStock);
        }
        if self.quantity < 1 || self.quantity > self.variant.stock {
            return Err(StoreError::InvalidQuantity {
                requested: self.quantity,
                available: self.variant.stock,
            });
        }
        Ok(())
    }
}

/// The signed-in user's cart.
#[derive(Debug)]
pub struct CartStore {
    ctx: StoreContext,
    items: Collection<CartItem>,
    locks: KeyedLocks<CartItemId>,
}

impl CartStore {
    #[must_use]
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            items: Collection::new(),
            locks: KeyedLocks::new(),
        }
    }

    /// Show the persisted snapshot before the first fetch.
    pub fn hydrate(&self) -> bool {
        self.items.hydrate(&self.ctx, keys::CART)
    }

    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.items.items()
    }

    #[must_use]
    pub fn status(&self) -> StoreStatus {
        self.items.status()
    }

    #[must_use]
    pub fn get(&self, id: CartItemId) -> Option<CartItem> {
        self.items.read().items.iter().find(|item| item.id == id).cloned()
    }

    /// The backend cart the current lines belong to, taken from the first line.
    #[must_use]
    pub fn cart_id(&self) -> Option<CartId> {
        self.items.read().items.first().and_then(|item| item.cart)
    }

    /// Σ price × quantity.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.read().items.iter().map(CartItem::line_total).sum()
    }

    /// Σ quantity.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.read().items.iter().map(|item| item.quantity).sum()
    }

    /// Replace the cart with server truth.
    ///
    /// # Errors
    ///
    /// Returns the fetch error after publishing a warning and falling back
    /// to the snapshot.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<()> {
        let epoch = self.items.begin_sync(&self.ctx, keys::CART);

        let fetched = async {
            let page: Page<CartItem> = decode(self.ctx.gateway.get(endpoints::CART_ITEMS).await?)?;
            Ok::<_, ApiError>(page.results)
        }
        .await;

        match fetched {
            Ok(items) => {
                debug!(count = items.len(), "Cart fetched");
                self.items.finish_sync(&self.ctx, keys::CART, epoch, items);
                Ok(())
            }
            Err(e) => {
                self.items.fail_sync(&self.ctx, keys::CART, epoch);
                self.ctx.notifier.warning("Failed to fetch cart.");
                let err = StoreError::from(e);
                err.capture();
                Err(err)
            }
        }
    }

    /// Add a variant to the cart, then re-fetch the whole cart.
    ///
    /// # Errors
    ///
    /// Returns validation errors before any request is made, or the
    /// backend error. Either way an error notice has been published.
    #[instrument(skip(self, item), fields(variant_id = %item.variant_detail, quantity = item.quantity))]
    pub async fn add(&self, item: NewCartItem) -> Result<CartItem> {
        if let Err(e) = item.validate() {
            self.ctx.notifier.error(e.to_string());
            return Err(e);
        }

        let epoch = self.items.epoch();
        let created = async {
            let body = serde_json::to_value(&item).map_err(|e| ApiError::Parse(e.to_string()))?;
            decode::<CartItem>(self.ctx.gateway.post(endpoints::CART_ITEMS, &body).await?)
        }
        .await;

        match created {
            Ok(created) => {
                let applied = self.items.update(&self.ctx, keys::CART, epoch, |items| {
                    items.push(created.clone());
                });
                self.ctx
                    .notifier
                    .success(format!("{} item(s) added to cart!", item.quantity));
                // Server-computed fields only arrive with a full fetch.
                if applied && let Err(e) = self.fetch().await {
                    debug!(error = %e, "Cart re-fetch after add failed");
                }
                Ok(created)
            }
            Err(e) => {
                let err = StoreError::from(e);
                let message = if err.is_unauthorized() {
                    "Please login to add items to cart.".to_string()
                } else {
                    err.server_message()
                        .unwrap_or("Something went wrong.")
                        .to_string()
                };
                self.ctx.notifier.error(message);
                err.capture();
                Err(err)
            }
        }
    }

    /// Set the quantity of one line.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidQuantity` for a zero quantity or one above
    /// the known stock, or the backend error.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn update_quantity(&self, id: CartItemId, quantity: u32) -> Result<()> {
        let _guard = self.locks.lock(id).await;
        let epoch = self.items.epoch();

        let stock = self.get(id).map(|item| item.variant.stock);
        let over_stock = stock.is_some_and(|stock| stock > 0 && quantity > stock);
        if quantity == 0 || over_stock {
            let err = StoreError::InvalidQuantity {
                requested: quantity,
                available: stock.unwrap_or(0),
            };
            self.ctx.notifier.error(err.to_string());
            return Err(err);
        }

        let path = endpoints::item(endpoints::CART_ITEMS, id);
        match self.ctx.gateway.patch(&path, &json!({ "quantity": quantity })).await {
            Ok(_) => {
                self.items.update(&self.ctx, keys::CART, epoch, |items| {
                    if let Some(item) = items.iter_mut().find(|item| item.id == id) {
                        item.quantity = quantity;
                    }
                });
                self.ctx.notifier.success("Quantity updated!");
                Ok(())
            }
            Err(e) => {
                self.ctx.notifier.error("Failed to update quantity.");
                let err = StoreError::from(e);
                err.capture();
                Err(err)
            }
        }
    }

    /// Remove one line.
    ///
    /// A line the backend no longer knows is dropped locally as well.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the line stays in the cart.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn remove(&self, id: CartItemId) -> Result<()> {
        let _guard = self.locks.lock(id).await;
        let epoch = self.items.epoch();

        let path = endpoints::item(endpoints::CART_ITEMS, id);
        match self.ctx.gateway.delete(&path).await {
            Ok(()) | Err(ApiError::NotFound(_)) => {
                self.items.update(&self.ctx, keys::CART, epoch, |items| {
                    items.retain(|item| item.id != id);
                });
                self.ctx.notifier.success("Item removed from cart.");
                Ok(())
            }
            Err(e) => {
                self.ctx.notifier.error("Failed to remove item.");
                let err = StoreError::from(e);
                err.capture();
                Err(err)
            }
        }
    }

    /// Empty the cart on the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the cart is left unchanged.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<()> {
        let epoch = self.items.epoch();
        match self.ctx.gateway.delete(endpoints::CART_CLEAR).await {
            Ok(()) => {
                self.items.update(&self.ctx, keys::CART, epoch, Vec::clear);
                self.ctx.notifier.success("Cart cleared.");
                Ok(())
            }
            Err(e) => {
                self.ctx.notifier.error("Failed to clear cart.");
                let err = StoreError::from(e);
                err.capture();
                Err(err)
            }
        }
    }

    /// Forget the cart locally.
    pub fn clear_local(&self) {
        self.items.clear_local(&self.ctx, keys::CART);
    }
}

impl SessionListener for CartStore {
    fn on_logout(&self) {
        self.clear_local();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::notify::{Notice, NoticeLevel, drain};
    use crate::testing::{Harness, Verb, page};

    fn line(id: i64, quantity: u32, price: i64, stock: u32) -> Value {
        json!({
            "id": id,
            "cart": 5,
            "variant": {"product": "Runner", "color": "Red", "size": "42", "stock": stock, "price": price.to_string()},
            "variant_detail": 90 + id,
            "quantity": quantity,
        })
    }

    async fn loaded(harness: &Harness, lines: Value) -> CartStore {
        harness.gateway.ok(Verb::Get, endpoints::CART_ITEMS, page(lines));
        let store = CartStore::new(harness.context());
        store.fetch().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_fetch_replaces_items_and_persists() {
        let harness = Harness::new();
        let store = loaded(&harness, json!([line(1, 2, 100, 5), line(2, 1, 250, 5)])).await;

        assert_eq!(store.status(), StoreStatus::Ready);
        assert_eq!(store.items().len(), 2);
        assert_eq!(store.cart_id(), Some(CartId::new(5)));
        assert_eq!(store.subtotal(), Price::from_units(450));
        assert_eq!(store.item_count(), 3);
        assert!(harness.snapshots.contains(keys::CART));
    }

    #[tokio::test]
    async fn test_cart_id_absent_when_empty() {
        let harness = Harness::new();
        let store = loaded(&harness, json!([])).await;
        assert_eq!(store.cart_id(), None);
    }

    #[tokio::test]
    async fn test_update_then_remove_single_line() {
        let harness = Harness::new();
        let mut rx = harness.notifier.subscribe();
        let store = loaded(&harness, json!([line(1, 2, 100, 10), line(2, 4, 50, 10)])).await;
        let other_before = store.get(CartItemId::new(2)).unwrap();

        harness.gateway.ok(Verb::Patch, "/cart/api/cart-items/1/", json!({"id": 1, "quantity": 3}));
        store.update_quantity(CartItemId::new(1), 3).await.unwrap();

        assert_eq!(store.get(CartItemId::new(1)).unwrap().quantity, 3);
        assert_eq!(store.get(CartItemId::new(2)).unwrap(), other_before);

        harness.gateway.ok(Verb::Delete, "/cart/api/cart-items/1/", Value::Null);
        store.remove(CartItemId::new(1)).await.unwrap();

        assert!(store.get(CartItemId::new(1)).is_none());
        assert_eq!(store.items().len(), 1);
        assert_eq!(
            drain(&mut rx),
            vec![
                Notice::success("Quantity updated!"),
                Notice::success("Item removed from cart.")
            ]
        );
    }

    #[tokio::test]
    async fn test_single_line_scenario() {
        let harness = Harness::new();
        let store = loaded(&harness, json!([line(1, 2, 100, 10)])).await;

        harness.gateway.ok(Verb::Patch, "/cart/api/cart-items/1/", json!({}));
        store.update_quantity(CartItemId::new(1), 3).await.unwrap();
        assert_eq!(store.items()[0].quantity, 3);

        harness.gateway.ok(Verb::Delete, "/cart/api/cart-items/1/", Value::Null);
        store.remove(CartItemId::new(1)).await.unwrap();
        assert!(store.items().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_zero_and_over_stock_without_request() {
        let harness = Harness::new();
        let store = loaded(&harness, json!([line(1, 2, 100, 4)])).await;

        assert!(matches!(
            store.update_quantity(CartItemId::new(1), 0).await,
            Err(StoreError::InvalidQuantity { requested: 0, .. })
        ));
        assert!(matches!(
            store.update_quantity(CartItemId::new(1), 5).await,
            Err(StoreError::InvalidQuantity { requested: 5, available: 4 })
        ));
        assert_eq!(harness.gateway.count(Verb::Patch, "/cart/api/cart-items/1/"), 0);
        assert_eq!(store.items()[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_state() {
        let harness = Harness::new();
        let mut rx = harness.notifier.subscribe();
        let store = loaded(&harness, json!([line(1, 2, 100, 10)])).await;

        harness.gateway.fail(Verb::Patch, "/cart/api/cart-items/1/", 400);
        assert!(store.update_quantity(CartItemId::new(1), 3).await.is_err());
        assert_eq!(store.items()[0].quantity, 2);
        assert_eq!(drain(&mut rx), vec![Notice::error("Failed to update quantity.")]);
    }

    #[tokio::test]
    async fn test_remove_treats_missing_line_as_removed() {
        let harness = Harness::new();
        let store = loaded(&harness, json!([line(1, 2, 100, 10)])).await;

        // Unscripted DELETE answers 404.
        store.remove(CartItemId::new(1)).await.unwrap();
        assert!(store.items().is_empty());
    }

    #[tokio::test]
    async fn test_add_posts_payload_then_refetches() {
        let harness = Harness::new();
        let mut rx = harness.notifier.subscribe();
        let store = loaded(&harness, json!([])).await;

        harness
            .gateway
            .ok(Verb::Post, endpoints::CART_ITEMS, line(7, 2, 1500, 3))
            .ok(Verb::Get, endpoints::CART_ITEMS, page(json!([line(7, 2, 1500, 3)])));

        let product: Product = serde_json::from_value(json!({
            "id": 3,
            "name": "Runner",
            "variants": [{"id": 97, "color": "Red", "size": "42", "stock": 3, "price": "1500"}]
        }))
        .unwrap();
        let item = NewCartItem::for_selection(&product, product.variant(VariantId::new(97)), 2).unwrap();
        let created = store.add(item).await.unwrap();

        assert_eq!(created.id, CartItemId::new(7));
        assert_eq!(store.items().len(), 1);
        assert_eq!(harness.gateway.count(Verb::Get, endpoints::CART_ITEMS), 2);

        let post = harness
            .gateway
            .calls()
            .into_iter()
            .find(|call| call.verb == Verb::Post)
            .unwrap();
        let body = post.body.unwrap();
        assert_eq!(body["variant_detail"], 97);
        assert_eq!(body["quantity"], 2);
        assert_eq!(body["variant"]["product"], "Runner");
        assert_eq!(body["variant"]["stock"], 3);

        let notices = drain(&mut rx);
        assert!(notices.contains(&Notice::success("2 item(s) added to cart!")));
    }

    #[tokio::test]
    async fn test_add_unauthorized_message() {
        let harness = Harness::new();
        let mut rx = harness.notifier.subscribe();
        let store = CartStore::new(harness.context());
        harness.gateway.fail(Verb::Post, endpoints::CART_ITEMS, 401);

        let product: Product = serde_json::from_value(json!({
            "id": 3, "name": "Runner", "variants": [{"id": 97, "stock": 3, "price": 10}]
        }))
        .unwrap();
        let item = NewCartItem::for_selection(&product, product.primary_variant(), 1).unwrap();

        assert!(store.add(item).await.unwrap_err().is_unauthorized());
        assert_eq!(drain(&mut rx), vec![Notice::error("Please login to add items to cart.")]);
        assert!(store.items().is_empty());
    }

    #[tokio::test]
    async fn test_add_forbidden_is_not_a_login_prompt() {
        let harness = Harness::new();
        let mut rx = harness.notifier.subscribe();
        let store = CartStore::new(harness.context());
        harness.gateway.on(
            Verb::Post,
            endpoints::CART_ITEMS,
            crate::testing::Reply::Status(403, "You do not have permission to perform this action."),
        );

        let product: Product = serde_json::from_value(json!({
            "id": 3, "name": "Runner", "variants": [{"id": 97, "stock": 3, "price": 10}]
        }))
        .unwrap();
        let item = NewCartItem::for_selection(&product, product.primary_variant(), 1).unwrap();

        let err = store.add(item).await.unwrap_err();
        assert!(!err.is_unauthorized());
        assert_eq!(
            drain(&mut rx),
            vec![Notice::error("You do not have permission to perform this action.")]
        );
    }

    #[tokio::test]
    async fn test_add_surfaces_server_message() {
        let harness = Harness::new();
        let mut rx = harness.notifier.subscribe();
        let store = CartStore::new(harness.context());
        harness
            .gateway
            .on(Verb::Post, endpoints::CART_ITEMS, crate::testing::Reply::Status(400, "Not enough stock."));

        let item = NewCartItem {
            variant: CartVariant {
                product: None,
                product_id: None,
                color: None,
                size: None,
                stock: 2,
                price: Price::from_units(10),
            },
            variant_detail: VariantId::new(1),
            quantity: 1,
        };
        assert!(store.add(item).await.is_err());
        assert_eq!(drain(&mut rx), vec![Notice::error("Not enough stock.")]);
    }

    #[test]
    fn test_selection_validation() {
        let product: Product = serde_json::from_value(json!({
            "id": 3,
            "name": "Runner",
            "variants": [{"id": 1, "stock": 0, "price": 10}, {"id": 2, "stock": 2, "price": 10}]
        }))
        .unwrap();

        assert!(matches!(
            NewCartItem::for_selection(&product, None, 1),
            Err(StoreError::MissingVariant)
        ));
        assert!(matches!(
            NewCartItem::for_selection(&product, product.variant(VariantId::new(1)), 1),
            Err(StoreError::OutOfStock)
        ));
        assert!(matches!(
            NewCartItem::for_selection(&product, product.variant(VariantId::new(2)), 3),
            Err(StoreError::InvalidQuantity { requested: 3, available: 2 })
        ));
        assert!(NewCartItem::for_selection(&product, product.variant(VariantId::new(2)), 2).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_failure_warns_and_keeps_snapshot() {
        let harness = Harness::new();
        let mut rx = harness.notifier.subscribe();
        crate::snapshot::save_json(harness.snapshots.as_ref(), keys::CART, &json!([line(1, 1, 100, 3)])).unwrap();
        harness.gateway.fail(Verb::Get, endpoints::CART_ITEMS, 503);

        let store = CartStore::new(harness.context());
        assert!(store.fetch().await.is_err());

        assert_eq!(store.status(), StoreStatus::Ready);
        assert_eq!(store.items().len(), 1);
        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
    }

    #[tokio::test]
    async fn test_logout_clears_memory_and_snapshot() {
        let harness = Harness::new();
        let store = loaded(&harness, json!([line(1, 1, 100, 3)])).await;

        store.on_logout();

        assert!(store.items().is_empty());
        assert!(!harness.snapshots.contains(keys::CART));
    }

    #[tokio::test]
    async fn test_mutations_on_one_line_run_in_order() {
        let harness = Harness::new();
        let store = loaded(&harness, json!([line(1, 2, 100, 10)])).await;
        let path = "/cart/api/cart-items/1/";
        harness
            .gateway
            .ok(Verb::Patch, path, json!({}))
            .ok(Verb::Delete, path, Value::Null)
            .delay(Verb::Patch, path, Duration::from_millis(50))
            .delay(Verb::Delete, path, Duration::from_millis(50));

        let (updated, removed) = tokio::join!(
            store.update_quantity(CartItemId::new(1), 3),
            store.remove(CartItemId::new(1))
        );
        updated.unwrap();
        removed.unwrap();

        let verbs: Vec<Verb> = harness
            .gateway
            .calls()
            .into_iter()
            .filter(|call| call.path == path)
            .map(|call| call.verb)
            .collect();
        assert_eq!(verbs, vec![Verb::Patch, Verb::Delete]);
        assert_eq!(harness.gateway.peak_in_flight(), 1);
        assert!(store.items().is_empty());
    }

    #[tokio::test]
    async fn test_last_queued_quantity_wins() {
        let harness = Harness::new();
        let store = loaded(&harness, json!([line(1, 2, 100, 10)])).await;
        let path = "/cart/api/cart-items/1/";
        harness
            .gateway
            .ok(Verb::Patch, path, json!({}))
            .delay(Verb::Patch, path, Duration::from_millis(50));

        let (first, second) = tokio::join!(
            store.update_quantity(CartItemId::new(1), 3),
            store.update_quantity(CartItemId::new(1), 4)
        );
        first.unwrap();
        second.unwrap();

        let quantities: Vec<Value> = harness
            .gateway
            .calls()
            .into_iter()
            .filter(|call| call.verb == Verb::Patch)
            .map(|call| call.body.unwrap()["quantity"].clone())
            .collect();
        assert_eq!(quantities, vec![json!(3), json!(4)]);
        assert_eq!(harness.gateway.peak_in_flight(), 1);
        assert_eq!(store.get(CartItemId::new(1)).unwrap().quantity, 4);
    }

    #[tokio::test]
    async fn test_distinct_lines_update_concurrently() {
        let harness = Harness::new();
        let store = loaded(&harness, json!([line(1, 2, 100, 10), line(2, 1, 50, 10)])).await;
        for path in ["/cart/api/cart-items/1/", "/cart/api/cart-items/2/"] {
            harness
                .gateway
                .ok(Verb::Patch, path, json!({}))
                .delay(Verb::Patch, path, Duration::from_millis(50));
        }

        let (first, second) = tokio::join!(
            store.update_quantity(CartItemId::new(1), 5),
            store.update_quantity(CartItemId::new(2), 6)
        );
        first.unwrap();
        second.unwrap();

        assert_eq!(harness.gateway.peak_in_flight(), 2);
        assert_eq!(store.item_count(), 11);
    }

    #[tokio::test]
    async fn test_fetch_landing_after_logout_is_dropped() {
        let harness = Harness::new();
        let store = loaded(&harness, json!([line(1, 2, 100, 5)])).await;
        harness
            .gateway
            .delay(Verb::Get, endpoints::CART_ITEMS, Duration::from_millis(100));

        let (fetched, ()) = tokio::join!(store.fetch(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            store.on_logout();
        });

        fetched.unwrap();
        assert!(store.items().is_empty());
        assert!(!harness.snapshots.contains(keys::CART));
    }

    #[tokio::test]
    async fn test_mutation_landing_after_logout_is_dropped() {
        let harness = Harness::new();
        let store = loaded(&harness, json!([line(1, 2, 100, 10)])).await;
        let path = "/cart/api/cart-items/1/";
        harness
            .gateway
            .ok(Verb::Patch, path, json!({}))
            .delay(Verb::Patch, path, Duration::from_millis(100));

        let (updated, ()) = tokio::join!(store.update_quantity(CartItemId::new(1), 3), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            store.on_logout();
        });

        updated.unwrap();
        assert!(store.items().is_empty());
        assert!(!harness.snapshots.contains(keys::CART));
    }

    #[tokio::test]
    async fn test_add_landing_after_logout_skips_refetch() {
        let harness = Harness::new();
        let store = loaded(&harness, json!([])).await;
        harness
            .gateway
            .ok(Verb::Post, endpoints::CART_ITEMS, line(7, 1, 1500, 3))
            .delay(Verb::Post, endpoints::CART_ITEMS, Duration::from_millis(100));

        let product: Product = serde_json::from_value(json!({
            "id": 3, "name": "Runner", "variants": [{"id": 97, "stock": 3, "price": 1500}]
        }))
        .unwrap();
        let item = NewCartItem::for_selection(&product, product.primary_variant(), 1).unwrap();

        let (added, ()) = tokio::join!(store.add(item), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            store.on_logout();
        });

        added.unwrap();
        assert!(store.items().is_empty());
        assert!(!harness.snapshots.contains(keys::CART));
        assert_eq!(harness.gateway.count(Verb::Get, endpoints::CART_ITEMS), 1);
    }
}
