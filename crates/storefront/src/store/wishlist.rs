//! Wishlist store.

use pzafira_core::{NamedRef, Page, Price, ProductId, VariantId, WishlistItemId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use super::{Collection, KeyedLocks, StoreContext, StoreStatus};
use crate::api::{ApiError, decode, endpoints};
use crate::error::{Result, StoreError};
use crate::session::SessionListener;
use crate::snapshot::keys;

/// Variant details embedded in a wishlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistVariant {
    pub id: VariantId,
    #[serde(default)]
    pub product: Option<NamedRef>,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub color: Option<NamedRef>,
    #[serde(default)]
    pub size: Option<NamedRef>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: WishlistItemId,
    pub variant: WishlistVariant,
}

/// The signed-in user's wishlist.
///
/// Holds at most one entry per variant; mutations for the same variant are
/// serialized so a double toggle cannot insert twice.
#[derive(Debug)]
pub struct WishlistStore {
    ctx: StoreContext,
    items: Collection<WishlistItem>,
    locks: KeyedLocks<VariantId>,
}

impl WishlistStore {
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
        self.items.hydrate(&self.ctx, keys::WISHLIST)
    }

    #[must_use]
    pub fn items(&self) -> Vec<WishlistItem> {
        self.items.items()
    }

    #[must_use]
    pub fn status(&self) -> StoreStatus {
        self.items.status()
    }

    /// The entry holding `variant_id`, if any.
    #[must_use]
    pub fn find(&self, variant_id: VariantId) -> Option<WishlistItem> {
        self.items
            .read()
            .items
            .iter()
            .find(|item| item.variant.id == variant_id)
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, variant_id: VariantId) -> bool {
        self.find(variant_id).is_some()
    }

    /// Replace the wishlist with server truth.
    ///
    /// # Errors
    ///
    /// Returns the fetch error after publishing a warning and falling back
    /// to the snapshot.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<()> {
        let epoch = self.items.begin_sync(&self.ctx, keys::WISHLIST);

        let fetched = async {
            let page: Page<WishlistItem> = decode(self.ctx.gateway.get(endpoints::WISHLIST).await?)?;
            Ok::<_, ApiError>(page.results)
        }
        .await;

        match fetched {
            Ok(items) => {
                debug!(count = items.len(), "Wishlist fetched");
                self.items.finish_sync(&self.ctx, keys::WISHLIST, epoch, items);
                Ok(())
            }
            Err(e) => {
                self.items.fail_sync(&self.ctx, keys::WISHLIST, epoch);
                self.ctx.notifier.warning("Failed to load wishlist.");
                let err = StoreError::from(e);
                err.capture();
                Err(err)
            }
        }
    }

    /// Add a variant; an existing entry is returned instead of a duplicate.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self), fields(variant_id = %variant_id))]
    pub async fn add(&self, variant_id: VariantId) -> Result<WishlistItem> {
        let _guard = self.locks.lock(variant_id).await;
        self.add_locked(variant_id).await
    }

    /// Remove an entry by its own id.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the entry stays.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn remove(&self, id: WishlistItemId) -> Result<()> {
        let variant_id = self
            .items
            .read()
            .items
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.variant.id);
        let _guard = match variant_id {
            Some(variant_id) => Some(self.locks.lock(variant_id).await),
            None => None,
        };
        self.remove_locked(id).await
    }

    /// Flip membership of a variant.
    ///
    /// Returns whether the variant is wishlisted afterwards.
    ///
    /// # Errors
    ///
    /// Returns the backend error; membership is unchanged.
    #[instrument(skip(self), fields(variant_id = %variant_id))]
    pub async fn toggle(&self, variant_id: VariantId) -> Result<bool> {
        let _guard = self.locks.lock(variant_id).await;
        match self.find(variant_id) {
            Some(existing) => self.remove_locked(existing.id).await.map(|()| false),
            None => self.add_locked(variant_id).await.map(|_| true),
        }
    }

    /// Forget the wishlist locally.
    pub fn clear_local(&self) {
        self.items.clear_local(&self.ctx, keys::WISHLIST);
    }

    async fn add_locked(&self, variant_id: VariantId) -> Result<WishlistItem> {
        if let Some(existing) = self.find(variant_id) {
            debug!("Variant already wishlisted");
            return Ok(existing);
        }

        let epoch = self.items.epoch();
        let created = async {
            let body = json!({ "variant_id": variant_id });
            decode::<WishlistItem>(self.ctx.gateway.post(endpoints::WISHLIST, &body).await?)
        }
        .await;

        match created {
            Ok(created) => {
                self.items.update(&self.ctx, keys::WISHLIST, epoch, |items| {
                    items.retain(|item| item.variant.id != created.variant.id);
                    items.push(created.clone());
                });
                self.ctx.notifier.success("Added to wishlist");
                Ok(created)
            }
            Err(e) => {
                self.ctx.notifier.error("Something went wrong!");
                let err = StoreError::from(e);
                err.capture();
                Err(err)
            }
        }
    }

    async fn remove_locked(&self, id: WishlistItemId) -> Result<()> {
        let epoch = self.items.epoch();
        let path = endpoints::item(endpoints::WISHLIST, id);
        match self.ctx.gateway.delete(&path).await {
            Ok(()) | Err(ApiError::NotFound(_)) => {
                self.items.update(&self.ctx, keys::WISHLIST, epoch, |items| {
                    items.retain(|item| item.id != id);
                });
                self.ctx.notifier.success("Removed from wishlist");
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
}

impl SessionListener for WishlistStore {
    fn on_logout(&self) {
        self.clear_local();
    }
}
