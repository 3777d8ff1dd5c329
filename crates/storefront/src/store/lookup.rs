//! Read-only option lists (categories, brands, colors, sizes).
//!
//! These are catalog-wide rather than per-user, so they survive logout.

use pzafira_core::{LookupId, Page};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{Collection, StoreContext, StoreStatus};
use crate::api::{ApiError, decode, endpoints};
use crate::error::{Result, StoreError};
use crate::snapshot::keys;

/// Which option list a [`LookupStore`] mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Categories,
    Brands,
    Colors,
    Sizes,
}

impl LookupKind {
    pub const ALL: [Self; 4] = [Self::Categories, Self::Brands, Self::Colors, Self::Sizes];

    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Categories => endpoints::CATEGORIES,
            Self::Brands => endpoints::BRANDS,
            Self::Colors => endpoints::COLORS,
            Self::Sizes => endpoints::SIZES,
        }
    }

    #[must_use]
    pub const fn snapshot_key(self) -> &'static str {
        match self {
            Self::Categories => keys::CATEGORIES,
            Self::Brands => keys::BRANDS,
            Self::Colors => keys::COLORS,
            Self::Sizes => keys::SIZES,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Brands => "brands",
            Self::Colors => "colors",
            Self::Sizes => "sizes",
        }
    }
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One named option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupItem {
    pub id: LookupId,
    pub name: String,
}

/// Cached mirror of one option list.
#[derive(Debug)]
pub struct LookupStore {
    kind: LookupKind,
    ctx: StoreContext,
    items: Collection<LookupItem>,
}

impl LookupStore {
    #[must_use]
    pub fn new(ctx: StoreContext, kind: LookupKind) -> Self {
        Self {
            kind,
            ctx,
            items: Collection::new(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> LookupKind {
        self.kind
    }

    /// Show the persisted list before the first fetch.
    pub fn hydrate(&self) -> bool {
        self.items.hydrate(&self.ctx, self.kind.snapshot_key())
    }

    #[must_use]
    pub fn items(&self) -> Vec<LookupItem> {
        self.items.items()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.items
            .read()
            .items
            .iter()
            .map(|item| item.name.clone())
            .collect()
    }

    #[must_use]
    pub fn status(&self) -> StoreStatus {
        self.items.status()
    }

    /// Refresh the list from the backend.
    ///
    /// # Errors
    ///
    /// Returns the fetch error after publishing a warning; the cached list
    /// stays visible.
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn fetch(&self) -> Result<()> {
        let key = self.kind.snapshot_key();
        let epoch = self.items.begin_sync(&self.ctx, key);

        let fetched = async {
            let page: Page<LookupItem> = decode(self.ctx.gateway.get(self.kind.endpoint()).await?)?;
            Ok::<_, ApiError>(page.results)
        }
        .await;

        match fetched {
            Ok(items) => {
                debug!(count = items.len(), "Lookup list fetched");
                self.items.finish_sync(&self.ctx, key, epoch, items);
                Ok(())
            }
            Err(e) => {
                self.items.fail_sync(&self.ctx, key, epoch);
                self.ctx
                    .notifier
                    .warning(format!("Failed to fetch {}", self.kind));
                let err = StoreError::from(e);
                err.capture();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::notify::{Notice, drain};
    use crate::testing::{Harness, Verb, page};

    #[tokio::test]
    async fn test_fetch_and_persist() {
        let harness = Harness::new();
        harness.gateway.ok(
            Verb::Get,
            endpoints::BRANDS,
            page(json!([{"id": 1, "name": "Nike"}, {"id": 2, "name": "Adidas"}])),
        );
        let store = LookupStore::new(harness.context(), LookupKind::Brands);

        store.fetch().await.unwrap();

        assert_eq!(store.names(), vec!["Nike", "Adidas"]);
        assert!(harness.snapshots.contains("brands"));
    }

    #[tokio::test]
    async fn test_failure_keeps_cached_list() {
        let harness = Harness::new();
        let mut rx = harness.notifier.subscribe();
        crate::snapshot::save_json(harness.snapshots.as_ref(), "colors", &json!([{"id": 4, "name": "Red"}])).unwrap();
        harness.gateway.fail(Verb::Get, endpoints::COLORS, 500);
        let store = LookupStore::new(harness.context(), LookupKind::Colors);

        assert!(store.fetch().await.is_err());

        assert_eq!(store.names(), vec!["Red"]);
        assert_eq!(drain(&mut rx), vec![Notice::warning("Failed to fetch colors")]);
    }

    #[test]
    fn test_kinds_map_to_distinct_keys() {
        let keys: std::collections::HashSet<_> =
            LookupKind::ALL.iter().map(|kind| kind.snapshot_key()).collect();
        assert_eq!(keys.len(), 4);
        assert_eq!(LookupKind::Sizes.endpoint(), "/products/api/sizes/");
    }
}
