//! Paged product listing with page-local filtering.
//!
//! One page of products is held at a time. Pages are cached in memory with
//! `moka` for the configured TTL, and the last non-empty page is persisted
//! as `cachedProducts` so the listing still shows something when the live
//! page comes back empty or the request fails.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use pzafira_core::{FilterState, Page, ProductId};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{Facets, FilterController, Product, apply_filters, compute_facets};
use crate::api::{ApiError, decode, endpoints};
use crate::error::{Result, StoreError};
use crate::session::SessionListener;
use crate::snapshot::keys;
use crate::store::StoreContext;

/// Maximum number of product pages kept in memory.
const PAGE_CACHE_CAPACITY: u64 = 64;

/// Persisted copy of the last non-empty product page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedProducts {
    /// Unix milliseconds of the load that produced `data`.
    pub timestamp: i64,
    pub data: Vec<Product>,
}

#[derive(Debug, Default)]
struct ShopState {
    target_audience: Option<String>,
    /// Absolute URL of the page to load; `None` means the first page.
    page_url: Option<String>,
    products: Vec<Product>,
    from_cache: bool,
    count: u64,
    next: Option<String>,
    previous: Option<String>,
    filters: FilterState,
    search: String,
}

/// The catalog listing.
pub struct ShopView {
    ctx: StoreContext,
    cache: Cache<String, Arc<Page<Product>>>,
    page_size: u32,
    generation: AtomicU64,
    state: RwLock<ShopState>,
}

impl std::fmt::Debug for ShopView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopView")
            .field("page_size", &self.page_size)
            .field("cached_pages", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl ShopView {
    #[must_use]
    pub fn new(ctx: StoreContext, page_size: u32, cache_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(PAGE_CACHE_CAPACITY)
            .time_to_live(cache_ttl)
            .build();

        Self {
            ctx,
            cache,
            page_size: page_size.max(1),
            generation: AtomicU64::new(0),
            state: RwLock::new(ShopState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ShopState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ShopState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Show the persisted products before the first load.
    pub fn hydrate(&self) -> bool {
        if !self.read().products.is_empty() {
            return false;
        }
        let Some(cached) = self.ctx.restore::<CachedProducts>(keys::PRODUCTS) else {
            return false;
        };
        let mut state = self.write();
        if !state.products.is_empty() || cached.data.is_empty() {
            return false;
        }
        state.products = cached.data;
        state.from_cache = true;
        true
    }

    /// Path or URL of the page [`load`](Self::load) requests.
    #[must_use]
    pub fn endpoint(&self) -> String {
        let state = self.read();
        state
            .page_url
            .clone()
            .unwrap_or_else(|| endpoints::products(state.target_audience.as_deref()))
    }

    /// Load the current page.
    ///
    /// An empty live page shows the persisted products instead. Only the
    /// most recently started load applies its result.
    ///
    /// # Errors
    ///
    /// Returns the fetch error after publishing a warning; the persisted
    /// products are shown if nothing was loaded yet.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let endpoint = self.endpoint();

        let fetched = match self.cache.get(&endpoint).await {
            Some(page) => {
                debug!("Cache hit for product page");
                Ok(page)
            }
            None => self.fetch_page(&endpoint).await,
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding superseded product page");
            return Ok(());
        }

        match fetched {
            Ok(page) => {
                let products = unique_by_id(page.results.clone());
                debug!(count = products.len(), total = page.count, "Product page loaded");

                if !products.is_empty() {
                    self.ctx.persist(
                        keys::PRODUCTS,
                        &CachedProducts {
                            timestamp: Utc::now().timestamp_millis(),
                            data: products.clone(),
                        },
                    );
                }

                let fallback = if products.is_empty() {
                    self.cached_products()
                } else {
                    None
                };

                let mut state = self.write();
                state.count = page.count;
                state.next.clone_from(&page.next);
                state.previous.clone_from(&page.previous);
                match fallback {
                    Some(cached) => {
                        state.products = cached;
                        state.from_cache = true;
                    }
                    None => {
                        state.products = products;
                        state.from_cache = false;
                    }
                }
                Ok(())
            }
            Err(e) => {
                let nothing_shown = self.read().products.is_empty();
                if nothing_shown && let Some(cached) = self.cached_products() {
                    let mut state = self.write();
                    state.products = cached;
                    state.from_cache = true;
                }
                self.ctx.notifier.warning("Failed to load products.");
                let err = StoreError::from(e);
                err.capture();
                Err(err)
            }
        }
    }

    async fn fetch_page(&self, endpoint: &str) -> std::result::Result<Arc<Page<Product>>, ApiError> {
        let page: Page<Product> = decode(self.ctx.gateway.get(endpoint).await?)?;
        let page = Arc::new(page);
        self.cache.insert(endpoint.to_string(), Arc::clone(&page)).await;
        Ok(page)
    }

    /// One product, from the loaded page when present, else from the backend.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; no notice is published.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: ProductId) -> Result<Product> {
        if let Some(product) = self.read().products.iter().find(|p| p.id == id).cloned() {
            return Ok(product);
        }
        let path = endpoints::item(endpoints::PRODUCTS, id);
        Ok(decode(self.ctx.gateway.get(&path).await?)?)
    }

    fn cached_products(&self) -> Option<Vec<Product>> {
        self.ctx
            .restore::<CachedProducts>(keys::PRODUCTS)
            .map(|cached| cached.data)
            .filter(|data| !data.is_empty())
    }

    /// Follow the `next` link. Returns `false` on the last page.
    ///
    /// # Errors
    ///
    /// Returns the load error.
    pub async fn next_page(&self) -> Result<bool> {
        let Some(next) = self.read().next.clone() else {
            return Ok(false);
        };
        self.write().page_url = Some(next);
        self.load().await.map(|()| true)
    }

    /// Follow the `previous` link. Returns `false` on the first page.
    ///
    /// # Errors
    ///
    /// Returns the load error.
    pub async fn previous_page(&self) -> Result<bool> {
        let Some(previous) = self.read().previous.clone() else {
            return Ok(false);
        };
        self.write().page_url = Some(previous);
        self.load().await.map(|()| true)
    }

    /// Narrow the listing to one audience, back on the first page with no
    /// filters applied.
    ///
    /// # Errors
    ///
    /// Returns the load error.
    pub async fn set_target_audience(&self, audience: Option<String>) -> Result<()> {
        {
            let mut state = self.write();
            state.target_audience = audience.filter(|a| !a.is_empty());
            state.page_url = None;
            state.filters = FilterState::default();
        }
        self.load().await
    }

    #[must_use]
    pub fn target_audience(&self) -> Option<String> {
        self.read().target_audience.clone()
    }

    /// Apply filters from a filter control. Content-equal filters are
    /// ignored; returns whether anything changed.
    pub fn set_filters(&self, filters: FilterState) -> bool {
        let mut state = self.write();
        if state.filters == filters {
            return false;
        }
        debug!(?filters, "Filters changed");
        state.filters = filters;
        true
    }

    #[must_use]
    pub fn filters(&self) -> FilterState {
        self.read().filters.clone()
    }

    pub fn set_search(&self, search: impl Into<String>) {
        self.write().search = search.into();
    }

    #[must_use]
    pub fn search(&self) -> String {
        self.read().search.clone()
    }

    /// Every product on the current page, unfiltered.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.read().products.clone()
    }

    /// Whether the products shown came from the persisted snapshot.
    #[must_use]
    pub fn is_from_cache(&self) -> bool {
        self.read().from_cache
    }

    #[must_use]
    pub fn facets(&self) -> Facets {
        compute_facets(&self.read().products)
    }

    /// Products on the current page passing the applied filters and search.
    #[must_use]
    pub fn visible(&self) -> Vec<Product> {
        let state = self.read();
        apply_filters(&state.products, &state.filters, &state.search)
    }

    /// A filter control bound to the current facets and applied filters.
    #[must_use]
    pub fn filter_controller(&self) -> FilterController {
        FilterController::new(self.facets().price, &self.read().filters)
    }

    /// Total products across all pages.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.read().count
    }

    #[must_use]
    pub fn page_count(&self) -> u64 {
        self.read().count.div_ceil(u64::from(self.page_size))
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.read().next.is_some()
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.read().previous.is_some()
    }

    /// Drop every loaded and cached product.
    pub fn clear_local(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.write();
            let target_audience = state.target_audience.take();
            *state = ShopState {
                target_audience,
                ..ShopState::default()
            };
        }
        self.cache.invalidate_all();
        self.ctx.forget(keys::PRODUCTS);
    }
}

impl SessionListener for ShopView {
    fn on_logout(&self) {
        self.clear_local();
    }
}

/// Keep the first product for every id.
fn unique_by_id(mut products: Vec<Product>) -> Vec<Product> {
    let mut seen = HashSet::new();
    products.retain(|product| seen.insert(product.id));
    products
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::notify::{Notice, drain};
    use crate::snapshot::{load_json, save_json};
    use crate::testing::{Harness, Verb, page};

    const NEXT: &str = "http://api.test/products/api/detail-products/?page=2";

    fn shop(harness: &Harness) -> ShopView {
        ShopView::new(harness.context(), 2, Duration::from_secs(300))
    }

    fn product(id: i64, name: &str, brand: &str, price: i64) -> Value {
        json!({"id": id, "name": name, "brand": brand, "category": "Shoes", "variants": [{"id": id * 10, "price": price}]})
    }

    fn names(products: &[Product]) -> Vec<String> {
        products.iter().map(|p| p.name.clone()).collect()
    }

    #[tokio::test]
    async fn test_load_deduplicates_and_persists() {
        let harness = Harness::new();
        harness.gateway.ok(
            Verb::Get,
            endpoints::PRODUCTS,
            json!({
                "results": [product(1, "Air", "Nike", 500), product(1, "Air", "Nike", 500), product(2, "Max", "Nike", 1500)],
                "count": 3,
                "next": NEXT,
                "previous": null
            }),
        );
        let shop = shop(&harness);

        shop.load().await.unwrap();

        assert_eq!(names(&shop.products()), vec!["Air", "Max"]);
        assert!(!shop.is_from_cache());
        assert_eq!(shop.page_count(), 2);
        assert!(shop.has_next());
        assert!(!shop.has_previous());

        let cached: CachedProducts = load_json(harness.snapshots.as_ref(), keys::PRODUCTS).unwrap().unwrap();
        assert_eq!(cached.data.len(), 2);
        assert!(cached.timestamp > 0);
    }

    #[tokio::test]
    async fn test_empty_page_shows_persisted_products() {
        let harness = Harness::new();
        save_json(
            harness.snapshots.as_ref(),
            keys::PRODUCTS,
            &json!({"timestamp": 1, "data": [product(7, "Stale", "Puma", 900)]}),
        )
        .unwrap();
        harness.gateway.ok(Verb::Get, endpoints::PRODUCTS, page(json!([])));
        let shop = shop(&harness);

        shop.load().await.unwrap();

        assert_eq!(names(&shop.products()), vec!["Stale"]);
        assert!(shop.is_from_cache());
    }

    #[tokio::test]
    async fn test_failure_warns_and_falls_back() {
        let harness = Harness::new();
        let mut rx = harness.notifier.subscribe();
        save_json(
            harness.snapshots.as_ref(),
            keys::PRODUCTS,
            &json!({"timestamp": 1, "data": [product(7, "Stale", "Puma", 900)]}),
        )
        .unwrap();
        harness.gateway.fail(Verb::Get, endpoints::PRODUCTS, 503);
        let shop = shop(&harness);

        assert!(shop.load().await.is_err());

        assert_eq!(names(&shop.products()), vec!["Stale"]);
        assert_eq!(drain(&mut rx), vec![Notice::warning("Failed to load products.")]);
    }

    #[tokio::test]
    async fn test_pages_are_served_from_memory_cache() {
        let harness = Harness::new();
        harness
            .gateway
            .ok(Verb::Get, endpoints::PRODUCTS, page(json!([product(1, "Air", "Nike", 500)])));
        let shop = shop(&harness);

        shop.load().await.unwrap();
        shop.load().await.unwrap();

        assert_eq!(harness.gateway.count(Verb::Get, endpoints::PRODUCTS), 1);
    }

    #[tokio::test]
    async fn test_next_and_previous_follow_links() {
        let harness = Harness::new();
        harness.gateway.ok(
            Verb::Get,
            endpoints::PRODUCTS,
            json!({"results": [product(1, "Air", "Nike", 500)], "count": 3, "next": NEXT, "previous": null}),
        );
        harness.gateway.ok(
            Verb::Get,
            NEXT,
            json!({"results": [product(3, "Gazelle", "Adidas", 800)], "count": 3, "next": null, "previous": endpoints::PRODUCTS}),
        );
        let shop = shop(&harness);
        shop.load().await.unwrap();

        assert!(shop.next_page().await.unwrap());
        assert_eq!(names(&shop.products()), vec!["Gazelle"]);
        assert!(!shop.next_page().await.unwrap());

        assert!(shop.previous_page().await.unwrap());
        assert_eq!(names(&shop.products()), vec!["Air"]);
    }

    #[tokio::test]
    async fn test_target_audience_resets_filters_and_page() {
        let harness = Harness::new();
        let women = endpoints::products(Some("women"));
        harness
            .gateway
            .ok(Verb::Get, &women, page(json!([product(5, "Flat", "Bata", 700)])));
        let shop = shop(&harness);
        shop.set_filters(FilterState::default().with_brand("Nike"));

        shop.set_target_audience(Some("women".to_string())).await.unwrap();

        assert_eq!(shop.filters(), FilterState::default());
        assert_eq!(shop.endpoint(), women);
        assert_eq!(names(&shop.products()), vec!["Flat"]);
    }

    #[tokio::test]
    async fn test_visible_applies_filters_and_search() {
        let harness = Harness::new();
        harness.gateway.ok(
            Verb::Get,
            endpoints::PRODUCTS,
            page(json!([
                product(1, "Air Zoom", "Nike", 500),
                product(2, "Air Max", "Nike", 1500),
                product(3, "Gazelle", "Adidas", 800)
            ])),
        );
        let shop = shop(&harness);
        shop.load().await.unwrap();

        assert!(shop.set_filters(FilterState::default().with_brand("Nike")));
        assert!(!shop.set_filters(FilterState::default().with_brand("Nike")));
        assert_eq!(names(&shop.visible()), vec!["Air Zoom", "Air Max"]);

        shop.set_search("max");
        assert_eq!(names(&shop.visible()), vec!["Air Max"]);
        assert_eq!(shop.facets().brands, vec!["Nike", "Adidas"]);
        assert_eq!(shop.filter_controller().brand(), Some("Nike"));
    }

    #[tokio::test]
    async fn test_logout_drops_products_and_snapshot() {
        let harness = Harness::new();
        harness
            .gateway
            .ok(Verb::Get, endpoints::PRODUCTS, page(json!([product(1, "Air", "Nike", 500)])));
        let shop = shop(&harness);
        shop.load().await.unwrap();

        shop.on_logout();

        assert!(shop.products().is_empty());
        assert!(!harness.snapshots.contains(keys::PRODUCTS));
        shop.load().await.unwrap();
        assert_eq!(harness.gateway.count(Verb::Get, endpoints::PRODUCTS), 2);
    }

    #[tokio::test]
    async fn test_product_prefers_loaded_page() {
        let harness = Harness::new();
        harness
            .gateway
            .ok(Verb::Get, endpoints::PRODUCTS, page(json!([product(1, "Air", "Nike", 500)])))
            .ok(Verb::Get, "/products/api/detail-products/9/", product(9, "Remote", "Puma", 900));
        let shop = shop(&harness);
        shop.load().await.unwrap();

        assert_eq!(shop.product(ProductId::new(1)).await.unwrap().name, "Air");
        assert_eq!(shop.product(ProductId::new(9)).await.unwrap().name, "Remote");
        assert_eq!(harness.gateway.calls().len(), 2);
        assert!(shop.product(ProductId::new(5)).await.is_err());
    }

    #[test]
    fn test_hydrate_from_snapshot() {
        let harness = Harness::new();
        save_json(
            harness.snapshots.as_ref(),
            keys::PRODUCTS,
            &json!({"timestamp": 1, "data": [product(7, "Stale", "Puma", 900)]}),
        )
        .unwrap();
        let shop = shop(&harness);

        assert!(shop.hydrate());
        assert!(!shop.hydrate());
        assert!(shop.is_from_cache());
    }

    #[tokio::test]
    async fn test_superseded_load_is_discarded() {
        let harness = Harness::new();
        let women = endpoints::products(Some("women"));
        harness
            .gateway
            .ok(Verb::Get, endpoints::PRODUCTS, page(json!([product(1, "Air", "Nike", 500)])))
            .delay(Verb::Get, endpoints::PRODUCTS, Duration::from_millis(100))
            .ok(Verb::Get, &women, page(json!([product(3, "Gazelle", "Adidas", 800)])));
        let shop = shop(&harness);

        let (first, second) = tokio::join!(shop.load(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shop.set_target_audience(Some("women".to_string())).await
        });
        first.unwrap();
        second.unwrap();

        assert_eq!(names(&shop.products()), vec!["Gazelle"]);
        let cached: CachedProducts = load_json(harness.snapshots.as_ref(), keys::PRODUCTS).unwrap().unwrap();
        assert_eq!(names(&cached.data), vec!["Gazelle"]);
    }
}
