//! The assembled client: one gateway, one snapshot store, one session and
//! every store wired to them.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tracing::{info, instrument, warn};

use crate::api::{ApiClient, Gateway, decode, endpoints};
use crate::catalog::ShopView;
use crate::config::StorefrontConfig;
use crate::error::{Result, StoreError};
use crate::notify::Notifier;
use crate::session::{CurrentUser, Session};
use crate::snapshot::{RedbSnapshots, SnapshotStore};
use crate::store::{CartStore, LookupKind, LookupStore, OrdersStore, StoreContext, WishlistStore};

/// Shared storefront client.
///
/// Cheaply cloneable via `Arc`; clones share every store.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    api: Option<ApiClient>,
    gateway: Arc<dyn Gateway>,
    notifier: Notifier,
    session: Session,
    cart: Arc<CartStore>,
    wishlist: Arc<WishlistStore>,
    orders: Arc<OrdersStore>,
    shop: Arc<ShopView>,
    /// In `LookupKind::ALL` order.
    lookups: [LookupStore; 4],
}

impl Storefront {
    /// Open the snapshot database and build the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot database cannot be opened or the
    /// HTTP client cannot be built.
    pub fn new(config: &StorefrontConfig) -> Result<Self> {
        let api = ApiClient::new(&config.api)?;
        let snapshots = RedbSnapshots::open(&config.state_path)?;
        info!(
            base_url = %api.base_url(),
            state_path = %config.state_path.display(),
            "Storefront client ready"
        );
        Ok(Self::with_api(
            api,
            Arc::new(snapshots),
            config.page_size,
            config.cache_ttl,
        ))
    }

    /// Build over an existing HTTP client. The client's token is cleared on
    /// logout.
    #[must_use]
    pub fn with_api(
        api: ApiClient,
        snapshots: Arc<dyn SnapshotStore>,
        page_size: u32,
        cache_ttl: Duration,
    ) -> Self {
        let gateway: Arc<dyn Gateway> = Arc::new(api.clone());
        Self::assemble(Some(api), gateway, snapshots, page_size, cache_ttl)
    }

    /// Build over any gateway. Tokens are the gateway's own concern.
    #[must_use]
    pub fn from_parts(
        gateway: Arc<dyn Gateway>,
        snapshots: Arc<dyn SnapshotStore>,
        page_size: u32,
        cache_ttl: Duration,
    ) -> Self {
        Self::assemble(None, gateway, snapshots, page_size, cache_ttl)
    }

    fn assemble(
        api: Option<ApiClient>,
        gateway: Arc<dyn Gateway>,
        snapshots: Arc<dyn SnapshotStore>,
        page_size: u32,
        cache_ttl: Duration,
    ) -> Self {
        let notifier = Notifier::default();
        let ctx = StoreContext::new(Arc::clone(&gateway), snapshots, notifier.clone());

        let cart = Arc::new(CartStore::new(ctx.clone()));
        let wishlist = Arc::new(WishlistStore::new(ctx.clone()));
        let orders = Arc::new(OrdersStore::new(ctx.clone()));
        let shop = Arc::new(ShopView::new(ctx.clone(), page_size, cache_ttl));
        let lookups = LookupKind::ALL.map(|kind| LookupStore::new(ctx.clone(), kind));

        // Token first so nothing a later listener does is authenticated.
        let session = Session::new();
        if let Some(api) = &api {
            session.register(Arc::new(api.clone()));
        }
        session.register(Arc::clone(&cart) as _);
        session.register(Arc::clone(&wishlist) as _);
        session.register(Arc::clone(&orders) as _);
        session.register(Arc::clone(&shop) as _);

        Self {
            inner: Arc::new(StorefrontInner {
                api,
                gateway,
                notifier,
                session,
                cart,
                wishlist,
                orders,
                shop,
                lookups,
            }),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &WishlistStore {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn orders(&self) -> &OrdersStore {
        &self.inner.orders
    }

    #[must_use]
    pub fn shop(&self) -> &ShopView {
        &self.inner.shop
    }

    #[must_use]
    pub fn lookup(&self, kind: LookupKind) -> &LookupStore {
        let [categories, brands, colors, sizes] = &self.inner.lookups;
        match kind {
            LookupKind::Categories => categories,
            LookupKind::Brands => brands,
            LookupKind::Colors => colors,
            LookupKind::Sizes => sizes,
        }
    }

    /// The HTTP client, when built over one.
    #[must_use]
    pub fn api(&self) -> Option<&ApiClient> {
        self.inner.api.as_ref()
    }

    /// Show persisted state in every store before the network answers.
    pub fn hydrate_all(&self) {
        self.inner.cart.hydrate();
        self.inner.wishlist.hydrate();
        self.inner.orders.hydrate();
        self.inner.shop.hydrate();
        for lookup in &self.inner.lookups {
            lookup.hydrate();
        }
    }

    /// Attach `token`, confirm it with the backend and load per-user data.
    ///
    /// # Errors
    ///
    /// Returns the profile request's error; the token is detached again and
    /// the session stays anonymous.
    #[instrument(skip(self, token))]
    pub async fn sign_in(&self, token: SecretString) -> Result<CurrentUser> {
        if let Some(api) = &self.inner.api {
            api.set_token(token);
        }
        match self.resume().await {
            Ok(user) => Ok(user),
            Err(e) => {
                if let Some(api) = &self.inner.api {
                    api.clear_token();
                }
                Err(e)
            }
        }
    }

    /// Confirm whatever credentials the gateway already carries and load
    /// per-user data.
    ///
    /// # Errors
    ///
    /// Returns the profile request's error; the session stays anonymous.
    #[instrument(skip(self))]
    pub async fn resume(&self) -> Result<CurrentUser> {
        let user: CurrentUser = decode(self.inner.gateway.get(endpoints::CURRENT_USER).await?)
            .map_err(StoreError::from)?;
        self.inner.session.login(user.clone());

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Initial data load incomplete");
        }
        Ok(user)
    }

    /// Re-fetch the cart, wishlist and first page of orders concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first failure; every failure has published its own notice.
    pub async fn refresh(&self) -> Result<()> {
        let (cart, wishlist, orders) = tokio::join!(
            self.inner.cart.fetch(),
            self.inner.wishlist.fetch(),
            self.inner.orders.fetch(1),
        );
        cart.and(wishlist).and(orders)
    }

    /// Fetch every option list concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first failure; every failure has published its own notice.
    pub async fn refresh_lookups(&self) -> Result<()> {
        let [categories, brands, colors, sizes] = &self.inner.lookups;
        let (a, b, c, d) = tokio::join!(
            categories.fetch(),
            brands.fetch(),
            colors.fetch(),
            sizes.fetch(),
        );
        a.and(b).and(c).and(d)
    }

    /// End the session: detach the token and forget all per-user state.
    pub fn sign_out(&self) {
        self.inner.session.logout();
    }
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("api", &self.inner.api)
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::snapshot::{MemorySnapshots, keys, save_json};
    use crate::testing::{MockGateway, Verb, page};

    fn storefront(gateway: &Arc<MockGateway>, snapshots: &Arc<MemorySnapshots>) -> Storefront {
        Storefront::from_parts(
            Arc::clone(gateway) as Arc<dyn Gateway>,
            Arc::clone(snapshots) as Arc<dyn SnapshotStore>,
            20,
            Duration::from_secs(300),
        )
    }

    fn script_user_data(gateway: &MockGateway) {
        gateway
            .ok(
                Verb::Get,
                endpoints::CURRENT_USER,
                json!({"id": 7, "email": "shopper@example.com", "is_staff": false}),
            )
            .ok(
                Verb::Get,
                endpoints::CART_ITEMS,
                page(json!([{"id": 1, "cart": 3, "variant": {"stock": 5, "price": 500}, "variant_detail": 11, "quantity": 2}])),
            )
            .ok(
                Verb::Get,
                endpoints::WISHLIST,
                page(json!([{"id": 4, "variant": {"id": 11, "price": 500}}])),
            )
            .ok(
                Verb::Get,
                &endpoints::orders_page(1),
                page(json!([{"id": 9, "status": "pending", "payment_status": "unpaid", "total_price": 1000, "items": []}])),
            );
    }

    #[tokio::test]
    async fn test_resume_logs_in_and_loads_user_data() {
        let gateway = MockGateway::new();
        let snapshots = Arc::new(MemorySnapshots::new());
        script_user_data(&gateway);
        let storefront = storefront(&gateway, &snapshots);

        let user = storefront.resume().await.unwrap();

        assert_eq!(user.email.as_deref(), Some("shopper@example.com"));
        assert!(storefront.session().is_authenticated());
        assert_eq!(storefront.cart().items().len(), 1);
        assert_eq!(storefront.wishlist().items().len(), 1);
        assert_eq!(storefront.orders().items().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_profile_leaves_session_anonymous() {
        let gateway = MockGateway::new();
        let snapshots = Arc::new(MemorySnapshots::new());
        gateway.fail(Verb::Get, endpoints::CURRENT_USER, 401);
        let storefront = storefront(&gateway, &snapshots);

        let err = storefront.sign_in(SecretString::from("bad")).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert!(!storefront.session().is_authenticated());
        assert_eq!(gateway.count(Verb::Get, endpoints::CART_ITEMS), 0);
    }

    #[tokio::test]
    async fn test_sign_out_clears_every_per_user_store() {
        let gateway = MockGateway::new();
        let snapshots = Arc::new(MemorySnapshots::new());
        script_user_data(&gateway);
        gateway.ok(Verb::Get, endpoints::PRODUCTS, page(json!([{"id": 1, "name": "Air"}])));
        gateway.ok(Verb::Get, endpoints::BRANDS, page(json!([{"id": 1, "name": "Nike"}])));
        let storefront = storefront(&gateway, &snapshots);
        storefront.resume().await.unwrap();
        storefront.shop().load().await.unwrap();
        storefront.lookup(LookupKind::Brands).fetch().await.unwrap();
        let calls_before = gateway.calls().len();

        storefront.sign_out();

        assert!(!storefront.session().is_authenticated());
        assert!(storefront.cart().items().is_empty());
        assert!(storefront.wishlist().items().is_empty());
        assert!(storefront.orders().items().is_empty());
        assert!(storefront.shop().products().is_empty());
        for key in [keys::CART, keys::WISHLIST, keys::ORDERS, keys::PRODUCTS] {
            assert!(!snapshots.contains(key), "{key} survived logout");
        }
        assert_eq!(storefront.lookup(LookupKind::Brands).names(), vec!["Nike"]);
        assert_eq!(gateway.calls().len(), calls_before);
    }

    #[test]
    fn test_listeners_registered_without_api() {
        let gateway = MockGateway::new();
        let snapshots = Arc::new(MemorySnapshots::new());
        let storefront = storefront(&gateway, &snapshots);
        assert_eq!(storefront.session().listener_count(), 4);
        assert!(storefront.api().is_none());
    }

    #[test]
    fn test_hydrate_all_shows_snapshots() {
        let gateway = MockGateway::new();
        let snapshots = Arc::new(MemorySnapshots::new());
        save_json(
            snapshots.as_ref(),
            keys::CART,
            &json!([{"id": 1, "variant": {"stock": 5, "price": 500}, "variant_detail": 11, "quantity": 2}]),
        )
        .unwrap();
        save_json(snapshots.as_ref(), keys::SIZES, &json!([{"id": 1, "name": "42"}])).unwrap();
        let storefront = storefront(&gateway, &snapshots);

        storefront.hydrate_all();

        assert_eq!(storefront.cart().items().len(), 1);
        assert_eq!(storefront.lookup(LookupKind::Sizes).names(), vec!["42"]);
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn test_lookup_store_matches_kind() {
        let gateway = MockGateway::new();
        let snapshots = Arc::new(MemorySnapshots::new());
        let storefront = storefront(&gateway, &snapshots);
        for kind in LookupKind::ALL {
            assert_eq!(storefront.lookup(kind).kind(), kind);
        }
    }
}
