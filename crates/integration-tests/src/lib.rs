//! Integration tests for the Pzafira storefront client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pzafira-integration-tests
//! ```
//!
//! No external services are needed: every test starts a [`FakeBackend`], an
//! in-process `axum` server on an ephemeral port that mimics the REST
//! backend's paths, pagination envelope, JWT authentication and error
//! shapes. Tests drive the real `reqwest` client and `redb` snapshots
//! against it.
//!
//! # Test Categories
//!
//! - `session` - token handling and logout fan-out
//! - `cart` - cart and wishlist mutations
//! - `catalog` - paging, facets, filtering and the product snapshot
//! - `orders` - order history paging and staff updates

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path as UrlPath, Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use pzafira_storefront::StorefrontConfig;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// The only access token the fake backend accepts.
pub const VALID_TOKEN: &str = "valid-token";

/// Items per page on paginated collections.
pub const PAGE_SIZE: usize = 2;

/// A request as the fake backend saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Debug)]
struct Failure {
    method: Method,
    path: String,
    status: StatusCode,
    remaining: usize,
}

#[derive(Debug)]
struct Data {
    origin: String,
    user: Value,
    products: Vec<Value>,
    cart: Vec<Value>,
    wishlist: Vec<Value>,
    orders: Vec<Value>,
    lookups: HashMap<String, Vec<Value>>,
    next_id: i64,
    requests: Vec<RecordedRequest>,
    failures: Vec<Failure>,
}

impl Data {
    fn seeded(origin: String) -> Self {
        let lookups = [
            ("categories", json!(["Shoes", "Sneakers"])),
            ("brands", json!(["Nike", "Adidas"])),
            ("colors", json!(["Red", "Blue", "Black", "White"])),
            ("sizes", json!(["40", "42", "43", "44"])),
        ]
        .into_iter()
        .map(|(kind, names)| {
            let items = names
                .as_array()
                .into_iter()
                .flatten()
                .zip(1..)
                .map(|(name, id)| json!({"id": id, "name": name}))
                .collect();
            (kind.to_string(), items)
        })
        .collect();

        Self {
            origin,
            user: json!({"id": 7, "email": "shopper@example.com", "username": "shopper", "is_staff": true}),
            products: vec![
                json!({
                    "id": 1, "name": "Air Zoom", "description": "Road running shoe",
                    "category": {"id": 1, "name": "Shoes"}, "brand": "Nike", "target_audience": "men",
                    "variants": [{"id": 11, "color": "Red", "size": "42", "stock": 5, "price": "500.00"}],
                    "images": [{"image": "https://cdn.example.com/air-zoom.jpg"}]
                }),
                json!({
                    "id": 2, "name": "Air Max", "description": null,
                    "category": "Shoes", "brand": {"name": "Nike"}, "target_audience": "men",
                    "variants": [
                        {"id": 21, "color": "Blue", "size": "43", "stock": 0, "price": "1500.00"},
                        {"id": 22, "color": "Black", "size": "44", "stock": 2, "price": "1400.00"}
                    ],
                    "images": []
                }),
                json!({
                    "id": 3, "name": "Gazelle", "description": "Suede trainer",
                    "category": "Sneakers", "brand": "Adidas", "target_audience": "women",
                    "variants": [{"id": 31, "color": "White", "size": "40", "stock": 4, "price": "800.00"}],
                    "images": []
                }),
            ],
            cart: Vec::new(),
            wishlist: Vec::new(),
            orders: (1..=3)
                .map(|id| {
                    json!({
                        "id": id, "status": "pending", "payment_status": "unpaid",
                        "total_price": "1000.00",
                        "items": [{"id": id * 10, "variant": {"product": "Air Zoom", "color": "Red", "size": "42"}, "price": "500.00", "quantity": 2}],
                        "shipping_address": "House 1, Road 2, Dhaka",
                        "created_at": "2025-03-01T10:00:00Z"
                    })
                })
                .collect(),
            lookups,
            next_id: 100,
            requests: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn take_failure(&mut self, method: &Method, path: &str) -> Option<StatusCode> {
        let failure = self
            .failures
            .iter_mut()
            .find(|f| f.method == *method && f.path == path && f.remaining > 0)?;
        failure.remaining -= 1;
        Some(failure.status)
    }

    fn variant(&self, variant_id: i64) -> Option<(Value, Value)> {
        self.products.iter().find_map(|product| {
            product["variants"]
                .as_array()?
                .iter()
                .find(|variant| variant["id"] == variant_id)
                .map(|variant| (product.clone(), variant.clone()))
        })
    }

    /// `{results, count, next, previous}` for one page of `items`.
    fn page(&self, items: &[Value], page: usize, link: impl Fn(usize) -> String) -> Value {
        let start = (page - 1) * PAGE_SIZE;
        let results: Vec<Value> = items.iter().skip(start).take(PAGE_SIZE).cloned().collect();
        let next = (start + PAGE_SIZE < items.len()).then(|| link(page + 1));
        let previous = (page > 1).then(|| link(page - 1));
        json!({"results": results, "count": items.len(), "next": next, "previous": previous})
    }
}

type Shared = Arc<Mutex<Data>>;

fn lock(state: &Shared) -> MutexGuard<'_, Data> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process stand-in for the REST backend.
///
/// The server task is aborted on drop.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Shared,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind an ephemeral port and start serving seeded data.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Fake backend has no address");
        let state: Shared = Arc::new(Mutex::new(Data::seeded(format!("http://{addr}"))));

        let app = router(Arc::clone(&state));
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).expect("Invalid fake backend URL")
    }

    /// Client configuration pointing at this backend with snapshots at
    /// `state_path` and no token.
    #[must_use]
    pub fn config(&self, state_path: &Path) -> StorefrontConfig {
        StorefrontConfig::new(self.base_url(), state_path.to_path_buf())
    }

    /// Answer the next `times` requests to `path` with `status`.
    pub fn fail(&self, method: Method, path: &str, status: u16, times: usize) {
        lock(&self.state).failures.push(Failure {
            method,
            path: path.to_string(),
            status: StatusCode::from_u16(status).expect("Invalid status code"),
            remaining: times,
        });
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Requests received for `path`.
    #[must_use]
    pub fn requests_to(&self, method: &Method, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == *method && r.path == path)
            .collect()
    }

    /// Server-side cart lines.
    #[must_use]
    pub fn cart(&self) -> Vec<Value> {
        lock(&self.state).cart.clone()
    }

    /// Server-side wishlist entries.
    #[must_use]
    pub fn wishlist(&self) -> Vec<Value> {
        lock(&self.state).wishlist.clone()
    }

    /// Server-side order by id.
    #[must_use]
    pub fn order(&self, id: i64) -> Option<Value> {
        lock(&self.state).orders.iter().find(|o| o["id"] == id).cloned()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/auth/users/me/", get(current_user))
        .route("/cart/api/cart-items/", get(list_cart).post(add_cart_item))
        .route(
            "/cart/api/cart-items/{id}/",
            patch(update_cart_item).delete(delete_cart_item),
        )
        .route("/cart/api/cart/clear/", delete(clear_cart))
        .route("/wishlist/api/wishlist/", get(list_wishlist).post(add_wishlist_item))
        .route("/wishlist/api/wishlist/{id}/", delete(delete_wishlist_item))
        .route("/orders/api/orders/", get(list_orders))
        .route("/orders/api/orders/{id}/", patch(update_order))
        .route("/products/api/detail-products/", get(list_products))
        .route("/products/api/detail-products/{id}/", get(product_detail))
        .route("/products/api/{kind}/", get(lookup_list))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), record_and_inject))
        .with_state(state)
}

/// Record every request and answer scripted failures before routing.
async fn record_and_inject(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let injected = {
        let mut data = lock(&state);
        data.requests.push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            query: request.uri().query().map(String::from),
            authorization: request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .map(String::from),
        });
        data.take_failure(&method, &path)
    };

    match injected {
        Some(status) => (status, Json(json!({"detail": "Injected failure."}))).into_response(),
        None => next.run(request).await,
    }
}

fn authorized(headers: &HeaderMap) -> Result<(), Response> {
    let expected = format!("JWT {VALID_TOKEN}");
    let presented = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
    if presented == Some(expected.as_str()) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Authentication credentials were not provided."})),
        )
            .into_response())
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response()
}

fn page_number(query: &HashMap<String, String>) -> usize {
    query
        .get("page")
        .and_then(|p| p.parse().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1)
}

async fn current_user(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    Json(lock(&state).user.clone()).into_response()
}

async fn list_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    let data = lock(&state);
    Json(json!({"results": data.cart, "count": data.cart.len(), "next": null, "previous": null}))
        .into_response()
}

#[derive(Debug, Deserialize)]
struct NewLine {
    variant: Value,
    variant_detail: i64,
    quantity: u32,
}

async fn add_cart_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(line): Json<NewLine>,
) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    let mut data = lock(&state);
    let Some((product, variant)) = data.variant(line.variant_detail) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"variant_detail": ["Invalid pk - object does not exist."]})),
        )
            .into_response();
    };
    let stock = variant["stock"].as_u64().unwrap_or(0);
    if u64::from(line.quantity) > stock {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"quantity": [format!("Ensure this value is less than or equal to {stock}.")]})),
        )
            .into_response();
    }

    let id = data.allocate_id();
    let mut details = line.variant;
    details["product"] = product["name"].clone();
    details["product_id"] = product["id"].clone();
    details["stock"] = json!(stock);
    details["price"] = variant["price"].clone();
    let created = json!({
        "id": id,
        "cart": 1,
        "variant": details,
        "variant_detail": line.variant_detail,
        "quantity": line.quantity,
        "image": product["images"][0]["image"].clone()
    });
    data.cart.push(created.clone());
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn update_cart_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    let mut data = lock(&state);
    let Some(line) = data.cart.iter_mut().find(|line| line["id"] == id) else {
        return not_found();
    };
    line["quantity"] = body["quantity"].clone();
    Json(line.clone()).into_response()
}

async fn delete_cart_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<i64>,
) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    let mut data = lock(&state);
    let before = data.cart.len();
    data.cart.retain(|line| line["id"] != id);
    if data.cart.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn clear_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    lock(&state).cart.clear();
    StatusCode::NO_CONTENT.into_response()
}

async fn list_wishlist(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    let data = lock(&state);
    Json(json!({"results": data.wishlist, "count": data.wishlist.len(), "next": null, "previous": null}))
        .into_response()
}

#[derive(Debug, Deserialize)]
struct NewWish {
    variant_id: i64,
}

async fn add_wishlist_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(wish): Json<NewWish>,
) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    let mut data = lock(&state);
    if let Some(existing) = data
        .wishlist
        .iter()
        .find(|entry| entry["variant"]["id"] == wish.variant_id)
    {
        return Json(existing.clone()).into_response();
    }
    let Some((product, variant)) = data.variant(wish.variant_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"variant_id": ["Invalid pk - object does not exist."]})),
        )
            .into_response();
    };
    let id = data.allocate_id();
    let created = json!({
        "id": id,
        "variant": {
            "id": variant["id"],
            "product": product["name"],
            "product_id": product["id"],
            "color": variant["color"],
            "size": variant["size"],
            "price": variant["price"]
        }
    });
    data.wishlist.push(created.clone());
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn delete_wishlist_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<i64>,
) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    let mut data = lock(&state);
    let before = data.wishlist.len();
    data.wishlist.retain(|entry| entry["id"] != id);
    if data.wishlist.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_orders(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    let data = lock(&state);
    let origin = data.origin.clone();
    let body = data.page(&data.orders, page_number(&query), |page| {
        format!("{origin}/orders/api/orders/?page={page}")
    });
    Json(body).into_response()
}

async fn update_order(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    let mut data = lock(&state);
    let Some(order) = data.orders.iter_mut().find(|order| order["id"] == id) else {
        return not_found();
    };
    for field in ["status", "payment_status"] {
        if let Some(value) = body.get(field) {
            order[field] = value.clone();
        }
    }
    Json(order.clone()).into_response()
}

async fn list_products(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let data = lock(&state);
    let audience = query.get("target_audience").cloned();
    let products: Vec<Value> = data
        .products
        .iter()
        .filter(|p| {
            audience
                .as_deref()
                .is_none_or(|audience| p["target_audience"] == audience)
        })
        .cloned()
        .collect();

    let origin = data.origin.clone();
    let body = data.page(&products, page_number(&query), |page| {
        let mut link = format!("{origin}/products/api/detail-products/?page={page}");
        if let Some(audience) = &audience {
            link.push_str("&target_audience=");
            link.push_str(audience);
        }
        link
    });
    Json(body).into_response()
}

async fn product_detail(State(state): State<Shared>, UrlPath(id): UrlPath<i64>) -> Response {
    let data = lock(&state);
    data.products
        .iter()
        .find(|p| p["id"] == id)
        .map_or_else(not_found, |p| Json(p.clone()).into_response())
}

async fn lookup_list(State(state): State<Shared>, UrlPath(kind): UrlPath<String>) -> Response {
    let data = lock(&state);
    data.lookups.get(&kind).map_or_else(not_found, |items| {
        Json(json!({"results": items, "count": items.len(), "next": null, "previous": null}))
            .into_response()
    })
}
