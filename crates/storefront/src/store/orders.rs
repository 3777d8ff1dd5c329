//! Order history store.
//!
//! Orders are read-mostly: customers only list them, staff may change
//! `status` and `payment_status`. Nothing here creates or deletes an order.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use pzafira_core::{
    NamedRef, OrderId, OrderItemId, OrderStatus, OrderTotals, Page, PaymentStatus, Price,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{Collection, KeyedLocks, StoreContext, StoreStatus};
use crate::api::{ApiError, decode, endpoints};
use crate::error::{Result, StoreError};
use crate::session::SessionListener;
use crate::snapshot::keys;

/// Variant summary on an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemVariant {
    #[serde(default)]
    pub product: Option<NamedRef>,
    #[serde(default)]
    pub color: Option<NamedRef>,
    #[serde(default)]
    pub size: Option<NamedRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    #[serde(default)]
    pub variant: Option<OrderItemVariant>,
    /// Unit price at purchase time.
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub quantity: u32,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub total_price: Price,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Tax, delivery and grand total for display.
    #[must_use]
    pub fn totals(&self) -> OrderTotals {
        OrderTotals::from_subtotal(self.total_price)
    }
}

/// Staff changes to an order. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
}

impl OrderPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none() && self.payment_status.is_none()
    }

    fn apply(&self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(payment_status) = self.payment_status {
            order.payment_status = payment_status;
        }
    }
}

/// Position within the paginated order history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            count: 0,
            next: None,
            previous: None,
        }
    }
}

/// The signed-in user's order history, one page at a time.
#[derive(Debug)]
pub struct OrdersStore {
    ctx: StoreContext,
    items: Collection<Order>,
    pagination: RwLock<Pagination>,
    locks: KeyedLocks<OrderId>,
}

impl OrdersStore {
    #[must_use]
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            items: Collection::new(),
            pagination: RwLock::new(Pagination::default()),
            locks: KeyedLocks::new(),
        }
    }

    /// Show the persisted snapshot before the first fetch.
    pub fn hydrate(&self) -> bool {
        self.items.hydrate(&self.ctx, keys::ORDERS)
    }

    #[must_use]
    pub fn items(&self) -> Vec<Order> {
        self.items.items()
    }

    #[must_use]
    pub fn status(&self) -> StoreStatus {
        self.items.status()
    }

    #[must_use]
    pub fn get(&self, id: OrderId) -> Option<Order> {
        self.items.read().items.iter().find(|order| order.id == id).cloned()
    }

    #[must_use]
    pub fn pagination(&self) -> Pagination {
        self.pagination
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_pagination(&self, pagination: Pagination) {
        *self
            .pagination
            .write()
            .unwrap_or_else(PoisonError::into_inner) = pagination;
    }

    /// Load one page of order history (pages start at 1).
    ///
    /// # Errors
    ///
    /// Returns the fetch error after publishing a warning. Prior orders
    /// stay, or the snapshot is shown with pagination reset.
    #[instrument(skip(self))]
    pub async fn fetch(&self, page: u32) -> Result<()> {
        let page = page.max(1);
        let epoch = self.items.begin_sync(&self.ctx, keys::ORDERS);

        let fetched = async {
            let path = endpoints::orders_page(page);
            decode::<Page<Order>>(self.ctx.gateway.get(&path).await?)
        }
        .await;

        match fetched {
            Ok(data) => {
                debug!(count = data.count, returned = data.results.len(), "Orders fetched");
                if self.items.finish_sync(&self.ctx, keys::ORDERS, epoch, data.results) {
                    self.set_pagination(Pagination {
                        page,
                        count: data.count,
                        next: data.next,
                        previous: data.previous,
                    });
                }
                Ok(())
            }
            Err(e) => {
                if self.items.fail_sync(&self.ctx, keys::ORDERS, epoch) {
                    self.set_pagination(Pagination::default());
                }
                self.ctx.notifier.warning("Failed to fetch orders.");
                let err = StoreError::from(e);
                err.capture();
                Err(err)
            }
        }
    }

    /// Load the following page, if any.
    ///
    /// # Errors
    ///
    /// See [`OrdersStore::fetch`].
    pub async fn next_page(&self) -> Result<bool> {
        let pagination = self.pagination();
        if pagination.next.is_none() {
            return Ok(false);
        }
        self.fetch(pagination.page + 1).await.map(|()| true)
    }

    /// Load the preceding page, if any.
    ///
    /// # Errors
    ///
    /// See [`OrdersStore::fetch`].
    pub async fn previous_page(&self) -> Result<bool> {
        let pagination = self.pagination();
        if pagination.previous.is_none() || pagination.page <= 1 {
            return Ok(false);
        }
        self.fetch(pagination.page - 1).await.map(|()| true)
    }

    /// Change the status fields of an order (staff only on the backend).
    ///
    /// # Errors
    ///
    /// Returns the backend error; the order is left unchanged.
    #[instrument(skip(self, patch), fields(order_id = %id))]
    pub async fn update(&self, id: OrderId, patch: OrderPatch) -> Result<()> {
        let _guard = self.locks.lock(id).await;
        let epoch = self.items.epoch();

        let path = endpoints::item(endpoints::ORDERS, id);
        let result = async {
            let body = serde_json::to_value(&patch).map_err(|e| ApiError::Parse(e.to_string()))?;
            self.ctx.gateway.patch(&path, &body).await
        }
        .await;

        match result {
            Ok(_) => {
                self.items.update(&self.ctx, keys::ORDERS, epoch, |orders| {
                    if let Some(order) = orders.iter_mut().find(|order| order.id == id) {
                        patch.apply(order);
                    }
                });
                self.ctx.notifier.success("Order updated.");
                Ok(())
            }
            Err(e) => {
                self.ctx.notifier.error("Failed to update order.");
                let err = StoreError::from(e);
                err.capture();
                Err(err)
            }
        }
    }

    /// Forget the order history locally.
    pub fn clear_local(&self) {
        self.items.clear_local(&self.ctx, keys::ORDERS);
        self.set_pagination(Pagination::default());
    }
}

impl SessionListener for OrdersStore {
    fn on_logout(&self) {
        self.clear_local();
    }
}
