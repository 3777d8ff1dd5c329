//! Order history commands. All of them require a signed-in user.

use pzafira_core::{OrderId, OrderStatus, PaymentStatus};
use pzafira_storefront::Storefront;
use pzafira_storefront::store::{Order, OrderPatch};

use super::{CommandError, emit, sign_in};

/// List one page of orders.
///
/// # Errors
///
/// Returns `CommandError::NotSignedIn` or the fetch error.
pub async fn list(storefront: &Storefront, page: u32) -> Result<(), CommandError> {
    sign_in(storefront).await?;
    let orders = storefront.orders();
    if page > 1 {
        orders.fetch(page).await?;
    }
    for order in orders.items() {
        emit(&order_row(&order));
    }
    let pagination = orders.pagination();
    emit(&format!(
        "page {}, {} order(s) in total",
        pagination.page, pagination.count
    ));
    Ok(())
}

/// Change the status fields of one order.
///
/// # Errors
///
/// Returns the backend error; staff rights are checked by the backend.
pub async fn update(
    storefront: &Storefront,
    id: OrderId,
    status: Option<OrderStatus>,
    payment_status: Option<PaymentStatus>,
) -> Result<(), CommandError> {
    let patch = OrderPatch {
        status,
        payment_status,
    };
    if patch.is_empty() {
        tracing::warn!("Nothing to update; pass --status or --payment-status");
        return Ok(());
    }
    sign_in(storefront).await?;
    if !storefront.session().is_staff() {
        tracing::warn!("Signed-in user is not staff; the backend will likely refuse");
    }
    storefront.orders().update(id, patch).await?;
    Ok(())
}

fn order_row(order: &Order) -> String {
    let totals = order.totals();
    format!(
        "#{:<6}  {:<10}  {:<10}  {:>3} line(s)  {}  {}",
        order.id.as_i64(),
        order.status.label(),
        order.payment_status.label(),
        order.items.len(),
        totals.grand_total,
        order
            .created_at
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    )
}
