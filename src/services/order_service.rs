use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    bag::BagSnapshot,
    config::DeliveryConfig,
    dto::orders::OrderWithItems,
    error::AppError,
    models::{Order, OrderLineItem, Product},
    store::{NewLineItem, NewOrder, OrderStore, StoreError},
    totals::{OrderTotals, line_total},
};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("bag is empty")]
    EmptyBag,

    #[error("Product {0} not found")]
    ProductNotFound(i32),

    #[error("quantity for product {0} is out of range")]
    InvalidQuantity(i32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<BuildError> for AppError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::EmptyBag | BuildError::InvalidQuantity(_) => {
                AppError::BadRequest(err.to_string())
            }
            BuildError::ProductNotFound(id) => AppError::ProductNotFound(id),
            BuildError::Store(err) => AppError::PersistenceFault(err.to_string()),
        }
    }
}

/// Recompute the cached totals from the order's current line items.
pub async fn update_total<S>(
    store: &S,
    order_id: Uuid,
    delivery: &DeliveryConfig,
) -> Result<Order, StoreError>
where
    S: OrderStore + ?Sized,
{
    let items = store.line_items(order_id).await?;
    let lines: Decimal = items.iter().map(|item| item.lineitem_total).sum();
    store
        .save_totals(order_id, &OrderTotals::compute(lines, delivery))
        .await
}

/// Insert a line item and refresh the order totals in the same call.
pub async fn add_line_item<S>(
    store: &S,
    order_id: Uuid,
    product: &Product,
    size: Option<String>,
    quantity: i32,
    delivery: &DeliveryConfig,
) -> Result<(OrderLineItem, Order), StoreError>
where
    S: OrderStore + ?Sized,
{
    let item = store
        .insert_line_item(&NewLineItem {
            order_id,
            product_id: product.id,
            product_size: size,
            quantity,
            lineitem_total: product.price * Decimal::from(quantity),
        })
        .await?;
    let order = update_total(store, order_id, delivery).await?;
    Ok((item, order))
}

/// Delete a line item and refresh the order totals. `None` when the item is not on the order.
pub async fn remove_line_item<S>(
    store: &S,
    order_id: Uuid,
    line_item_id: Uuid,
    delivery: &DeliveryConfig,
) -> Result<Option<Order>, StoreError>
where
    S: OrderStore + ?Sized,
{
    if !store.delete_line_item(order_id, line_item_id).await? {
        return Ok(None);
    }
    update_total(store, order_id, delivery).await.map(Some)
}

/// An order together with its line items, looked up by order number.
pub async fn find_by_number<S>(
    store: &S,
    order_number: &str,
) -> Result<Option<OrderWithItems>, StoreError>
where
    S: OrderStore + ?Sized,
{
    let Some(order) = store.find_order_by_number(order_number).await? else {
        return Ok(None);
    };
    let items = store.line_items(order.id).await?;
    Ok(Some(OrderWithItems { order, items }))
}

/// Persist an order with one line item per bag line.
///
/// Every product is resolved before anything is written. The order, its lines
/// and its totals are then stored in one atomic write, so no reader ever sees
/// an order that is not fully formed.
pub async fn create_order_from_bag<S>(
    store: &S,
    draft: &NewOrder,
    bag: &BagSnapshot,
    delivery: &DeliveryConfig,
) -> Result<OrderWithItems, BuildError>
where
    S: OrderStore + ?Sized,
{
    if bag.is_empty() {
        return Err(BuildError::EmptyBag);
    }

    let mut lines = Vec::new();
    let mut lines_sum = Decimal::ZERO;
    for line in bag.lines() {
        let product = store
            .find_product(line.product_id)
            .await?
            .ok_or(BuildError::ProductNotFound(line.product_id))?;
        let quantity =
            i32::try_from(line.quantity).map_err(|_| BuildError::InvalidQuantity(line.product_id))?;
        let lineitem_total = line_total(product.price, line.quantity);
        lines_sum += lineitem_total;
        lines.push(NewLineItem {
            order_id: draft.id,
            product_id: product.id,
            product_size: line.size,
            quantity,
            lineitem_total,
        });
    }

    let totals = OrderTotals::compute(lines_sum, delivery);
    let (order, items) = store.create_order(draft, &lines, &totals).await?;
    tracing::info!(
        order_number = %order.order_number,
        lines = items.len(),
        grand_total = %order.grand_total,
        "order created"
    );
    Ok(OrderWithItems { order, items })
}
