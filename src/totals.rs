use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{bag::BagLine, config::DeliveryConfig, models::Product};

/// Cached totals stored on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderTotals {
    pub order_total: Decimal,
    pub delivery_cost: Decimal,
    pub grand_total: Decimal,
}

impl OrderTotals {
    pub fn compute(line_total: Decimal, config: &DeliveryConfig) -> Self {
        let delivery_cost = delivery_cost(line_total, config);
        Self {
            order_total: line_total,
            delivery_cost,
            grand_total: line_total + delivery_cost,
        }
    }
}

/// Standard delivery below the free-delivery threshold, nothing above it.
pub fn delivery_cost(total: Decimal, config: &DeliveryConfig) -> Decimal {
    if total < config.free_delivery_threshold {
        (total * config.standard_delivery_percentage / Decimal::ONE_HUNDRED).round_dp(2)
    } else {
        Decimal::ZERO
    }
}

pub fn line_total(price: Decimal, quantity: u32) -> Decimal {
    price * Decimal::from(quantity)
}

/// Convert a decimal amount into the gateway's minor units.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED).round().to_i64()
}

/// Convert a gateway amount in minor units back into a decimal amount.
pub fn from_minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BagItem {
    pub product: Product,
    pub size: Option<String>,
    pub quantity: u32,
    pub subtotal: Decimal,
}

/// Bag contents priced against the catalog, as shown before checkout.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BagTotals {
    pub items: Vec<BagItem>,
    pub total: Decimal,
    pub product_count: u32,
    pub delivery: Decimal,
    pub free_delivery_delta: Decimal,
    pub free_delivery_threshold: Decimal,
    pub grand_total: Decimal,
}

impl BagTotals {
    pub fn compute(lines: Vec<(BagLine, Product)>, config: &DeliveryConfig) -> Self {
        let mut items = Vec::with_capacity(lines.len());
        let mut total = Decimal::ZERO;
        let mut product_count = 0;

        for (line, product) in lines {
            let subtotal = line_total(product.price, line.quantity);
            total += subtotal;
            product_count += line.quantity;
            items.push(BagItem {
                product,
                size: line.size,
                quantity: line.quantity,
                subtotal,
            });
        }

        let delivery = delivery_cost(total, config);
        let free_delivery_delta = if total < config.free_delivery_threshold {
            config.free_delivery_threshold - total
        } else {
            Decimal::ZERO
        };

        Self {
            items,
            total,
            product_count,
            delivery,
            free_delivery_delta,
            free_delivery_threshold: config.free_delivery_threshold,
            grand_total: total + delivery,
        }
    }
}
