#![allow(dead_code)]

use std::{collections::HashMap, sync::Mutex, time::Duration};

use async_trait::async_trait;
use axum_storefront_api::{
    config::LookupPolicy,
    models::{Order, OrderLineItem, Product, ShippingAddress, UserProfile},
    payments::{CheckoutMetadata, PaymentConfirmation, UserRef},
    services::email_service::{EmailError, OrderMailer},
    store::{NewLineItem, NewOrder, OrderLookup, OrderStore, StoreError},
    totals::OrderTotals,
};
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

pub fn d(value: &str) -> Decimal {
    value.parse().expect("decimal literal")
}

pub fn no_wait(attempts: u32) -> LookupPolicy {
    LookupPolicy {
        attempts,
        delay: Duration::ZERO,
    }
}

#[derive(Default)]
struct Inner {
    orders: Vec<Order>,
    items: Vec<OrderLineItem>,
    products: HashMap<i32, Product>,
    profiles: Vec<UserProfile>,
    lookups: u32,
    /// Order committed by a concurrent checkout once this many lookups have run.
    pending: Option<(u32, NewOrder)>,
    /// The first this-many lookups miss every order, as when a commit lands
    /// just after the last retry.
    blind_lookups: u32,
    /// Catalog reads yield for this long before answering.
    product_delay: Duration,
}

/// `OrderStore` over plain vectors, with hooks for simulating a racing checkout.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn with_products(products: &[(i32, &str)]) -> Self {
        let store = Self::default();
        {
            let mut inner = store.inner.lock().unwrap();
            for &(id, price) in products {
                inner.products.insert(
                    id,
                    Product {
                        id,
                        sku: Some(format!("sku-{id}")),
                        name: format!("Product {id}"),
                        price: d(price),
                        has_sizes: false,
                    },
                );
            }
        }
        store
    }

    pub fn add_profile(&self, user_id: Uuid) -> UserProfile {
        let profile = UserProfile {
            id: Uuid::new_v4(),
            user_id,
            default_phone_number: None,
            default_country: None,
            default_postcode: None,
            default_town_or_city: None,
            default_street_address1: None,
            default_street_address2: None,
            default_county: None,
        };
        self.inner.lock().unwrap().profiles.push(profile.clone());
        profile
    }

    pub fn commit_after_lookups(&self, lookups: u32, order: NewOrder) {
        self.inner.lock().unwrap().pending = Some((lookups, order));
    }

    pub fn blind_lookups(&self, count: u32) {
        self.inner.lock().unwrap().blind_lookups = count;
    }

    pub fn slow_products(&self, delay: Duration) {
        self.inner.lock().unwrap().product_delay = delay;
    }

    pub fn orders(&self) -> Vec<Order> {
        self.inner.lock().unwrap().orders.clone()
    }

    pub fn items(&self) -> Vec<OrderLineItem> {
        self.inner.lock().unwrap().items.clone()
    }

    pub fn profile(&self, id: Uuid) -> Option<UserProfile> {
        self.inner
            .lock()
            .unwrap()
            .profiles
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn lookups(&self) -> u32 {
        self.inner.lock().unwrap().lookups
    }

    /// Insert an order directly, the way the checkout request would.
    pub fn seed_order(&self, draft: &NewOrder, totals: OrderTotals) -> Order {
        let mut inner = self.inner.lock().unwrap();
        let order = materialize(draft, totals);
        inner.orders.push(order.clone());
        order
    }
}

fn materialize(draft: &NewOrder, totals: OrderTotals) -> Order {
    Order {
        id: draft.id,
        order_number: draft.order_number.clone(),
        user_profile_id: draft.user_profile_id,
        shipping: draft.shipping.clone(),
        date: Utc::now(),
        delivery_cost: totals.delivery_cost,
        order_total: totals.order_total,
        grand_total: totals.grand_total,
        original_bag: draft.original_bag.clone(),
        stripe_pid: draft.stripe_pid.clone(),
    }
}

fn line_item(item: &NewLineItem) -> OrderLineItem {
    OrderLineItem {
        id: Uuid::new_v4(),
        order_id: item.order_id,
        product_id: item.product_id,
        product_size: item.product_size.clone(),
        quantity: item.quantity,
        lineitem_total: item.lineitem_total,
    }
}

fn iexact(stored: Option<&str>, wanted: Option<&str>) -> bool {
    match (stored, wanted) {
        (Some(a), Some(b)) => a.to_lowercase() == b.to_lowercase(),
        (None, None) => true,
        _ => false,
    }
}

fn matches(order: &Order, lookup: &OrderLookup) -> bool {
    let (a, b) = (&order.shipping, &lookup.shipping);
    iexact(Some(&a.full_name), Some(&b.full_name))
        && iexact(Some(&a.email), Some(&b.email))
        && iexact(a.phone_number.as_deref(), b.phone_number.as_deref())
        && iexact(a.country.as_deref(), b.country.as_deref())
        && iexact(a.postcode.as_deref(), b.postcode.as_deref())
        && iexact(a.town_or_city.as_deref(), b.town_or_city.as_deref())
        && iexact(a.street_address1.as_deref(), b.street_address1.as_deref())
        && iexact(a.street_address2.as_deref(), b.street_address2.as_deref())
        && iexact(a.county.as_deref(), b.county.as_deref())
        && order.grand_total == lookup.grand_total
        && order.original_bag == lookup.original_bag
        && order.stripe_pid == lookup.stripe_pid
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_matching_order(&self, lookup: &OrderLookup) -> Result<Option<Order>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.lookups += 1;

        if let Some((after, draft)) = inner.pending.take() {
            if inner.lookups >= after {
                let order = materialize(&draft, OrderTotals {
                    order_total: lookup.grand_total,
                    delivery_cost: Decimal::ZERO,
                    grand_total: lookup.grand_total,
                });
                inner.orders.push(order);
            } else {
                inner.pending = Some((after, draft));
            }
        }

        if inner.lookups <= inner.blind_lookups {
            return Ok(None);
        }
        Ok(inner.orders.iter().find(|o| matches(o, lookup)).cloned())
    }

    async fn find_order_by_payment(&self, stripe_pid: &str) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.orders.iter().find(|o| o.stripe_pid == stripe_pid).cloned())
    }

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .orders
            .iter()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn find_product(&self, product_id: i32) -> Result<Option<Product>, StoreError> {
        let delay = self.inner.lock().unwrap().product_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.inner.lock().unwrap().products.get(&product_id).cloned())
    }

    async fn find_profile_by_user(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.profiles.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn create_order(
        &self,
        draft: &NewOrder,
        lines: &[NewLineItem],
        totals: &OrderTotals,
    ) -> Result<(Order, Vec<OrderLineItem>), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.orders.iter().any(|o| o.stripe_pid == draft.stripe_pid) {
            return Err(StoreError::DuplicatePayment(draft.stripe_pid.clone()));
        }
        let order = materialize(draft, *totals);
        let items: Vec<OrderLineItem> = lines.iter().map(line_item).collect();
        inner.orders.push(order.clone());
        inner.items.extend(items.iter().cloned());
        Ok((order, items))
    }

    async fn insert_line_item(&self, item: &NewLineItem) -> Result<OrderLineItem, StoreError> {
        let line = line_item(item);
        self.inner.lock().unwrap().items.push(line.clone());
        Ok(line)
    }

    async fn delete_line_item(&self, order_id: Uuid, line_item_id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.items.len();
        inner
            .items
            .retain(|i| !(i.order_id == order_id && i.id == line_item_id));
        Ok(inner.items.len() < before)
    }

    async fn line_items(&self, order_id: Uuid) -> Result<Vec<OrderLineItem>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn save_totals(&self, order_id: Uuid, totals: &OrderTotals) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| StoreError::Db(sea_orm::DbErr::RecordNotFound(order_id.to_string())))?;
        order.order_total = totals.order_total;
        order.delivery_cost = totals.delivery_cost;
        order.grand_total = totals.grand_total;
        Ok(order.clone())
    }

    async fn save_profile_defaults(
        &self,
        profile_id: Uuid,
        shipping: &ShippingAddress,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(profile) = inner.profiles.iter_mut().find(|p| p.id == profile_id) {
            profile.default_phone_number = shipping.phone_number.clone();
            profile.default_country = shipping.country.clone();
            profile.default_postcode = shipping.postcode.clone();
            profile.default_town_or_city = shipping.town_or_city.clone();
            profile.default_street_address1 = shipping.street_address1.clone();
            profile.default_street_address2 = shipping.street_address2.clone();
            profile.default_county = shipping.county.clone();
        }
        Ok(())
    }
}

/// Mailer that remembers which orders it was asked to confirm.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderMailer for RecordingMailer {
    async fn send_order_confirmation(&self, order: &Order) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(order.order_number.clone());
        if self.fail {
            return Err(EmailError::InvalidAddress(order.shipping.email.clone()));
        }
        Ok(())
    }
}

pub fn shipping() -> ShippingAddress {
    ShippingAddress {
        full_name: "Jane Doe".into(),
        email: "jane@example.com".into(),
        phone_number: Some("0123456789".into()),
        country: Some("GB".into()),
        postcode: Some("SW1A 1AA".into()),
        town_or_city: Some("London".into()),
        street_address1: Some("1 High Street".into()),
        street_address2: None,
        county: None,
    }
}

pub const SAMPLE_BAG: &str = r#"{"12": 2, "7": {"items_by_size": {"M": 1, "L": 3}}}"#;

pub fn confirmation(payment_id: &str, bag: &str, amount: i64, user: UserRef, save_info: bool) -> PaymentConfirmation {
    PaymentConfirmation {
        payment_id: payment_id.into(),
        shipping: shipping(),
        amount,
        metadata: CheckoutMetadata {
            bag: bag.into(),
            save_info,
            user,
        },
    }
}
