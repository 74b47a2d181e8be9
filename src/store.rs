//! Persistence seam for orders, line items, products and profiles.
//!
//! Services are written against [`OrderStore`] so the checkout request and the
//! payment webhook share one implementation of order construction. The
//! production implementation is the SeaORM connection itself; a new order is
//! written with its line items and totals inside a single transaction.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
    ActiveValue::NotSet,
    sea_query::{Expr, Func, SimpleExpr},
};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    entity::{
        order_line_items::{ActiveModel as LineItemActive, Column as LineItemCol, Entity as OrderLineItems},
        orders::{self, ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::Entity as Products,
        user_profiles::{ActiveModel as ProfileActive, Column as ProfileCol, Entity as UserProfiles},
    },
    error::AppError,
    models::{Order, OrderLineItem, Product, ShippingAddress, UserProfile},
    totals::OrderTotals,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("an order already exists for payment {0}")]
    DuplicatePayment(String),

    #[error(transparent)]
    Db(#[from] DbErr),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Db(err) => AppError::OrmError(err),
            err @ StoreError::DuplicatePayment(_) => AppError::PersistenceFault(err.to_string()),
        }
    }
}

/// Everything the webhook knows about an order it expects to find.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLookup {
    pub shipping: ShippingAddress,
    pub grand_total: Decimal,
    pub original_bag: String,
    pub stripe_pid: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    /// Assigned up front so line items can reference the order before it is written.
    pub id: Uuid,
    pub order_number: String,
    pub user_profile_id: Option<Uuid>,
    pub shipping: ShippingAddress,
    pub original_bag: String,
    pub stripe_pid: String,
}

impl NewOrder {
    pub fn new(
        shipping: ShippingAddress,
        original_bag: String,
        stripe_pid: String,
        user_profile_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_number: generate_order_number(),
            user_profile_id,
            shipping: shipping.normalized(),
            original_bag,
            stripe_pid,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLineItem {
    pub order_id: Uuid,
    pub product_id: i32,
    pub product_size: Option<String>,
    pub quantity: i32,
    pub lineitem_total: Decimal,
}

/// Random, unique, upper-case order number.
pub fn generate_order_number() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Case-insensitive match on every address field plus exact totals, bag and payment id.
    async fn find_matching_order(&self, lookup: &OrderLookup) -> Result<Option<Order>, StoreError>;

    async fn find_order_by_payment(&self, stripe_pid: &str) -> Result<Option<Order>, StoreError>;

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError>;

    async fn find_product(&self, product_id: i32) -> Result<Option<Product>, StoreError>;

    async fn find_profile_by_user(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError>;

    /// Writes the order, its lines and its totals atomically: either all of
    /// them become visible or none do. Fails with
    /// [`StoreError::DuplicatePayment`] when the payment id is already taken.
    async fn create_order(
        &self,
        order: &NewOrder,
        lines: &[NewLineItem],
        totals: &OrderTotals,
    ) -> Result<(Order, Vec<OrderLineItem>), StoreError>;

    async fn insert_line_item(&self, item: &NewLineItem) -> Result<OrderLineItem, StoreError>;

    /// Returns `false` when no such line item belongs to the order.
    async fn delete_line_item(&self, order_id: Uuid, line_item_id: Uuid) -> Result<bool, StoreError>;

    async fn line_items(&self, order_id: Uuid) -> Result<Vec<OrderLineItem>, StoreError>;

    async fn save_totals(&self, order_id: Uuid, totals: &OrderTotals) -> Result<Order, StoreError>;

    async fn save_profile_defaults(
        &self,
        profile_id: Uuid,
        shipping: &ShippingAddress,
    ) -> Result<(), StoreError>;
}

fn iexact(column: OrderCol, value: Option<&str>) -> SimpleExpr {
    match value {
        Some(v) => Expr::expr(Func::lower(Expr::col(column))).eq(Func::lower(Expr::val(v))),
        None => column.is_null(),
    }
}

async fn insert_order_row<C>(conn: &C, order: &NewOrder, totals: &OrderTotals) -> Result<Order, StoreError>
where
    C: ConnectionTrait,
{
    let shipping = order.shipping.clone();
    let active = OrderActive {
        id: Set(order.id),
        order_number: Set(order.order_number.clone()),
        user_profile_id: Set(order.user_profile_id),
        full_name: Set(shipping.full_name),
        email: Set(shipping.email),
        phone_number: Set(shipping.phone_number),
        country: Set(shipping.country),
        postcode: Set(shipping.postcode),
        town_or_city: Set(shipping.town_or_city),
        street_address1: Set(shipping.street_address1),
        street_address2: Set(shipping.street_address2),
        county: Set(shipping.county),
        date: NotSet,
        delivery_cost: Set(totals.delivery_cost),
        order_total: Set(totals.order_total),
        grand_total: Set(totals.grand_total),
        original_bag: Set(order.original_bag.clone()),
        stripe_pid: Set(order.stripe_pid.clone()),
    };

    match active.insert(conn).await {
        Ok(model) => Ok(Order::from(model)),
        Err(err) => match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) if detail.contains("stripe_pid") => {
                Err(StoreError::DuplicatePayment(order.stripe_pid.clone()))
            }
            _ => Err(err.into()),
        },
    }
}

async fn insert_line_item_row<C>(conn: &C, item: &NewLineItem) -> Result<OrderLineItem, StoreError>
where
    C: ConnectionTrait,
{
    let model = LineItemActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(item.order_id),
        product_id: Set(item.product_id),
        product_size: Set(item.product_size.clone()),
        quantity: Set(item.quantity),
        lineitem_total: Set(item.lineitem_total),
    }
    .insert(conn)
    .await?;
    Ok(OrderLineItem::from(model))
}

#[async_trait]
impl OrderStore for DatabaseConnection {
    async fn find_matching_order(&self, lookup: &OrderLookup) -> Result<Option<Order>, StoreError> {
        let shipping = &lookup.shipping;
        let condition = Condition::all()
            .add(iexact(OrderCol::FullName, Some(shipping.full_name.as_str())))
            .add(iexact(OrderCol::Email, Some(shipping.email.as_str())))
            .add(iexact(OrderCol::PhoneNumber, shipping.phone_number.as_deref()))
            .add(iexact(OrderCol::Country, shipping.country.as_deref()))
            .add(iexact(OrderCol::Postcode, shipping.postcode.as_deref()))
            .add(iexact(OrderCol::TownOrCity, shipping.town_or_city.as_deref()))
            .add(iexact(OrderCol::StreetAddress1, shipping.street_address1.as_deref()))
            .add(iexact(OrderCol::StreetAddress2, shipping.street_address2.as_deref()))
            .add(iexact(OrderCol::County, shipping.county.as_deref()))
            .add(OrderCol::GrandTotal.eq(lookup.grand_total))
            .add(OrderCol::OriginalBag.eq(lookup.original_bag.clone()))
            .add(OrderCol::StripePid.eq(lookup.stripe_pid.clone()));

        let order = Orders::find().filter(condition).one(self).await?;
        Ok(order.map(Order::from))
    }

    async fn find_order_by_payment(&self, stripe_pid: &str) -> Result<Option<Order>, StoreError> {
        let order = Orders::find()
            .filter(OrderCol::StripePid.eq(stripe_pid))
            .one(self)
            .await?;
        Ok(order.map(Order::from))
    }

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
        let order = Orders::find()
            .filter(OrderCol::OrderNumber.eq(order_number))
            .one(self)
            .await?;
        Ok(order.map(Order::from))
    }

    async fn find_product(&self, product_id: i32) -> Result<Option<Product>, StoreError> {
        let product = Products::find_by_id(product_id).one(self).await?;
        Ok(product.map(Product::from))
    }

    async fn find_profile_by_user(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let profile = UserProfiles::find()
            .filter(ProfileCol::UserId.eq(user_id))
            .one(self)
            .await?;
        Ok(profile.map(UserProfile::from))
    }

    async fn create_order(
        &self,
        order: &NewOrder,
        lines: &[NewLineItem],
        totals: &OrderTotals,
    ) -> Result<(Order, Vec<OrderLineItem>), StoreError> {
        // Rolled back on drop if any insert fails. A concurrent insert of the
        // same payment id blocks on the unique index until this commits.
        let txn = self.begin().await?;
        let created = insert_order_row(&txn, order, totals).await?;
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            items.push(insert_line_item_row(&txn, line).await?);
        }
        txn.commit().await?;
        Ok((created, items))
    }

    async fn insert_line_item(&self, item: &NewLineItem) -> Result<OrderLineItem, StoreError> {
        insert_line_item_row(self, item).await
    }

    async fn delete_line_item(&self, order_id: Uuid, line_item_id: Uuid) -> Result<bool, StoreError> {
        let result = OrderLineItems::delete_many()
            .filter(
                Condition::all()
                    .add(LineItemCol::OrderId.eq(order_id))
                    .add(LineItemCol::Id.eq(line_item_id)),
            )
            .exec(self)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn line_items(&self, order_id: Uuid) -> Result<Vec<OrderLineItem>, StoreError> {
        let items = OrderLineItems::find()
            .filter(LineItemCol::OrderId.eq(order_id))
            .order_by_asc(LineItemCol::ProductId)
            .order_by_asc(LineItemCol::ProductSize)
            .all(self)
            .await?
            .into_iter()
            .map(OrderLineItem::from)
            .collect();
        Ok(items)
    }

    async fn save_totals(&self, order_id: Uuid, totals: &OrderTotals) -> Result<Order, StoreError> {
        let model: orders::Model = OrderActive {
            id: Set(order_id),
            order_total: Set(totals.order_total),
            delivery_cost: Set(totals.delivery_cost),
            grand_total: Set(totals.grand_total),
            ..Default::default()
        }
        .update(self)
        .await?;
        Ok(Order::from(model))
    }

    async fn save_profile_defaults(
        &self,
        profile_id: Uuid,
        shipping: &ShippingAddress,
    ) -> Result<(), StoreError> {
        ProfileActive {
            id: Set(profile_id),
            default_phone_number: Set(shipping.phone_number.clone()),
            default_country: Set(shipping.country.clone()),
            default_postcode: Set(shipping.postcode.clone()),
            default_town_or_city: Set(shipping.town_or_city.clone()),
            default_street_address1: Set(shipping.street_address1.clone()),
            default_street_address2: Set(shipping.street_address2.clone()),
            default_county: Set(shipping.county.clone()),
            ..Default::default()
        }
        .update(self)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{DbBackend, QueryTrait};

    use super::*;

    #[test]
    fn order_numbers_are_upper_hex_and_unique() {
        let a = generate_order_number();
        let b = generate_order_number();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }

    #[test]
    fn new_order_normalizes_shipping() {
        let order = NewOrder::new(
            ShippingAddress {
                full_name: "Ann".into(),
                email: "ann@example.com".into(),
                county: Some("".into()),
                ..Default::default()
            },
            "{}".into(),
            "pi_1".into(),
            None,
        );
        assert_eq!(order.shipping.county, None);
    }

    #[test]
    fn address_match_lowercases_both_sides() {
        let sql = Orders::find()
            .filter(iexact(OrderCol::FullName, Some("Zoë Ångström")))
            .build(DbBackend::Postgres)
            .sql;
        assert_eq!(sql.matches("LOWER(").count(), 2, "{sql}");
    }

    #[test]
    fn missing_address_field_matches_null() {
        let sql = Orders::find()
            .filter(iexact(OrderCol::County, None))
            .build(DbBackend::Postgres)
            .sql;
        assert!(sql.contains("IS NULL"), "{sql}");
        assert!(!sql.contains("LOWER("), "{sql}");
    }
}

