use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{order_line_items, orders, products, user_profiles, users};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: i32,
    pub sku: Option<String>,
    pub name: String,
    pub price: Decimal,
    pub has_sizes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub default_phone_number: Option<String>,
    pub default_country: Option<String>,
    pub default_postcode: Option<String>,
    pub default_town_or_city: Option<String>,
    pub default_street_address1: Option<String>,
    pub default_street_address2: Option<String>,
    pub default_county: Option<String>,
}

/// Delivery address captured on an order.
///
/// Optional fields are `None` rather than empty strings so they compare
/// equal to database NULLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddress {
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub country: Option<String>,
    pub postcode: Option<String>,
    pub town_or_city: Option<String>,
    pub street_address1: Option<String>,
    pub street_address2: Option<String>,
    pub county: Option<String>,
}

impl ShippingAddress {
    /// Trim every field and turn blank optional values into `None`.
    pub fn normalized(self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone_number: blank_to_none(self.phone_number),
            country: blank_to_none(self.country),
            postcode: blank_to_none(self.postcode),
            town_or_city: blank_to_none(self.town_or_city),
            street_address1: blank_to_none(self.street_address1),
            street_address2: blank_to_none(self.street_address2),
            county: blank_to_none(self.county),
        }
    }
}

pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_profile_id: Option<Uuid>,
    #[serde(flatten)]
    pub shipping: ShippingAddress,
    pub date: DateTime<Utc>,
    pub delivery_cost: Decimal,
    pub order_total: Decimal,
    pub grand_total: Decimal,
    pub original_bag: String,
    pub stripe_pid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderLineItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: i32,
    pub product_size: Option<String>,
    pub quantity: i32,
    pub lineitem_total: Decimal,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            password_hash: model.password_hash,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<products::Model> for Product {
    fn from(model: products::Model) -> Self {
        Self {
            id: model.id,
            sku: model.sku,
            name: model.name,
            price: model.price,
            has_sizes: model.has_sizes,
        }
    }
}

impl From<user_profiles::Model> for UserProfile {
    fn from(model: user_profiles::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            default_phone_number: model.default_phone_number,
            default_country: model.default_country,
            default_postcode: model.default_postcode,
            default_town_or_city: model.default_town_or_city,
            default_street_address1: model.default_street_address1,
            default_street_address2: model.default_street_address2,
            default_county: model.default_county,
        }
    }
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Self {
            id: model.id,
            order_number: model.order_number,
            user_profile_id: model.user_profile_id,
            shipping: ShippingAddress {
                full_name: model.full_name,
                email: model.email,
                phone_number: model.phone_number,
                country: model.country,
                postcode: model.postcode,
                town_or_city: model.town_or_city,
                street_address1: model.street_address1,
                street_address2: model.street_address2,
                county: model.county,
            },
            date: model.date.with_timezone(&Utc),
            delivery_cost: model.delivery_cost,
            order_total: model.order_total,
            grand_total: model.grand_total,
            original_bag: model.original_bag,
            stripe_pid: model.stripe_pid,
        }
    }
}

impl From<order_line_items::Model> for OrderLineItem {
    fn from(model: order_line_items::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            product_size: model.product_size,
            quantity: model.quantity,
            lineitem_total: model.lineitem_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_turns_blank_fields_into_none() {
        let address = ShippingAddress {
            full_name: " Jane Doe ".into(),
            email: "jane@example.com".into(),
            phone_number: Some("".into()),
            country: Some("GB".into()),
            postcode: Some("   ".into()),
            town_or_city: Some("London".into()),
            street_address1: Some("1 High St".into()),
            street_address2: Some(String::new()),
            county: None,
        }
        .normalized();

        assert_eq!(address.full_name, "Jane Doe");
        assert_eq!(address.phone_number, None);
        assert_eq!(address.postcode, None);
        assert_eq!(address.street_address2, None);
        assert_eq!(address.country.as_deref(), Some("GB"));
    }
}
