use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{bag::BagSnapshot, dto::orders::OrderWithItems, totals::BagTotals};

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentIntentRequest {
    pub bag: BagSnapshot,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentIntentResponse {
    pub client_secret: String,
    pub stripe_public_key: String,
    pub currency: String,
    pub bag: BagTotals,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CacheCheckoutRequest {
    pub client_secret: String,
    pub bag: BagSnapshot,
    #[serde(default)]
    pub save_info: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutCached {
    pub payment_id: String,
}

/// Order form submitted once the client has confirmed the card payment.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub client_secret: String,
    pub bag: BagSnapshot,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub country: Option<String>,
    pub postcode: Option<String>,
    pub town_or_city: Option<String>,
    pub street_address1: Option<String>,
    pub street_address2: Option<String>,
    pub county: Option<String>,
    #[serde(default)]
    pub save_info: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    #[serde(flatten)]
    pub order: OrderWithItems,
    /// True when the payment webhook had already recorded this order.
    pub already_processed: bool,
}
