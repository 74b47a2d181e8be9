//! Webhook event payloads, reduced to the fields the storefront reads.

use std::collections::HashMap;

use serde::Deserialize;

use crate::models::ShippingAddress;

use super::confirmation::{
    CheckoutMetadata, METADATA_BAG, METADATA_SAVE_INFO, METADATA_USERNAME, PaymentConfirmation,
    UserRef, parse_flag,
};

pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_INTENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PaymentIntentSucceeded,
    PaymentIntentFailed,
    Other,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn kind(&self) -> EventKind {
        match self.event_type.as_str() {
            PAYMENT_INTENT_SUCCEEDED => EventKind::PaymentIntentSucceeded,
            PAYMENT_INTENT_PAYMENT_FAILED => EventKind::PaymentIntentFailed,
            _ => EventKind::Other,
        }
    }

    pub fn payment_intent(&self) -> Result<PaymentIntent, serde_json::Error> {
        PaymentIntent::deserialize(&self.data.object)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Address {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Shipping {
    pub name: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Address,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingDetails {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Address,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    pub id: String,
    /// Amount actually captured, in minor units.
    pub amount: Option<i64>,
    #[serde(default)]
    pub billing_details: BillingDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargeList {
    #[serde(default)]
    pub data: Vec<Charge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub shipping: Option<Shipping>,
    pub latest_charge: Option<String>,
    pub charges: Option<ChargeList>,
}

impl PaymentIntent {
    /// Charge embedded in the event, when the API version still includes it.
    pub fn embedded_charge(&self) -> Option<&Charge> {
        self.charges.as_ref().and_then(|list| list.data.first())
    }

    /// Build the confirmation the reconciler consumes from this intent and its charge.
    pub fn into_confirmation(self, charge: Option<&Charge>) -> Result<PaymentConfirmation, String> {
        let shipping = self
            .shipping
            .ok_or_else(|| "payment intent has no shipping details".to_string())?;
        let email = charge
            .and_then(|c| c.billing_details.email.clone())
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| "charge has no billing email".to_string())?;
        let full_name = shipping
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| "shipping details have no name".to_string())?;

        let bag = self
            .metadata
            .get(METADATA_BAG)
            .cloned()
            .ok_or_else(|| "metadata has no bag".to_string())?;
        let user = UserRef::parse(self.metadata.get(METADATA_USERNAME).map(String::as_str))?;
        let save_info = parse_flag(self.metadata.get(METADATA_SAVE_INFO).map(String::as_str));

        let address = shipping.address;
        let shipping = ShippingAddress {
            full_name,
            email,
            phone_number: shipping.phone,
            country: address.country,
            postcode: address.postal_code,
            town_or_city: address.city,
            street_address1: address.line1,
            street_address2: address.line2,
            county: address.state,
        }
        .normalized();

        Ok(PaymentConfirmation {
            payment_id: self.id,
            shipping,
            amount: charge.and_then(|c| c.amount).unwrap_or(self.amount),
            metadata: CheckoutMetadata {
                bag,
                save_info,
                user,
            },
        })
    }
}
