use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub event_type: String,
    pub order_number: Option<String>,
    /// Whether this delivery created the order. `None` for events that touch no order.
    pub created: Option<bool>,
}
