use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, UserProfile};

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileWithOrders {
    pub profile: UserProfile,
    pub orders: Vec<Order>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub default_phone_number: Option<String>,
    pub default_country: Option<String>,
    pub default_postcode: Option<String>,
    pub default_town_or_city: Option<String>,
    pub default_street_address1: Option<String>,
    pub default_street_address2: Option<String>,
    pub default_county: Option<String>,
}
