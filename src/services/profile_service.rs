use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    dto::{
        orders::OrderWithItems,
        profile::{ProfileWithOrders, UpdateProfileRequest},
    },
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        user_profiles::ActiveModel as ProfileActive,
    },
    error::{AppError, AppResult},
    models::{Order, UserProfile, blank_to_none},
    response::{ApiResponse, Meta},
    services::order_service,
    state::AppState,
    store::OrderStore,
};

async fn profile_for(state: &AppState, user_id: Uuid) -> AppResult<UserProfile> {
    state
        .orm
        .find_profile_by_user(user_id)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn get_profile(
    state: &AppState,
    user_id: Uuid,
) -> AppResult<ApiResponse<ProfileWithOrders>> {
    let profile = profile_for(state, user_id).await?;

    let orders: Vec<Order> = Orders::find()
        .filter(OrderCol::UserProfileId.eq(profile.id))
        .order_by_desc(OrderCol::Date)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::listing(orders.len());
    Ok(ApiResponse::success(
        "Ok",
        ProfileWithOrders { profile, orders },
        Some(meta),
    ))
}

pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<UserProfile>> {
    let profile = profile_for(state, user_id).await?;

    let updated = ProfileActive {
        id: Set(profile.id),
        default_phone_number: Set(blank_to_none(payload.default_phone_number)),
        default_country: Set(blank_to_none(payload.default_country)),
        default_postcode: Set(blank_to_none(payload.default_postcode)),
        default_town_or_city: Set(blank_to_none(payload.default_town_or_city)),
        default_street_address1: Set(blank_to_none(payload.default_street_address1)),
        default_street_address2: Set(blank_to_none(payload.default_street_address2)),
        default_county: Set(blank_to_none(payload.default_county)),
        ..Default::default()
    }
    .update(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Profile updated successfully",
        UserProfile::from(updated),
        Some(Meta::empty()),
    ))
}

/// A past order confirmation. Orders of other profiles are reported as missing.
pub async fn order_history(
    state: &AppState,
    user_id: Uuid,
    order_number: &str,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let profile = profile_for(state, user_id).await?;
    let order = order_service::find_by_number(&state.orm, order_number)
        .await?
        .filter(|found| found.order.user_profile_id == Some(profile.id))
        .ok_or(AppError::NotFound)?;

    let message = format!(
        "This is a past confirmation for order number {}. A confirmation email was sent on the order date.",
        order.order.order_number
    );
    Ok(ApiResponse::success(message, order, Some(Meta::empty())))
}
