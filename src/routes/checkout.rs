use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dto::{
        checkout::{
            CacheCheckoutRequest, CheckoutCached, CheckoutRequest, CheckoutResponse,
            PaymentIntentRequest, PaymentIntentResponse,
        },
        orders::OrderWithItems,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::checkout_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout))
        .route("/intent", post(create_intent))
        .route("/cache", post(cache_checkout_data))
        .route("/success/{order_number}", get(checkout_success))
}

#[utoipa::path(
    post,
    path = "/api/checkout/intent",
    request_body = PaymentIntentRequest,
    responses(
        (status = 200, description = "Payment intent for the bag's grand total", body = ApiResponse<PaymentIntentResponse>),
        (status = 400, description = "Empty bag or unknown product")
    ),
    tag = "Checkout"
)]
pub async fn create_intent(
    State(state): State<AppState>,
    Json(payload): Json<PaymentIntentRequest>,
) -> AppResult<Json<ApiResponse<PaymentIntentResponse>>> {
    let resp = checkout_service::create_intent(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/checkout/cache",
    request_body = CacheCheckoutRequest,
    responses(
        (status = 200, description = "Checkout metadata attached to the payment intent", body = ApiResponse<CheckoutCached>),
        (status = 400, description = "Payment cannot be processed right now")
    ),
    security(
        (),
        ("bearer_auth" = [])
    ),
    tag = "Checkout"
)]
pub async fn cache_checkout_data(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Json(payload): Json<CacheCheckoutRequest>,
) -> AppResult<Json<ApiResponse<CheckoutCached>>> {
    let resp =
        checkout_service::cache_checkout_data(&state, user.map(|u| u.user_id), payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Order created, or the one already recorded for this payment", body = ApiResponse<CheckoutResponse>),
        (status = 400, description = "Invalid form or unknown product")
    ),
    security(
        (),
        ("bearer_auth" = [])
    ),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<ApiResponse<CheckoutResponse>>> {
    let resp = checkout_service::submit_checkout(&state, user.map(|u| u.user_id), payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/checkout/success/{order_number}",
    params(
        ("order_number" = String, Path, description = "Order number")
    ),
    responses(
        (status = 200, description = "Completed order", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found")
    ),
    tag = "Checkout"
)]
pub async fn checkout_success(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = checkout_service::checkout_success(&state, &order_number).await?;
    Ok(Json(resp))
}
