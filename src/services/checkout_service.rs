use uuid::Uuid;

use crate::{
    audit,
    bag::BagSnapshot,
    config::DeliveryConfig,
    dto::{
        checkout::{
            CacheCheckoutRequest, CheckoutCached, CheckoutRequest, CheckoutResponse, PaymentIntentRequest,
            PaymentIntentResponse,
        },
        orders::OrderWithItems,
    },
    error::{AppError, AppResult},
    models::ShippingAddress,
    payments::{CheckoutMetadata, UserRef, stripe::payment_id_from_client_secret},
    response::{ApiResponse, Meta},
    services::order_service::{self, BuildError},
    state::AppState,
    store::{NewOrder, OrderStore, StoreError},
    totals::{BagTotals, to_minor_units},
};

const PRODUCT_MISSING: &str =
    "One of the products in your bag wasn't found in our database. Please call us for assistance!";
const PAYMENT_UNAVAILABLE: &str =
    "Sorry, your payment cannot be processed right now. Please try again later.";

/// Price every bag line against the catalog.
pub async fn price_bag<S>(
    store: &S,
    bag: &BagSnapshot,
    delivery: &DeliveryConfig,
) -> AppResult<BagTotals>
where
    S: OrderStore + ?Sized,
{
    bag.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if bag.is_empty() {
        return Err(AppError::BadRequest(
            "There's nothing in your bag at the moment".into(),
        ));
    }

    let mut priced = Vec::new();
    for line in bag.lines() {
        let product = store
            .find_product(line.product_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::BadRequest(PRODUCT_MISSING.into()))?;
        priced.push((line, product));
    }
    Ok(BagTotals::compute(priced, delivery))
}

pub async fn create_intent(
    state: &AppState,
    payload: PaymentIntentRequest,
) -> AppResult<ApiResponse<PaymentIntentResponse>> {
    let totals = price_bag(&state.orm, &payload.bag, &state.config.delivery).await?;
    let amount = to_minor_units(totals.grand_total)
        .ok_or_else(|| AppError::BadRequest("Order total is out of range".into()))?;
    let currency = state.config.delivery.currency.clone();

    let intent = state
        .stripe
        .create_payment_intent(amount, &currency)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    let client_secret = intent.client_secret.ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("payment intent {} has no client secret", intent.id))
    })?;

    tracing::info!(payment_id = %intent.id, amount, "payment intent created");
    Ok(ApiResponse::success(
        "Payment intent created",
        PaymentIntentResponse {
            client_secret,
            stripe_public_key: state.stripe.public_key().to_string(),
            currency,
            bag: totals,
        },
        Some(Meta::empty()),
    ))
}

/// Attach the bag, save-info flag and buyer to the intent so the webhook can
/// rebuild the order on its own.
pub async fn cache_checkout_data(
    state: &AppState,
    user_id: Option<Uuid>,
    payload: CacheCheckoutRequest,
) -> AppResult<ApiResponse<CheckoutCached>> {
    let payment_id = payment_id_from_client_secret(&payload.client_secret)
        .ok_or_else(|| AppError::BadRequest("Invalid client secret".into()))?;
    let metadata = CheckoutMetadata {
        bag: payload.bag.to_json(),
        save_info: payload.save_info,
        user: UserRef::from(user_id),
    };

    state
        .stripe
        .modify_payment_intent(payment_id, &metadata)
        .await
        .map_err(|err| {
            tracing::warn!(%payment_id, error = %err, "caching checkout data failed");
            AppError::BadRequest(PAYMENT_UNAVAILABLE.into())
        })?;

    Ok(ApiResponse::success(
        "Checkout data cached",
        CheckoutCached {
            payment_id: payment_id.to_string(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn submit_checkout(
    state: &AppState,
    user_id: Option<Uuid>,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    let CheckoutRequest {
        client_secret,
        bag,
        full_name,
        email,
        phone_number,
        country,
        postcode,
        town_or_city,
        street_address1,
        street_address2,
        county,
        save_info,
    } = payload;

    let payment_id = payment_id_from_client_secret(&client_secret)
        .ok_or_else(|| AppError::BadRequest("Invalid client secret".into()))?
        .to_string();
    bag.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let shipping = ShippingAddress {
        full_name,
        email,
        phone_number,
        country,
        postcode,
        town_or_city,
        street_address1,
        street_address2,
        county,
    }
    .normalized();
    if shipping.full_name.is_empty() || shipping.email.is_empty() {
        return Err(AppError::BadRequest(
            "There was an error with your form. Please double check your information.".into(),
        ));
    }

    let store = &state.orm;
    let profile = match user_id {
        Some(user_id) => store.find_profile_by_user(user_id).await?,
        None => None,
    };

    let draft = NewOrder::new(shipping, bag.to_json(), payment_id.clone(), profile.as_ref().map(|p| p.id));
    let (order, already_processed) =
        match order_service::create_order_from_bag(store, &draft, &bag, &state.config.delivery).await {
            Ok(built) => (built, false),
            Err(BuildError::Store(StoreError::DuplicatePayment(_))) => {
                tracing::info!(%payment_id, "order already recorded by the payment webhook");
                (load_by_payment(store, &payment_id).await?, true)
            }
            Err(BuildError::ProductNotFound(product_id)) => {
                tracing::warn!(product_id, %payment_id, "checkout referenced an unknown product");
                return Err(AppError::BadRequest(PRODUCT_MISSING.into()));
            }
            Err(err) => return Err(err.into()),
        };

    if save_info && !already_processed {
        if let Some(profile) = &profile {
            store
                .save_profile_defaults(profile.id, &order.order.shipping)
                .await?;
        }
    }

    audit::record(
        &state.pool,
        user_id,
        "order_checkout",
        "orders",
        serde_json::json!({
            "order_number": order.order.order_number,
            "already_processed": already_processed,
        }),
    )
    .await;

    Ok(ApiResponse::success(
        format!(
            "Order successfully processed! Your order number is {}.",
            order.order.order_number
        ),
        CheckoutResponse {
            order,
            already_processed,
        },
        Some(Meta::empty()),
    ))
}

async fn load_by_payment<S>(store: &S, payment_id: &str) -> AppResult<OrderWithItems>
where
    S: OrderStore + ?Sized,
{
    let order = store
        .find_order_by_payment(payment_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let items = store.line_items(order.id).await?;
    Ok(OrderWithItems { order, items })
}

pub async fn checkout_success(
    state: &AppState,
    order_number: &str,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = order_service::find_by_number(&state.orm, order_number)
        .await?
        .ok_or(AppError::NotFound)?;
    let message = format!(
        "Order successfully processed! Your order number is {}. A confirmation email will be sent to {}.",
        order.order.order_number, order.order.shipping.email
    );
    Ok(ApiResponse::success(message, order, Some(Meta::empty())))
}
