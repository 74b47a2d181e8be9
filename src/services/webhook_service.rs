//! Payment webhook handling.
//!
//! A successful payment is reported twice: by the buyer's browser submitting
//! the checkout form, and by the gateway's webhook. Either may arrive first.
//! [`reconcile_payment`] guarantees exactly one fully formed order per
//! payment: it first waits for the checkout request to commit, and only
//! rebuilds the order from the payment metadata when that never happens.
//! The unique `stripe_pid` column settles any remaining race.

use chrono::Utc;
use thiserror::Error;

use crate::{
    audit,
    bag::BagSnapshot,
    config::{DeliveryConfig, LookupPolicy},
    dto::{orders::OrderWithItems, webhooks::WebhookAck},
    error::{AppError, AppResult},
    models::Order,
    payments::{
        EventKind, PaymentConfirmation, WebhookEvent,
        signature::{DEFAULT_TOLERANCE_SECS, verify_signature},
    },
    response::{ApiResponse, Meta},
    services::{
        email_service::OrderMailer,
        order_service::{self, BuildError},
    },
    state::AppState,
    store::{NewOrder, OrderLookup, OrderStore, StoreError},
};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("unparseable confirmation: {0}")]
    Payload(String),

    #[error("Product {0} not found")]
    ProductNotFound(i32),

    #[error("payment {0} is recorded on an order that does not match its confirmation")]
    ConflictingOrder(String),

    #[error("persistence fault: {0}")]
    Persistence(#[from] StoreError),
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Payload(msg) => AppError::PayloadUnparseable(msg),
            ReconcileError::ProductNotFound(id) => AppError::ProductNotFound(id),
            err @ ReconcileError::ConflictingOrder(_) => AppError::PersistenceFault(err.to_string()),
            ReconcileError::Persistence(err) => AppError::PersistenceFault(err.to_string()),
        }
    }
}

#[derive(Debug)]
pub enum Reconciliation {
    /// The checkout request had already stored the order.
    AlreadyExisted(Order),
    /// The order was rebuilt from the payment metadata.
    Created(OrderWithItems),
}

impl Reconciliation {
    pub fn order(&self) -> &Order {
        match self {
            Self::AlreadyExisted(order) => order,
            Self::Created(built) => &built.order,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

pub async fn reconcile_payment<S, M>(
    store: &S,
    mailer: &M,
    delivery: &DeliveryConfig,
    policy: LookupPolicy,
    confirmation: PaymentConfirmation,
) -> Result<Reconciliation, ReconcileError>
where
    S: OrderStore + ?Sized,
    M: OrderMailer + ?Sized,
{
    let bag = BagSnapshot::parse(&confirmation.metadata.bag)
        .map_err(|e| ReconcileError::Payload(e.to_string()))?;

    let lookup = OrderLookup {
        shipping: confirmation.shipping.clone().normalized(),
        grand_total: confirmation.grand_total(),
        original_bag: confirmation.metadata.bag.clone(),
        stripe_pid: confirmation.payment_id.clone(),
    };

    if let Some(order) = find_with_retry(store, &lookup, policy).await? {
        tracing::info!(
            payment_id = %lookup.stripe_pid,
            order_number = %order.order_number,
            "verified order already in database"
        );
        send_confirmation(mailer, &order).await;
        return Ok(Reconciliation::AlreadyExisted(order));
    }

    let profile = match confirmation.metadata.user.user_id() {
        Some(user_id) => {
            let profile = store.find_profile_by_user(user_id).await?;
            if profile.is_none() {
                tracing::warn!(%user_id, "no profile for user named in payment metadata");
            }
            profile
        }
        None => None,
    };

    let draft = NewOrder::new(
        lookup.shipping.clone(),
        lookup.original_bag.clone(),
        lookup.stripe_pid.clone(),
        profile.as_ref().map(|p| p.id),
    );

    tracing::info!(payment_id = %lookup.stripe_pid, "order not found, creating from payment metadata");
    let built = match order_service::create_order_from_bag(store, &draft, &bag, delivery).await {
        Ok(built) => built,
        Err(BuildError::Store(StoreError::DuplicatePayment(payment_id))) => {
            // The checkout request committed after our last lookup. Only an
            // order that matches the confirmation in full counts as verified.
            let Some(order) = store.find_matching_order(&lookup).await? else {
                tracing::error!(%payment_id, "payment already holds an order that does not match");
                return Err(ReconcileError::ConflictingOrder(payment_id));
            };
            send_confirmation(mailer, &order).await;
            return Ok(Reconciliation::AlreadyExisted(order));
        }
        Err(BuildError::ProductNotFound(id)) => return Err(ReconcileError::ProductNotFound(id)),
        Err(BuildError::Store(err)) => return Err(ReconcileError::Persistence(err)),
        Err(err @ (BuildError::EmptyBag | BuildError::InvalidQuantity(_))) => {
            return Err(ReconcileError::Payload(err.to_string()));
        }
    };

    if confirmation.metadata.save_info {
        if let Some(profile) = &profile {
            if let Err(err) = store
                .save_profile_defaults(profile.id, &built.order.shipping)
                .await
            {
                tracing::warn!(profile_id = %profile.id, error = %err, "saving profile defaults failed");
            }
        }
    }

    send_confirmation(mailer, &built.order).await;
    Ok(Reconciliation::Created(built))
}

async fn find_with_retry<S>(
    store: &S,
    lookup: &OrderLookup,
    policy: LookupPolicy,
) -> Result<Option<Order>, StoreError>
where
    S: OrderStore + ?Sized,
{
    for attempt in 1..=policy.attempts {
        if let Some(order) = store.find_matching_order(lookup).await? {
            return Ok(Some(order));
        }
        tracing::debug!(attempt, payment_id = %lookup.stripe_pid, "order not found yet");
        if attempt < policy.attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }
    Ok(None)
}

async fn send_confirmation<M>(mailer: &M, order: &Order)
where
    M: OrderMailer + ?Sized,
{
    if let Err(err) = mailer.send_order_confirmation(order).await {
        tracing::warn!(order_number = %order.order_number, error = %err, "confirmation email failed");
    }
}

/// Check the signature header and decode the event.
pub fn authenticate(payload: &[u8], signature: Option<&str>, secret: &str) -> AppResult<WebhookEvent> {
    let signature = signature.ok_or(AppError::SignatureInvalid)?;
    verify_signature(
        payload,
        signature,
        secret,
        Utc::now().timestamp(),
        DEFAULT_TOLERANCE_SECS,
    )
    .map_err(|err| {
        tracing::warn!(error = %err, "webhook signature rejected");
        AppError::SignatureInvalid
    })?;

    WebhookEvent::parse(payload).map_err(|e| AppError::PayloadUnparseable(e.to_string()))
}

pub async fn handle_event(
    state: &AppState,
    event: WebhookEvent,
) -> AppResult<ApiResponse<WebhookAck>> {
    tracing::info!(event_id = %event.id, event_type = %event.event_type, "webhook received");

    audit::record(
        &state.pool,
        None,
        "webhook_received",
        "payments",
        serde_json::json!({ "event_id": event.id, "type": event.event_type }),
    )
    .await;

    match acknowledge_without_order(&event) {
        Some(ack) => Ok(ack),
        None => handle_payment_succeeded(state, &event).await,
    }
}

/// The acknowledgement for event kinds that never touch orders; `None` for a
/// successful payment, which must be reconciled first.
pub fn acknowledge_without_order(event: &WebhookEvent) -> Option<ApiResponse<WebhookAck>> {
    match event.kind() {
        EventKind::PaymentIntentSucceeded => None,
        EventKind::PaymentIntentFailed => Some(acknowledge(event, "Webhook received", None)),
        EventKind::Other => Some(acknowledge(event, "Unhandled webhook received", None)),
    }
}

async fn handle_payment_succeeded(
    state: &AppState,
    event: &WebhookEvent,
) -> AppResult<ApiResponse<WebhookAck>> {
    let intent = event
        .payment_intent()
        .map_err(|e| AppError::PayloadUnparseable(e.to_string()))?;

    let charge = match (intent.embedded_charge(), intent.latest_charge.as_deref()) {
        (Some(charge), _) => Some(charge.clone()),
        (None, Some(charge_id)) => Some(
            state
                .stripe
                .retrieve_charge(charge_id)
                .await
                .map_err(|e| AppError::Internal(e.into()))?,
        ),
        (None, None) => None,
    };

    let confirmation = intent
        .into_confirmation(charge.as_ref())
        .map_err(AppError::PayloadUnparseable)?;

    let outcome = reconcile_payment(
        &state.orm,
        &state.email,
        &state.config.delivery,
        state.config.lookup,
        confirmation,
    )
    .await
    .map_err(|err| {
        tracing::error!(event_id = %event.id, error = %err, "order reconciliation failed");
        AppError::from(err)
    })?;

    let message = if outcome.created() {
        "Webhook received: created order in webhook"
    } else {
        "Webhook received: verified order already in database"
    };
    Ok(acknowledge(event, message, Some(&outcome)))
}

fn acknowledge(
    event: &WebhookEvent,
    message: &str,
    outcome: Option<&Reconciliation>,
) -> ApiResponse<WebhookAck> {
    ApiResponse::success(
        format!("{message}: {}", event.event_type),
        WebhookAck {
            event_type: event.event_type.clone(),
            order_number: outcome.map(|o| o.order().order_number.clone()),
            created: outcome.map(Reconciliation::created),
        },
        Some(Meta::empty()),
    )
}
