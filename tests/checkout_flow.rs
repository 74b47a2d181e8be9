mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use axum_storefront_api::{
    bag::BagSnapshot,
    config::{AppConfig, DeliveryConfig, LookupPolicy, StripeConfig},
    db::{create_pool, orm_from_pool, run_migrations},
    dto::{auth::RegisterRequest, checkout::CheckoutRequest},
    entity::products::ActiveModel as ProductActive,
    payments::{StripeClient, UserRef},
    services::{
        auth_service, checkout_service, email_service::EmailService, profile_service,
        webhook_service::reconcile_payment,
    },
    state::AppState,
};
use common::{RecordingMailer, confirmation, d, no_wait};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, Set};
use secrecy::SecretString;
use uuid::Uuid;

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = orm_from_pool(pool.clone());
    run_migrations(&orm).await?;

    let config = AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        store_name: "Test Store".into(),
        delivery: DeliveryConfig::default(),
        stripe: StripeConfig {
            public_key: "pk_test".into(),
            secret_key: SecretString::from("sk_test"),
            webhook_secret: SecretString::from("whsec_test"),
            api_base: "http://127.0.0.1:9".into(),
        },
        email: None,
        lookup: LookupPolicy::default(),
    };

    Ok(AppState {
        email: EmailService::new(None, config.store_name.clone(), config.contact_email())?,
        stripe: StripeClient::new(&config.stripe),
        pool,
        orm,
        config: Arc::new(config),
    })
}

async fn create_product(state: &AppState, price: &str) -> anyhow::Result<i32> {
    let product = ProductActive {
        id: NotSet,
        sku: Set(None),
        name: Set(format!("Test product {}", Uuid::new_v4())),
        description: Set(None),
        price: Set(price.parse::<Decimal>()?),
        has_sizes: Set(false),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

fn checkout_form(payment_id: &str, bag: BagSnapshot, save_info: bool) -> CheckoutRequest {
    CheckoutRequest {
        client_secret: format!("{payment_id}_secret_test"),
        bag,
        full_name: "Jane Doe".into(),
        email: "jane@example.com".into(),
        phone_number: Some("0123456789".into()),
        country: Some("GB".into()),
        postcode: Some("SW1A 1AA".into()),
        town_or_city: Some("London".into()),
        street_address1: Some("1 High Street".into()),
        street_address2: Some("".into()),
        county: None,
        save_info,
    }
}

// Checkout request and payment webhook race for the same payment; exactly one order survives.
#[tokio::test]
async fn checkout_then_webhook_produces_one_order() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let registered = auth_service::register_user(
        &state,
        RegisterRequest {
            email: format!("buyer-{}@example.com", Uuid::new_v4()),
            password: "secret123".into(),
        },
    )
    .await?;
    let user_id = registered.data.expect("user").id;

    let flat = create_product(&state, "10.00").await?;
    let sized = create_product(&state, "20.00").await?;
    let raw_bag = format!(r#"{{"{flat}": 2, "{sized}": {{"items_by_size": {{"M": 1, "L": 3}}}}}}"#);
    let bag = BagSnapshot::parse(&raw_bag)?;

    let payment_id = format!("pi_{}", Uuid::new_v4().simple());
    let submitted = checkout_service::submit_checkout(
        &state,
        Some(user_id),
        checkout_form(&payment_id, bag.clone(), true),
    )
    .await?
    .data
    .expect("checkout data");

    assert!(!submitted.already_processed);
    assert_eq!(submitted.order.items.len(), 3);
    assert_eq!(submitted.order.order.grand_total, d("100.00"));
    assert_eq!(submitted.order.order.shipping.street_address2, None);

    // Redelivery of the same form is answered with the stored order.
    let again = checkout_service::submit_checkout(
        &state,
        Some(user_id),
        checkout_form(&payment_id, bag.clone(), true),
    )
    .await?
    .data
    .expect("checkout data");
    assert!(again.already_processed);
    assert_eq!(again.order.order.id, submitted.order.order.id);

    // The webhook finds the order instead of building a second one.
    let mailer = RecordingMailer::default();
    let outcome = reconcile_payment(
        &state.orm,
        &mailer,
        &state.config.delivery,
        no_wait(2),
        confirmation(&payment_id, &bag.to_json(), 10_000, UserRef::User(user_id), true),
    )
    .await?;
    assert!(!outcome.created());
    assert_eq!(outcome.order().id, submitted.order.order.id);
    assert_eq!(mailer.sent().len(), 1);

    let profile = profile_service::get_profile(&state, user_id)
        .await?
        .data
        .expect("profile");
    assert_eq!(profile.profile.default_town_or_city.as_deref(), Some("London"));
    assert!(profile.orders.iter().any(|o| o.id == submitted.order.order.id));

    let history = profile_service::order_history(&state, user_id, &submitted.order.order.order_number)
        .await?
        .data
        .expect("order");
    assert_eq!(history.items.len(), 3);

    let stranger = Uuid::new_v4();
    let err = profile_service::order_history(&state, stranger, &submitted.order.order.order_number)
        .await
        .expect_err("not the stranger's order");
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn checkout_with_unknown_product_persists_nothing() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests.");
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;
    let known = create_product(&state, "5.00").await?;
    let bag = BagSnapshot::parse(&format!(r#"{{"{known}": 1, "{}": 1}}"#, i32::MAX))?;
    let payment_id = format!("pi_{}", Uuid::new_v4().simple());

    let err = checkout_service::submit_checkout(&state, None, checkout_form(&payment_id, bag, false))
        .await
        .expect_err("unknown product");
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let leftover: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE stripe_pid = $1")
        .bind(&payment_id)
        .fetch_optional(&state.pool)
        .await?;
    assert!(leftover.is_none());
    Ok(())
}
