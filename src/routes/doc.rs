use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    bag::{BagEntry, BagSnapshot},
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        checkout::{
            CacheCheckoutRequest, CheckoutCached, CheckoutRequest, CheckoutResponse,
            PaymentIntentRequest, PaymentIntentResponse,
        },
        orders::OrderWithItems,
        profile::{ProfileWithOrders, UpdateProfileRequest},
        webhooks::WebhookAck,
    },
    models::{Order, OrderLineItem, Product, ShippingAddress, User, UserProfile},
    response::{ApiResponse, Meta},
    routes::{auth, checkout, health, profile, webhooks},
    totals::{BagItem, BagTotals, OrderTotals},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness,
        auth::login,
        auth::register,
        checkout::create_intent,
        checkout::cache_checkout_data,
        checkout::checkout,
        checkout::checkout_success,
        profile::get_profile,
        profile::update_profile,
        profile::order_history,
        webhooks::stripe_webhook
    ),
    components(
        schemas(
            User,
            UserProfile,
            Product,
            ShippingAddress,
            Order,
            OrderLineItem,
            OrderTotals,
            BagEntry,
            BagSnapshot,
            BagItem,
            BagTotals,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            PaymentIntentRequest,
            PaymentIntentResponse,
            CacheCheckoutRequest,
            CheckoutCached,
            CheckoutRequest,
            CheckoutResponse,
            OrderWithItems,
            ProfileWithOrders,
            UpdateProfileRequest,
            WebhookAck,
            Meta,
            ApiResponse<OrderWithItems>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<ProfileWithOrders>,
            ApiResponse<WebhookAck>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Checkout", description = "Payment intent and order submission"),
        (name = "Profile", description = "Default delivery details and order history"),
        (name = "Webhooks", description = "Payment gateway callbacks"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
