use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod checkout;
pub mod doc;
pub mod health;
pub mod profile;
pub mod webhooks;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/checkout", checkout::router())
        .nest("/profile", profile::router())
        .nest("/webhooks", webhooks::router())
}
