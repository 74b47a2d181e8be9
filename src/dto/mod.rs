pub mod auth;
pub mod checkout;
pub mod orders;
pub mod profile;
pub mod webhooks;
