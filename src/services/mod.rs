pub mod auth_service;
pub mod checkout_service;
pub mod email_service;
pub mod order_service;
pub mod profile_service;
pub mod webhook_service;
