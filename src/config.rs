use std::{env, str::FromStr, time::Duration};

use anyhow::Context;
use rust_decimal::Decimal;
use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub store_name: String,
    pub delivery: DeliveryConfig,
    pub stripe: StripeConfig,
    pub email: Option<EmailConfig>,
    pub lookup: LookupPolicy,
}

/// Pricing settings shared by bag totals and order totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    pub free_delivery_threshold: Decimal,
    pub standard_delivery_percentage: Decimal,
    pub currency: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            free_delivery_threshold: Decimal::from(50),
            standard_delivery_percentage: Decimal::from(10),
            currency: "usd".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub public_key: String,
    pub secret_key: SecretString,
    pub webhook_secret: SecretString,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
}

/// How long the webhook waits for the checkout request to commit its order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let store_name = env::var("STORE_NAME").unwrap_or_else(|_| "Storefront".to_string());

        let defaults = DeliveryConfig::default();
        let delivery = DeliveryConfig {
            free_delivery_threshold: parse_or("FREE_DELIVERY_THRESHOLD", defaults.free_delivery_threshold)?,
            standard_delivery_percentage: parse_or(
                "STANDARD_DELIVERY_PERCENTAGE",
                defaults.standard_delivery_percentage,
            )?,
            currency: env::var("STRIPE_CURRENCY").unwrap_or(defaults.currency),
        };

        let stripe = StripeConfig {
            public_key: env::var("STRIPE_PUBLIC_KEY").unwrap_or_default(),
            secret_key: SecretString::from(env::var("STRIPE_SECRET_KEY").unwrap_or_default()),
            webhook_secret: SecretString::from(env::var("STRIPE_WH_SECRET").unwrap_or_default()),
            api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string()),
        };

        let email = match env::var("SMTP_HOST") {
            Ok(smtp_host) => Some(EmailConfig {
                smtp_host,
                smtp_port: parse_or("SMTP_PORT", 587)?,
                smtp_username: env::var("SMTP_USERNAME").unwrap_or_default(),
                smtp_password: SecretString::from(env::var("SMTP_PASSWORD").unwrap_or_default()),
                from_address: env::var("DEFAULT_FROM_EMAIL")
                    .context("DEFAULT_FROM_EMAIL is required when SMTP_HOST is set")?,
            }),
            Err(_) => None,
        };

        let lookup_defaults = LookupPolicy::default();
        let lookup = LookupPolicy {
            attempts: parse_or("WH_LOOKUP_ATTEMPTS", lookup_defaults.attempts)?.max(1),
            delay: env::var("WH_LOOKUP_DELAY_MS")
                .ok()
                .and_then(|ms| ms.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(lookup_defaults.delay),
        };

        Ok(Self {
            port,
            database_url,
            host,
            store_name,
            delivery,
            stripe,
            email,
            lookup,
        })
    }

    /// Address customers are told to reply to in confirmation emails.
    pub fn contact_email(&self) -> String {
        self.email
            .as_ref()
            .map(|email| email.from_address.clone())
            .unwrap_or_else(|| "orders@localhost".to_string())
    }
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}")),
        _ => Ok(default),
    }
}
