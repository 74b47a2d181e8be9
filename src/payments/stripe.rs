//! Minimal Stripe REST client for the checkout flow.

use std::collections::BTreeMap;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::instrument;

use crate::config::StripeConfig;

use super::{
    confirmation::{CheckoutMetadata, METADATA_BAG, METADATA_SAVE_INFO, METADATA_USERNAME},
    event::{Charge, PaymentIntent},
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected request ({status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: SecretString,
    webhook_secret: SecretString,
    public_key: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            public_key: config.public_key.clone(),
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn webhook_secret(&self) -> &str {
        self.webhook_secret.expose_secret()
    }

    #[instrument(skip(self))]
    pub async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let params = [
            ("amount", amount.to_string()),
            ("currency", currency.to_string()),
        ];
        self.post("payment_intents", &params).await
    }

    /// Attach checkout metadata to an intent before the client confirms it.
    #[instrument(skip(self, metadata))]
    pub async fn modify_payment_intent(
        &self,
        payment_id: &str,
        metadata: &CheckoutMetadata,
    ) -> Result<PaymentIntent, GatewayError> {
        let params: BTreeMap<String, String> = BTreeMap::from([
            (format!("metadata[{METADATA_BAG}]"), metadata.bag.clone()),
            (
                format!("metadata[{METADATA_SAVE_INFO}]"),
                metadata.save_info.to_string(),
            ),
            (format!("metadata[{METADATA_USERNAME}]"), metadata.user.to_string()),
        ]);
        self.post(&format!("payment_intents/{payment_id}"), &params)
            .await
    }

    #[instrument(skip(self))]
    pub async fn retrieve_charge(&self, charge_id: &str) -> Result<Charge, GatewayError> {
        let url = format!("{}/charges/{charge_id}", self.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post<T, P>(&self, path: &str, params: &P) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        P: serde::Serialize + ?Sized,
    {
        let url = format!("{}/{path}", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(params)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let message = response
            .json::<ApiErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error.message)
            .unwrap_or_else(|| status.to_string());
        tracing::warn!(status = status.as_u16(), %message, "gateway request rejected");
        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// The intent id is the part of a client secret before `_secret_`.
pub fn payment_id_from_client_secret(client_secret: &str) -> Option<&str> {
    client_secret
        .split_once("_secret")
        .map(|(id, _)| id)
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_payment_id() {
        assert_eq!(payment_id_from_client_secret("pi_123_secret_abc"), Some("pi_123"));
        assert_eq!(payment_id_from_client_secret("pi_123"), None);
        assert_eq!(payment_id_from_client_secret("_secret_abc"), None);
    }
}
