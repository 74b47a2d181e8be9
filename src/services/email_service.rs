//! Transactional email for order confirmations.
//!
//! Uses SMTP via lettre with askama text templates. Without SMTP settings the
//! rendered message is written to the log instead.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::{config::EmailConfig, models::Order};

#[derive(Template)]
#[template(path = "email/confirmation_subject.txt")]
struct ConfirmationSubject<'a> {
    order: &'a Order,
    store_name: &'a str,
}

#[derive(Template)]
#[template(path = "email/confirmation_body.txt")]
struct ConfirmationBody<'a> {
    order: &'a Order,
    store_name: &'a str,
    contact_email: &'a str,
    address: String,
    phone: &'a str,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Sends the customer-facing confirmation for a completed order.
#[async_trait]
pub trait OrderMailer: Send + Sync {
    async fn send_order_confirmation(&self, order: &Order) -> Result<(), EmailError>;
}

pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

#[derive(Clone)]
pub struct EmailService {
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
    store_name: String,
    contact_email: String,
}

impl EmailService {
    pub fn new(
        config: Option<&EmailConfig>,
        store_name: String,
        contact_email: String,
    ) -> Result<Self, SmtpError> {
        let (mailer, from_address) = match config {
            Some(config) => {
                let credentials = Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.expose_secret().to_string(),
                );
                let mailer =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                        .port(config.smtp_port)
                        .credentials(credentials)
                        .build();
                (Some(mailer), config.from_address.clone())
            }
            None => (None, contact_email.clone()),
        };

        Ok(Self {
            mailer,
            from_address,
            store_name,
            contact_email,
        })
    }

    pub fn render_confirmation(&self, order: &Order) -> Result<RenderedEmail, EmailError> {
        let subject = ConfirmationSubject {
            order,
            store_name: &self.store_name,
        }
        .render()?;
        let body = ConfirmationBody {
            order,
            store_name: &self.store_name,
            contact_email: &self.contact_email,
            address: format_address(order),
            phone: order.shipping.phone_number.as_deref().unwrap_or("-"),
        }
        .render()?;

        Ok(RenderedEmail {
            subject: subject.trim().to_string(),
            body,
        })
    }

    async fn send_text_email(&self, to: &str, email: RenderedEmail) -> Result<(), EmailError> {
        let Some(mailer) = &self.mailer else {
            tracing::info!(to = %to, subject = %email.subject, body = %email.body, "SMTP not configured, email logged");
            return Ok(());
        };

        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)?;

        mailer.send(message).await?;

        tracing::info!(to = %to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

#[async_trait]
impl OrderMailer for EmailService {
    async fn send_order_confirmation(&self, order: &Order) -> Result<(), EmailError> {
        let email = self.render_confirmation(order)?;
        self.send_text_email(&order.shipping.email, email).await
    }
}

fn format_address(order: &Order) -> String {
    let s = &order.shipping;
    [
        s.street_address1.as_deref(),
        s.street_address2.as_deref(),
        s.town_or_city.as_deref(),
        s.county.as_deref(),
        s.postcode.as_deref(),
        s.country.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShippingAddress;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn order() -> Order {
        Order {
            id: Uuid::new_v4(),
            order_number: "ABC123".into(),
            user_profile_id: None,
            shipping: ShippingAddress {
                full_name: "Jane Doe".into(),
                email: "jane@example.com".into(),
                street_address1: Some("1 High St".into()),
                town_or_city: Some("London".into()),
                country: Some("GB".into()),
                ..Default::default()
            },
            date: Utc::now(),
            delivery_cost: Decimal::new(400, 2),
            order_total: Decimal::new(4000, 2),
            grand_total: Decimal::new(4400, 2),
            original_bag: "{}".into(),
            stripe_pid: "pi_1".into(),
        }
    }

    #[test]
    fn renders_confirmation() {
        let service =
            EmailService::new(None, "Boutique".into(), "help@example.com".into()).expect("service");
        let email = service.render_confirmation(&order()).expect("rendered");

        assert_eq!(email.subject, "Boutique Confirmation for Order Number ABC123");
        assert!(email.body.contains("Hello Jane Doe!"));
        assert!(email.body.contains("Grand Total: $44.00"));
        assert!(email.body.contains("1 High St, London, GB"));
        assert!(email.body.contains("help@example.com"));
    }

    #[tokio::test]
    async fn logs_instead_of_sending_without_smtp() {
        let service =
            EmailService::new(None, "Boutique".into(), "help@example.com".into()).expect("service");
        service
            .send_order_confirmation(&order())
            .await
            .expect("logged");
    }
}
