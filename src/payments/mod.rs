pub mod confirmation;
pub mod event;
pub mod signature;
pub mod stripe;

pub use confirmation::{CheckoutMetadata, PaymentConfirmation, UserRef};
pub use event::{EventKind, WebhookEvent};
pub use stripe::{GatewayError, StripeClient};
