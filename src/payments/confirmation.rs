use std::fmt;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{models::ShippingAddress, totals::from_minor_units};

/// Metadata value used for guests.
pub const ANONYMOUS_USER: &str = "AnonymousUser";

pub const METADATA_BAG: &str = "bag";
pub const METADATA_SAVE_INFO: &str = "save_info";
pub const METADATA_USERNAME: &str = "username";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRef {
    Anonymous,
    User(Uuid),
}

impl UserRef {
    pub fn parse(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::trim) {
            None | Some("") | Some(ANONYMOUS_USER) => Ok(Self::Anonymous),
            Some(value) => Uuid::parse_str(value)
                .map(Self::User)
                .map_err(|_| format!("unknown user identifier {value:?}")),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(*id),
        }
    }
}

impl From<Option<Uuid>> for UserRef {
    fn from(value: Option<Uuid>) -> Self {
        value.map_or(Self::Anonymous, Self::User)
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str(ANONYMOUS_USER),
            Self::User(id) => write!(f, "{id}"),
        }
    }
}

/// Metadata the checkout attaches to the payment intent before confirming it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutMetadata {
    /// Serialized bag snapshot, kept verbatim for the order lookup.
    pub bag: String,
    pub save_info: bool,
    pub user: UserRef,
}

/// Payment succeeded notification, already authenticated and decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentConfirmation {
    pub payment_id: String,
    pub shipping: ShippingAddress,
    /// Charge amount in minor currency units.
    pub amount: i64,
    pub metadata: CheckoutMetadata,
}

impl PaymentConfirmation {
    pub fn grand_total(&self) -> Decimal {
        from_minor_units(self.amount)
    }
}

pub fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "on" | "1" | "yes")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_reference() {
        assert_eq!(UserRef::parse(None), Ok(UserRef::Anonymous));
        assert_eq!(UserRef::parse(Some("AnonymousUser")), Ok(UserRef::Anonymous));
        assert_eq!(UserRef::parse(Some("")), Ok(UserRef::Anonymous));

        let id = Uuid::new_v4();
        assert_eq!(UserRef::parse(Some(&id.to_string())), Ok(UserRef::User(id)));
        assert!(UserRef::parse(Some("bob")).is_err());
        assert_eq!(UserRef::User(id).to_string(), id.to_string());
    }

    #[test]
    fn parses_save_info_flag() {
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("True")));
        assert!(parse_flag(Some("on")));
        assert!(!parse_flag(Some("false")));
        assert!(!parse_flag(None));
    }
}
