use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifetime of a shopper session token.
pub const SESSION_HOURS: i64 = 24;

/// Shopper sign-up. Creates the account and its empty profile.
#[derive(Deserialize, Debug, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "shopper@example.com")]
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "shopper@example.com")]
    pub email: String,
    pub password: String,
}

/// Emails are compared lower-cased and trimmed everywhere.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Sent back as `Authorization: Bearer <token>`.
    pub token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT body. `sub` is the user id, `exp` and `iat` are unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_session(user_id: Uuid, issued_at: DateTime<Utc>) -> Self {
        Self {
            sub: user_id,
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::hours(SESSION_HOURS)).timestamp(),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_claims_expire_a_day_after_issue() {
        let issued = Utc::now();
        let user_id = Uuid::new_v4();
        let claims = Claims::for_session(user_id, issued);
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.exp - claims.iat, SESSION_HOURS * 3600);
        assert_eq!(
            claims.expires_at().map(|at| at.timestamp()),
            Some(claims.exp)
        );
    }

    #[test]
    fn claims_carry_the_user_id_as_a_string_subject() {
        let user_id = Uuid::new_v4();
        let json = serde_json::to_value(Claims::for_session(user_id, Utc::now())).unwrap();
        assert_eq!(json["sub"], user_id.to_string());
        assert!(json["exp"].is_i64());
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Shopper@Example.COM "), "shopper@example.com");
    }
}
