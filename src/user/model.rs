use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::validate_apr;

/// KYC verification state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "kyc_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Pending,
    Verified,
    Rejected,
}

/// Customer account state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Closed,
}

/// User row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub kyc_status: KycStatus,
    pub account_status: AccountStatus,
    /// APR offered on new loan accounts
    pub apr: Decimal,
    pub hashed_password: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User as returned by the API, without credentials
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub kyc_status: KycStatus,
    pub account_status: AccountStatus,
    pub apr: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            kyc_status: user.kyc_status,
            account_status: user.account_status,
            apr: user.apr,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 5, max = 32))]
    pub phone: Option<String>,

    #[validate(length(min = 8, max = 72))]
    pub password: String,

    pub kyc_status: Option<KycStatus>,

    pub account_status: Option<AccountStatus>,

    #[validate(custom = "validate_apr")]
    pub apr: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(min = 5, max = 32))]
    pub phone: Option<String>,

    #[validate(length(min = 8, max = 72))]
    pub password: Option<String>,

    pub kyc_status: Option<KycStatus>,

    pub account_status: Option<AccountStatus>,

    #[validate(custom = "validate_apr")]
    pub apr: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> CreateUserRequest {
        CreateUserRequest {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            password: "correct horse".to_string(),
            kyc_status: None,
            account_status: None,
            apr: None,
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_email_and_short_password() {
        let bad = CreateUserRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            ..request()
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_rejects_zero_apr() {
        let bad = CreateUserRequest { apr: Some(dec!(0)), ..request() };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_response_hides_password() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            phone: None,
            kyc_status: KycStatus::Pending,
            account_status: AccountStatus::Active,
            apr: dec!(25),
            hashed_password: "$2b$12$hash".into(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        let body = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(body.get("hashed_password").is_none());
        assert_eq!(body["kyc_status"], "pending");
    }
}
