use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::engine::RepaymentOption;
use crate::models::validate_amount;
use crate::reward::model::RewardAdjustment;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "repayment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RepaymentMethod {
    Auto,
    #[default]
    Manual,
}

/// Repayment row, linked to its ledger entry
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Repayment {
    pub id: Uuid,
    pub loan_account_id: Uuid,
    pub transaction_id: Uuid,
    pub amount: Decimal,
    pub method: RepaymentMethod,
    pub percentage_of_balance: Decimal,
    pub interest_saved: Decimal,
    pub on_time: bool,
    pub reference: Option<String>,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRepaymentRequest {
    pub loan_account_id: Uuid,

    #[validate(custom = "validate_amount")]
    pub amount: Decimal,

    #[serde(default)]
    pub method: RepaymentMethod,

    /// Client reference; a second repayment with the same one is rejected
    #[validate(length(min = 1, max = 64))]
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RepaymentResult {
    pub repayment_id: Uuid,
    pub loan_account_id: Uuid,
    pub transaction_id: Uuid,
    pub amount: Decimal,
    pub percentage_of_balance: Decimal,
    pub interest_saved: Decimal,
    pub on_time: bool,
    pub new_balance: Decimal,
    pub apr: Decimal,
    pub due_date: DateTime<Utc>,
    pub reward: Option<RewardAdjustment>,
}

#[derive(Debug, Serialize)]
pub struct RepaymentOptions {
    pub loan_account_id: Uuid,
    pub current_balance: Decimal,
    pub current_apr: Decimal,
    pub horizon_days: i64,
    pub options: Vec<RepaymentOption>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_method_defaults_to_manual() {
        let request: CreateRepaymentRequest = serde_json::from_value(serde_json::json!({
            "loan_account_id": Uuid::nil(),
            "amount": "25.00"
        }))
        .unwrap();
        assert_eq!(request.method, RepaymentMethod::Manual);
        assert_eq!(request.amount, dec!(25.00));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_empty_reference_is_rejected() {
        let request = CreateRepaymentRequest {
            loan_account_id: Uuid::nil(),
            amount: dec!(10),
            method: RepaymentMethod::Auto,
            reference: Some(String::new()),
        };
        assert!(request.validate().is_err());
    }
}
