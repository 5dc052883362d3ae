use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::engine::AccountSnapshot;
use crate::models::{validate_amount, validate_apr};

/// Whether the account may take new purchases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "loan_account_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanAccountStatus {
    Active,
    Suspended,
}

/// Revolving credit line owned by a user
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LoanAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub credit_limit: Decimal,
    /// Contractual APR before reward reductions
    pub base_apr: Decimal,
    /// Effective APR used for accrual
    pub apr: Decimal,
    pub current_balance: Decimal,
    pub due_date: DateTime<Utc>,
    pub last_accrued_at: DateTime<Utc>,
    pub status: LoanAccountStatus,
    pub opened_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanAccount {
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            balance: self.current_balance,
            apr: self.apr,
            due_date: self.due_date,
        }
    }

    pub fn available_credit(&self) -> Decimal {
        (self.credit_limit - self.current_balance).max(Decimal::ZERO)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLoanAccountRequest {
    pub user_id: Uuid,

    #[validate(custom = "validate_amount")]
    pub credit_limit: Decimal,

    /// Falls back to the user's APR
    #[validate(custom = "validate_apr")]
    pub apr: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateLoanAccountRequest {
    #[validate(custom = "validate_amount")]
    pub credit_limit: Option<Decimal>,

    /// New contractual APR; the effective APR is re-derived from it
    #[validate(custom = "validate_apr")]
    pub apr: Option<Decimal>,

    pub status: Option<LoanAccountStatus>,
}

/// Result of an interest accrual
#[derive(Debug, Serialize)]
pub struct InterestResult {
    pub loan_account_id: Uuid,
    pub days: i64,
    pub interest_charged: Decimal,
    pub new_balance: Decimal,
    pub transaction_id: Option<Uuid>,
}

/// Result of a late fee assessment
#[derive(Debug, Serialize)]
pub struct LateFeeResult {
    pub loan_account_id: Uuid,
    pub fee_charged: Decimal,
    pub reason: String,
    pub new_balance: Decimal,
    pub transaction_id: Option<Uuid>,
}

/// Result of applying interest and late fee together
#[derive(Debug, Serialize)]
pub struct ChargesResult {
    pub loan_account_id: Uuid,
    pub new_balance: Decimal,
    pub interest_charged: Decimal,
    pub fee_charged: Decimal,
    pub fee_reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(balance: Decimal, limit: Decimal) -> LoanAccount {
        let now = Utc::now();
        LoanAccount {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            credit_limit: limit,
            base_apr: dec!(25),
            apr: dec!(23),
            current_balance: balance,
            due_date: now,
            last_accrued_at: now,
            status: LoanAccountStatus::Active,
            opened_at: now,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_available_credit() {
        assert_eq!(account(dec!(250), dec!(1000)).available_credit(), dec!(750));
        assert_eq!(account(dec!(1200), dec!(1000)).available_credit(), dec!(0));
    }

    #[test]
    fn test_snapshot_uses_effective_apr() {
        let snapshot = account(dec!(10), dec!(100)).snapshot();
        assert_eq!(snapshot.apr, dec!(23));
        assert_eq!(snapshot.balance, dec!(10));
    }

    #[test]
    fn test_create_request_validation() {
        let request = CreateLoanAccountRequest {
            user_id: Uuid::new_v4(),
            credit_limit: dec!(0),
            apr: Some(dec!(19.99)),
        };
        assert!(request.validate().is_err());
    }
}
