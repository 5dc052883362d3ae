use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::engine::RewardTier;

/// Append-only record of an effective APR change
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RewardAdjustment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub loan_account_id: Uuid,
    pub old_apr: Decimal,
    pub new_apr: Decimal,
    pub tier_level: i32,
    pub reason: String,
    pub adjusted_at: DateTime<Utc>,
}

/// Reward standing of one loan account
#[derive(Debug, Serialize)]
pub struct AccountReward {
    pub loan_account_id: Uuid,
    pub tier: RewardTier,
    pub repayments_to_next_level: u32,
    pub at_floor: bool,
    /// Present when this check changed the APR
    pub adjustment: Option<RewardAdjustment>,
}

#[derive(Debug, Serialize)]
pub struct RewardCheckResult {
    pub user_id: Uuid,
    pub accounts: Vec<AccountReward>,
}
