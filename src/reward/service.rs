use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::audit::{self, AuditAction, AuditEntry};
use crate::config::RewardPolicy;
use crate::engine::{RepaymentOutcome, RewardTier};
use crate::error::ApiError;
use crate::loan_account::model::LoanAccount;
use crate::models::{PaginatedResponse, PaginationParams};
use crate::reward::model::{AccountReward, RewardAdjustment, RewardCheckResult};
use crate::user::service::fetch_live_user;

fn adjustment_reason(tier: &RewardTier, old_apr: Decimal) -> String {
    if tier.apr < old_apr {
        format!(
            "Reward tier {} reached: APR lowered from {}% to {}%",
            tier.level,
            old_apr.normalize(),
            tier.apr.normalize()
        )
    } else {
        format!(
            "APR recalculated at reward tier {}: {}% to {}%",
            tier.level,
            old_apr.normalize(),
            tier.apr.normalize()
        )
    }
}

/// Recompute the reward tier of a locked account from its repayment history
///
/// When the effective APR differs from the stored one, the account is updated
/// and a [`RewardAdjustment`] is appended on the same connection.
pub async fn reconcile_tier(
    conn: &mut PgConnection,
    account: &mut LoanAccount,
    policy: &RewardPolicy,
    now: DateTime<Utc>,
) -> Result<(RewardTier, Option<RewardAdjustment>), ApiError> {
    let history: Vec<(bool, Decimal)> = sqlx::query_as(
        r#"
        SELECT on_time, percentage_of_balance FROM repayments
        WHERE loan_account_id = $1
        ORDER BY applied_at ASC, id ASC
        "#,
    )
    .bind(account.id)
    .fetch_all(&mut *conn)
    .await?;

    let tier = RewardTier::from_history(
        account.base_apr,
        history
            .into_iter()
            .map(|(on_time, percentage_of_balance)| RepaymentOutcome {
                on_time,
                percentage_of_balance,
            }),
        policy,
    )?;

    if tier.apr == account.apr {
        return Ok((tier, None));
    }

    let old_apr = account.apr;

    sqlx::query("UPDATE loan_accounts SET apr = $1, updated_at = $2 WHERE id = $3")
        .bind(tier.apr)
        .bind(now)
        .bind(account.id)
        .execute(&mut *conn)
        .await?;

    let adjustment = sqlx::query_as::<_, RewardAdjustment>(
        r#"
        INSERT INTO reward_adjustments (
            id, user_id, loan_account_id, old_apr, new_apr, tier_level, reason, adjusted_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(account.user_id)
    .bind(account.id)
    .bind(old_apr)
    .bind(tier.apr)
    .bind(tier.level as i32)
    .bind(adjustment_reason(&tier, old_apr))
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    audit::record(
        &mut *conn,
        AuditEntry::new(AuditAction::AprAdjust, "LoanAccount", account.id)
            .user(account.user_id)
            .details(adjustment.reason.clone()),
    )
    .await?;

    account.apr = tier.apr;
    account.updated_at = now;

    tracing::info!(
        loan_account_id = %account.id,
        old_apr = %old_apr,
        new_apr = %tier.apr,
        tier_level = tier.level,
        "Effective APR adjusted"
    );

    Ok((tier, Some(adjustment)))
}

#[derive(Clone)]
pub struct RewardService {
    db_pool: PgPool,
    policy: RewardPolicy,
}

impl RewardService {
    pub fn new(db_pool: PgPool, policy: RewardPolicy) -> Self {
        Self { db_pool, policy }
    }

    /// Recompute the tier of every open account of a user
    pub async fn check_rewards(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RewardCheckResult, ApiError> {
        let mut tx = self.db_pool.begin().await?;

        fetch_live_user(&mut *tx, user_id).await?;

        let accounts = sqlx::query_as::<_, LoanAccount>(
            r#"
            SELECT * FROM loan_accounts
            WHERE user_id = $1 AND is_deleted = FALSE
            ORDER BY opened_at ASC
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut results = Vec::with_capacity(accounts.len());
        for mut account in accounts {
            let (tier, adjustment) =
                reconcile_tier(&mut *tx, &mut account, &self.policy, now).await?;
            results.push(AccountReward {
                loan_account_id: account.id,
                repayments_to_next_level: tier.repayments_to_next_level(&self.policy),
                at_floor: tier.is_at_floor(&self.policy),
                tier,
                adjustment,
            });
        }

        tx.commit().await?;

        Ok(RewardCheckResult {
            user_id,
            accounts: results,
        })
    }

    /// APR adjustments across a user's accounts, newest first
    pub async fn reward_history(
        &self,
        user_id: Uuid,
        params: &PaginationParams,
    ) -> Result<PaginatedResponse<RewardAdjustment>, ApiError> {
        fetch_live_user(&self.db_pool, user_id).await?;

        let (page, limit, offset) = params.resolve();

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reward_adjustments WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.db_pool)
                .await?;

        let data = sqlx::query_as::<_, RewardAdjustment>(
            r#"
            SELECT * FROM reward_adjustments
            WHERE user_id = $1
            ORDER BY adjusted_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(PaginatedResponse {
            data,
            total,
            page,
            limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_adjustment_reason() {
        let tier = RewardTier {
            level: 1,
            streak: 0,
            base_apr: dec!(25),
            apr: dec!(23.0000),
        };
        assert_eq!(
            adjustment_reason(&tier, dec!(25.0000)),
            "Reward tier 1 reached: APR lowered from 25% to 23%"
        );

        let raised = RewardTier { apr: dec!(27), base_apr: dec!(27), ..tier };
        assert!(adjustment_reason(&raised, dec!(23)).starts_with("APR recalculated"));
    }
}
