use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgExecutor;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::audit::{self, AuditAction, AuditEntry};
use crate::config::LendingPolicy;
use crate::engine::{days_between, late_fee, Accrual, InterestCalculator, LateFeeAssessment, LateFeeHistory};
use crate::error::ApiError;
use crate::ledger::model::{Transaction, TransactionType};
use crate::ledger::poster::{post_in_tx, NewPosting};
use crate::loan_account::model::{
    ChargesResult, CreateLoanAccountRequest, InterestResult, LateFeeResult, LoanAccount,
    UpdateLoanAccountRequest,
};
use crate::reward::service::reconcile_tier;
use crate::user::model::AccountStatus;
use crate::user::service::fetch_live_user;

const ENTITY: &str = "LoanAccount";

/// Fetch an open loan account
pub(crate) async fn fetch_live_account<'e, E>(executor: E, id: Uuid) -> Result<LoanAccount, ApiError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, LoanAccount>(
        "SELECT * FROM loan_accounts WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| ApiError::not_found("Loan account", id))
}

/// Fetch and row-lock an open loan account for the rest of the transaction
pub(crate) async fn lock_live_account(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<LoanAccount, ApiError> {
    sqlx::query_as::<_, LoanAccount>(
        "SELECT * FROM loan_accounts WHERE id = $1 AND is_deleted = FALSE FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| ApiError::not_found("Loan account", id))
}

#[derive(Clone)]
pub struct LoanAccountService {
    db_pool: PgPool,
    policy: LendingPolicy,
    calculator: InterestCalculator,
}

impl LoanAccountService {
    pub fn new(db_pool: PgPool, policy: LendingPolicy) -> Self {
        let calculator = InterestCalculator::new(policy.interest_savings_horizon_days);
        Self {
            db_pool,
            policy,
            calculator,
        }
    }

    pub async fn open_account(
        &self,
        request: CreateLoanAccountRequest,
        client_ip: Option<&str>,
    ) -> Result<LoanAccount, ApiError> {
        request.validate()?;

        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;

        let user = fetch_live_user(&mut *tx, request.user_id).await?;
        if user.account_status != AccountStatus::Active {
            return Err(ApiError::ValidationError(format!(
                "User {} is not active",
                user.id
            )));
        }

        let base_apr = request.apr.unwrap_or(user.apr);
        let due_date = now + Duration::days(self.policy.billing_cycle_days);

        let account = sqlx::query_as::<_, LoanAccount>(
            r#"
            INSERT INTO loan_accounts (
                id, user_id, credit_limit, base_apr, apr, current_balance,
                due_date, last_accrued_at, status, opened_at, is_deleted,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $4, 0, $5, $6, 'active', $6, FALSE, $6, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(request.credit_limit)
        .bind(base_apr)
        .bind(due_date)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            AuditEntry::new(AuditAction::LoanAccountOpen, ENTITY, account.id)
                .user(user.id)
                .ip(client_ip)
                .details(format!(
                    "Credit limit {} at {}% APR",
                    account.credit_limit, account.base_apr
                )),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            loan_account_id = %account.id,
            user_id = %user.id,
            credit_limit = %account.credit_limit,
            apr = %account.apr,
            "Loan account opened"
        );

        Ok(account)
    }

    pub async fn get_account(&self, id: Uuid) -> Result<LoanAccount, ApiError> {
        fetch_live_account(&self.db_pool, id).await
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<LoanAccount>, ApiError> {
        fetch_live_user(&self.db_pool, user_id).await?;

        let accounts = sqlx::query_as::<_, LoanAccount>(
            r#"
            SELECT * FROM loan_accounts
            WHERE user_id = $1 AND is_deleted = FALSE
            ORDER BY opened_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(accounts)
    }

    pub async fn update_account(
        &self,
        id: Uuid,
        request: UpdateLoanAccountRequest,
        client_ip: Option<&str>,
    ) -> Result<LoanAccount, ApiError> {
        request.validate()?;

        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        let mut account = lock_live_account(&mut *tx, id).await?;

        if let Some(credit_limit) = request.credit_limit {
            if credit_limit < account.current_balance {
                return Err(ApiError::ValidationError(format!(
                    "Credit limit {} is below the outstanding balance {}",
                    credit_limit, account.current_balance
                )));
            }
            account.credit_limit = credit_limit;
        }
        let base_changed = match request.apr {
            Some(apr) if apr != account.base_apr => {
                account.base_apr = apr;
                true
            }
            _ => false,
        };
        if let Some(status) = request.status {
            account.status = status;
        }

        sqlx::query(
            r#"
            UPDATE loan_accounts
            SET credit_limit = $1, base_apr = $2, status = $3, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(account.credit_limit)
        .bind(account.base_apr)
        .bind(account.status)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        account.updated_at = now;

        if base_changed {
            // the effective APR follows the new base through the reward tier
            reconcile_tier(&mut *tx, &mut account, &self.policy.reward, now).await?;
        }

        audit::record(
            &mut *tx,
            AuditEntry::new(AuditAction::LoanAccountUpdate, ENTITY, id)
                .user(account.user_id)
                .ip(client_ip),
        )
        .await?;

        tx.commit().await?;

        Ok(account)
    }

    /// Soft delete. Only settled accounts can be closed; their cards are cancelled.
    pub async fn close_account(&self, id: Uuid, client_ip: Option<&str>) -> Result<(), ApiError> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        let account = lock_live_account(&mut *tx, id).await?;

        if !account.current_balance.is_zero() {
            return Err(ApiError::ValidationError(format!(
                "Loan account {} has an outstanding balance of {}",
                id, account.current_balance
            )));
        }

        sqlx::query("UPDATE loan_accounts SET is_deleted = TRUE, updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let cancelled = sqlx::query(
            r#"
            UPDATE cards SET status = 'cancelled', updated_at = $1
            WHERE loan_account_id = $2 AND status <> 'cancelled'
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        audit::record(
            &mut *tx,
            AuditEntry::new(AuditAction::LoanAccountClose, ENTITY, id)
                .user(account.user_id)
                .ip(client_ip)
                .details(format!("{} card(s) cancelled", cancelled)),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(loan_account_id = %id, cards_cancelled = cancelled, "Loan account closed");

        Ok(())
    }

    /// Accrue interest from `last_accrued_at` to `now` on a locked account
    async fn accrue_locked(
        &self,
        conn: &mut PgConnection,
        account: &mut LoanAccount,
        now: DateTime<Utc>,
    ) -> Result<(Accrual, Option<Transaction>), ApiError> {
        let days = days_between(account.last_accrued_at, now);
        let accrual = self.calculator.accrue(&account.snapshot(), days)?;

        let transaction = if accrual.interest.is_zero() {
            None
        } else {
            let posting = NewPosting::new(TransactionType::Interest, accrual.interest)
                .description(accrual.description.clone());
            Some(post_in_tx(&mut *conn, account, posting, now).await?)
        };

        if days > 0 {
            sqlx::query("UPDATE loan_accounts SET last_accrued_at = $1 WHERE id = $2")
                .bind(now)
                .bind(account.id)
                .execute(&mut *conn)
                .await?;
            account.last_accrued_at = now;
        }

        Ok((accrual, transaction))
    }

    async fn late_fee_history(
        &self,
        conn: &mut PgConnection,
        account: &LoanAccount,
        now: DateTime<Utc>,
    ) -> Result<LateFeeHistory, ApiError> {
        let window_start = now - Duration::days(self.policy.late_fee_window_days);

        let (fees_in_window, since_due): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE posted_at > $2),
                COUNT(*) FILTER (WHERE posted_at > $3)
            FROM transactions
            WHERE loan_account_id = $1 AND is_late_fee
            "#,
        )
        .bind(account.id)
        .bind(window_start)
        .bind(account.due_date)
        .fetch_one(conn)
        .await?;

        Ok(LateFeeHistory {
            fees_in_window,
            charged_for_current_due_date: since_due > 0,
        })
    }

    /// Assess and post a late fee on a locked account
    async fn assess_fee_locked(
        &self,
        conn: &mut PgConnection,
        account: &mut LoanAccount,
        now: DateTime<Utc>,
    ) -> Result<(LateFeeAssessment, Option<Transaction>), ApiError> {
        let history = self.late_fee_history(&mut *conn, account, now).await?;
        let assessment = late_fee::assess(
            &account.snapshot(),
            now,
            self.policy.late_fee,
            self.policy.max_late_fees,
            history,
        )?;

        if !assessment.is_charged() {
            return Ok((assessment, None));
        }

        let posting = NewPosting::new(TransactionType::Fee, assessment.fee)
            .description(format!(
                "{} (due {})",
                assessment.reason,
                account.due_date.format("%Y-%m-%d")
            ))
            .late_fee();
        let transaction = post_in_tx(&mut *conn, account, posting, now).await?;

        Ok((assessment, Some(transaction)))
    }

    pub async fn apply_interest(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        client_ip: Option<&str>,
    ) -> Result<InterestResult, ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let mut account = lock_live_account(&mut *tx, id).await?;

        if days_between(account.last_accrued_at, now) == 0 {
            return Err(ApiError::Conflict(format!(
                "Interest already applied today for loan account {}",
                id
            )));
        }

        let (accrual, transaction) = self.accrue_locked(&mut *tx, &mut account, now).await?;

        audit::record(
            &mut *tx,
            AuditEntry::new(AuditAction::InterestApply, ENTITY, id)
                .user(account.user_id)
                .ip(client_ip)
                .details(format!("{}: {}", accrual.description, accrual.interest)),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            loan_account_id = %id,
            days = accrual.days,
            interest = %accrual.interest,
            new_balance = %account.current_balance,
            "Interest applied"
        );

        Ok(InterestResult {
            loan_account_id: id,
            days: accrual.days,
            interest_charged: accrual.interest,
            new_balance: account.current_balance,
            transaction_id: transaction.map(|t| t.id),
        })
    }

    pub async fn apply_late_fee(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        client_ip: Option<&str>,
    ) -> Result<LateFeeResult, ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let mut account = lock_live_account(&mut *tx, id).await?;

        let (assessment, transaction) = self.assess_fee_locked(&mut *tx, &mut account, now).await?;

        if assessment.is_charged() {
            audit::record(
                &mut *tx,
                AuditEntry::new(AuditAction::LateFeeApply, ENTITY, id)
                    .user(account.user_id)
                    .ip(client_ip)
                    .details(format!("Late fee of {}", assessment.fee)),
            )
            .await?;

            tracing::info!(loan_account_id = %id, fee = %assessment.fee, "Late fee applied");
        }

        tx.commit().await?;

        Ok(LateFeeResult {
            loan_account_id: id,
            fee_charged: assessment.fee,
            reason: assessment.reason,
            new_balance: account.current_balance,
            transaction_id: transaction.map(|t| t.id),
        })
    }

    /// Interest then late fee, in one unit of work
    pub async fn apply_charges(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        client_ip: Option<&str>,
    ) -> Result<ChargesResult, ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let mut account = lock_live_account(&mut *tx, id).await?;

        let interest_due = days_between(account.last_accrued_at, now) > 0;
        let (accrual, _) = self.accrue_locked(&mut *tx, &mut account, now).await?;
        let (assessment, _) = self.assess_fee_locked(&mut *tx, &mut account, now).await?;

        if !interest_due && !assessment.is_charged() {
            return Err(ApiError::Conflict(format!(
                "No charges due for loan account {}: interest already applied today; {}",
                id,
                assessment.reason.to_lowercase()
            )));
        }

        audit::record(
            &mut *tx,
            AuditEntry::new(AuditAction::InterestApply, ENTITY, id)
                .user(account.user_id)
                .ip(client_ip)
                .details(format!(
                    "Interest {} and fee {}",
                    accrual.interest, assessment.fee
                )),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            loan_account_id = %id,
            interest = %accrual.interest,
            fee = %assessment.fee,
            new_balance = %account.current_balance,
            "Charges applied"
        );

        Ok(ChargesResult {
            loan_account_id: id,
            new_balance: account.current_balance,
            interest_charged: accrual.interest,
            fee_charged: assessment.fee,
            fee_reason: assessment.reason,
        })
    }
}
