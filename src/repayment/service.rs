//! Repayment allocator
//!
//! A repayment posts a ledger entry, rolls the due date, records how the
//! payment counts towards rewards and re-derives the effective APR, all inside
//! one database transaction holding the account row lock.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::audit::{self, AuditAction, AuditEntry};
use crate::config::LendingPolicy;
use crate::engine::{is_on_time, next_due_date, InterestCalculator};
use crate::error::ApiError;
use crate::ledger::model::{Transaction, TransactionType};
use crate::ledger::poster::{post_in_tx, NewPosting};
use crate::loan_account::model::LoanAccount;
use crate::loan_account::service::{fetch_live_account, lock_live_account};
use crate::models::{PaginatedResponse, PaginationParams};
use crate::repayment::model::{
    CreateRepaymentRequest, Repayment, RepaymentMethod, RepaymentOptions, RepaymentResult,
};
use crate::reward::model::RewardAdjustment;
use crate::reward::service::reconcile_tier;

/// Share of `balance` covered by `amount`, as a percentage with 4 decimals
pub fn percentage_of_balance(amount: Decimal, balance: Decimal) -> Decimal {
    if balance <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (amount / balance * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// Amount a repayment may take off `balance`; anything above it is refused
pub fn check_repayment_amount(amount: Decimal, balance: Decimal) -> Result<(), ApiError> {
    if balance.is_zero() {
        return Err(ApiError::ValidationError(
            "Loan account has no outstanding balance".to_string(),
        ));
    }
    if amount > balance {
        return Err(ApiError::ValidationError(format!(
            "Repayment of {} exceeds outstanding balance of {}",
            amount, balance
        )));
    }
    Ok(())
}

/// A repayment about to be applied to a locked account
#[derive(Debug, Clone)]
pub struct NewRepayment<'a> {
    pub amount: Decimal,
    pub method: RepaymentMethod,
    pub reference: Option<&'a str>,
    /// Ledger description; defaults to the method and share of balance
    pub description: Option<String>,
}

/// What [`allocate_in_tx`] wrote
#[derive(Debug)]
pub struct AppliedRepayment {
    pub transaction: Transaction,
    pub repayment: Repayment,
    pub reward: Option<RewardAdjustment>,
}

/// Apply a repayment to an account locked on `conn`
///
/// Posts the ledger entry, rolls the due date, records the repayment row and
/// re-derives the reward tier. Every repayment, whichever endpoint it arrives
/// through, goes through here. The caller owns the commit.
pub async fn allocate_in_tx(
    conn: &mut PgConnection,
    account: &mut LoanAccount,
    repayment: NewRepayment<'_>,
    policy: &LendingPolicy,
    now: DateTime<Utc>,
) -> Result<AppliedRepayment, ApiError> {
    if let Some(reference) = repayment.reference {
        let seen: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM repayments WHERE loan_account_id = $1 AND reference = $2",
        )
        .bind(account.id)
        .bind(reference)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(repayment_id) = seen {
            return Err(ApiError::Conflict(format!(
                "Repayment with reference '{}' was already applied as {}",
                reference, repayment_id
            )));
        }
    }

    check_repayment_amount(repayment.amount, account.current_balance)?;

    let percentage = percentage_of_balance(repayment.amount, account.current_balance);
    let interest_saved = InterestCalculator::new(policy.interest_savings_horizon_days)
        .interest_savings(account.apr, repayment.amount);
    let on_time = is_on_time(account.due_date, now);

    let description = repayment.description.unwrap_or_else(|| {
        format!("Repayment ({:?}), {}% of balance", repayment.method, percentage.normalize())
    });
    let posting = NewPosting::new(TransactionType::Repayment, repayment.amount).description(description);
    let transaction = post_in_tx(&mut *conn, account, posting, now).await?;

    let due_date = next_due_date(account.due_date, now, policy.billing_cycle_days);
    if due_date != account.due_date {
        sqlx::query("UPDATE loan_accounts SET due_date = $1 WHERE id = $2")
            .bind(due_date)
            .bind(account.id)
            .execute(&mut *conn)
            .await?;
        account.due_date = due_date;
    }

    let row = sqlx::query_as::<_, Repayment>(
        r#"
        INSERT INTO repayments (
            id, loan_account_id, transaction_id, amount, method,
            percentage_of_balance, interest_saved, on_time, reference, applied_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(account.id)
    .bind(transaction.id)
    .bind(repayment.amount)
    .bind(repayment.method)
    .bind(percentage)
    .bind(interest_saved)
    .bind(on_time)
    .bind(repayment.reference)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    let (_, reward) = reconcile_tier(&mut *conn, account, &policy.reward, now).await?;

    Ok(AppliedRepayment {
        transaction,
        repayment: row,
        reward,
    })
}

#[derive(Clone)]
pub struct RepaymentService {
    db_pool: PgPool,
    policy: LendingPolicy,
    calculator: InterestCalculator,
}

impl RepaymentService {
    pub fn new(db_pool: PgPool, policy: LendingPolicy) -> Self {
        let calculator = InterestCalculator::new(policy.interest_savings_horizon_days);
        Self {
            db_pool,
            policy,
            calculator,
        }
    }

    pub async fn make_repayment(
        &self,
        request: CreateRepaymentRequest,
        now: DateTime<Utc>,
        client_ip: Option<&str>,
    ) -> Result<RepaymentResult, ApiError> {
        request.validate()?;

        let mut tx = self.db_pool.begin().await?;
        let mut account = lock_live_account(&mut *tx, request.loan_account_id).await?;

        let applied = allocate_in_tx(
            &mut *tx,
            &mut account,
            NewRepayment {
                amount: request.amount,
                method: request.method,
                reference: request.reference.as_deref(),
                description: None,
            },
            &self.policy,
            now,
        )
        .await?;
        let repayment = &applied.repayment;

        audit::record(
            &mut *tx,
            AuditEntry::new(AuditAction::Repayment, "LoanAccount", account.id)
                .user(account.user_id)
                .ip(client_ip)
                .details(format!(
                    "Repayment {} of {} ({}% of balance, on time: {})",
                    repayment.id,
                    repayment.amount,
                    repayment.percentage_of_balance.normalize(),
                    repayment.on_time
                )),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            loan_account_id = %account.id,
            repayment_id = %repayment.id,
            amount = %repayment.amount,
            on_time = repayment.on_time,
            new_balance = %account.current_balance,
            apr = %account.apr,
            "Repayment applied"
        );

        Ok(RepaymentResult {
            repayment_id: repayment.id,
            loan_account_id: account.id,
            transaction_id: applied.transaction.id,
            amount: repayment.amount,
            percentage_of_balance: repayment.percentage_of_balance,
            interest_saved: repayment.interest_saved,
            on_time: repayment.on_time,
            new_balance: account.current_balance,
            apr: account.apr,
            due_date: account.due_date,
            reward: applied.reward,
        })
    }

    pub async fn list_for_account(
        &self,
        loan_account_id: Uuid,
        params: &PaginationParams,
    ) -> Result<PaginatedResponse<Repayment>, ApiError> {
        fetch_live_account(&self.db_pool, loan_account_id).await?;

        let (page, limit, offset) = params.resolve();

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM repayments WHERE loan_account_id = $1")
                .bind(loan_account_id)
                .fetch_one(&self.db_pool)
                .await?;

        let data = sqlx::query_as::<_, Repayment>(
            r#"
            SELECT * FROM repayments
            WHERE loan_account_id = $1
            ORDER BY applied_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(loan_account_id)
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

    pub async fn repayment_options(&self, loan_account_id: Uuid) -> Result<RepaymentOptions, ApiError> {
        let account = fetch_live_account(&self.db_pool, loan_account_id).await?;

        Ok(RepaymentOptions {
            loan_account_id,
            current_balance: account.current_balance,
            current_apr: account.apr,
            horizon_days: self.calculator.horizon_days,
            options: self.calculator.repayment_options(
                account.current_balance,
                account.apr,
                &self.policy.repayment_percentages,
            ),
        })
    }
}
