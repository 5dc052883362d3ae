//! Transaction poster
//!
//! Every change to an account balance goes through [`post_in_tx`]: it checks
//! the posting against the locked account, appends the ledger row and writes
//! the new balance on the caller's transaction. The caller owns the commit, so
//! the ledger row and the balance land together or not at all.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::audit::{self, AuditAction, AuditEntry};
use crate::card::model::{Card, CardStatus};
use crate::config::LendingPolicy;
use crate::error::ApiError;
use crate::ledger::model::{CreateTransactionRequest, Statement, Transaction, TransactionList, TransactionType};
use crate::loan_account::model::{LoanAccount, LoanAccountStatus};
use crate::loan_account::service::{fetch_live_account, lock_live_account};
use crate::models::{PaginationParams, MAX_MONEY};
use crate::repayment::model::RepaymentMethod;
use crate::repayment::service::{allocate_in_tx, NewRepayment};

const STATEMENT_DAYS: i64 = 30;

/// A ledger entry about to be posted
#[derive(Debug, Clone)]
pub struct NewPosting {
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: Option<String>,
    pub card_id: Option<Uuid>,
    pub is_late_fee: bool,
}

impl NewPosting {
    pub fn new(transaction_type: TransactionType, amount: Decimal) -> Self {
        Self {
            transaction_type,
            amount,
            description: None,
            card_id: None,
            is_late_fee: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn late_fee(mut self) -> Self {
        self.is_late_fee = true;
        self
    }
}

/// Balance after applying `posting` to `account`, or why it cannot be applied
pub fn next_balance(account: &LoanAccount, posting: &NewPosting) -> Result<Decimal, ApiError> {
    let amount = posting.amount;

    if amount <= Decimal::ZERO {
        return Err(ApiError::ValidationError(format!(
            "Amount must be greater than zero, got {}",
            amount
        )));
    }
    if amount.normalize().scale() > 2 {
        return Err(ApiError::ValidationError(format!(
            "Amount must have at most two decimal places, got {}",
            amount
        )));
    }

    match posting.transaction_type {
        TransactionType::Purchase => {
            if account.status == LoanAccountStatus::Suspended {
                return Err(ApiError::ValidationError(format!(
                    "Loan account {} is suspended",
                    account.id
                )));
            }
            if amount > account.available_credit() {
                return Err(ApiError::ValidationError(format!(
                    "Purchase of {} exceeds available credit of {}",
                    amount,
                    account.available_credit()
                )));
            }
        }
        TransactionType::Repayment => {
            if amount > account.current_balance {
                return Err(ApiError::ValidationError(format!(
                    "Repayment of {} exceeds outstanding balance of {}",
                    amount, account.current_balance
                )));
            }
        }
        TransactionType::Interest | TransactionType::Fee => {}
    }

    if posting.card_id.is_some() && posting.transaction_type != TransactionType::Purchase {
        return Err(ApiError::ValidationError(
            "Only purchases can be made with a card".to_string(),
        ));
    }

    let balance_after = account.current_balance + posting.transaction_type.signed(amount);
    if balance_after > MAX_MONEY {
        return Err(ApiError::ValidationError(format!(
            "Balance of {} after this {:?} would exceed the maximum of {}",
            balance_after, posting.transaction_type, MAX_MONEY
        )));
    }

    Ok(balance_after)
}

async fn check_card(
    conn: &mut PgConnection,
    account: &LoanAccount,
    card_id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), ApiError> {
    let card = sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1")
        .bind(card_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Card", card_id))?;

    if card.loan_account_id != account.id {
        return Err(ApiError::ValidationError(format!(
            "Card {} does not belong to loan account {}",
            card_id, account.id
        )));
    }
    if !card.can_transact_at(at) {
        let status = if card.status == CardStatus::Active {
            CardStatus::Expired
        } else {
            card.status
        };
        return Err(ApiError::ValidationError(format!(
            "Card {} is {}",
            card_id,
            status.as_str()
        )));
    }
    Ok(())
}

/// Post one entry against a locked account and update its balance
///
/// `account` must have been read with `FOR UPDATE` on `conn`; it is updated in
/// place to reflect the new balance.
pub async fn post_in_tx(
    conn: &mut PgConnection,
    account: &mut LoanAccount,
    posting: NewPosting,
    at: DateTime<Utc>,
) -> Result<Transaction, ApiError> {
    let balance_after = next_balance(account, &posting)?;

    if let Some(card_id) = posting.card_id {
        check_card(conn, account, card_id, at).await?;
    }

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            id, loan_account_id, card_id, transaction_type, amount,
            balance_after, description, is_late_fee, posted_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(account.id)
    .bind(posting.card_id)
    .bind(posting.transaction_type)
    .bind(posting.amount)
    .bind(balance_after)
    .bind(&posting.description)
    .bind(posting.is_late_fee)
    .bind(at)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE loan_accounts SET current_balance = $1, updated_at = $2 WHERE id = $3")
        .bind(balance_after)
        .bind(at)
        .bind(account.id)
        .execute(&mut *conn)
        .await?;

    account.current_balance = balance_after;
    account.updated_at = at;

    tracing::debug!(
        loan_account_id = %account.id,
        transaction_id = %transaction.id,
        transaction_type = ?transaction.transaction_type,
        amount = %transaction.amount,
        balance_after = %balance_after,
        "Ledger entry posted"
    );

    Ok(transaction)
}

/// Ledger reads and direct postings
#[derive(Clone)]
pub struct TransactionPoster {
    db_pool: PgPool,
    policy: LendingPolicy,
}

impl TransactionPoster {
    pub fn new(db_pool: PgPool, policy: LendingPolicy) -> Self {
        Self { db_pool, policy }
    }

    pub async fn post(
        &self,
        request: CreateTransactionRequest,
        client_ip: Option<&str>,
    ) -> Result<Transaction, ApiError> {
        request.validate()?;

        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;

        let mut account = lock_live_account(&mut *tx, request.loan_account_id).await?;

        let transaction = match request.transaction_type {
            TransactionType::Repayment => {
                if request.card_id.is_some() {
                    return Err(ApiError::ValidationError(
                        "Only purchases can be made with a card".to_string(),
                    ));
                }
                let repayment = NewRepayment {
                    amount: request.amount,
                    method: RepaymentMethod::Manual,
                    reference: None,
                    description: request.description,
                };
                allocate_in_tx(&mut *tx, &mut account, repayment, &self.policy, now)
                    .await?
                    .transaction
            }
            _ => {
                let mut posting = NewPosting::new(request.transaction_type, request.amount);
                posting.description = request.description;
                posting.card_id = request.card_id;
                post_in_tx(&mut *tx, &mut account, posting, now).await?
            }
        };

        audit::record(
            &mut *tx,
            AuditEntry::new(AuditAction::TransactionPost, "Transaction", transaction.id)
                .user(account.user_id)
                .ip(client_ip)
                .details(format!(
                    "{:?} of {} on loan account {}",
                    transaction.transaction_type, transaction.amount, account.id
                )),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            loan_account_id = %account.id,
            transaction_id = %transaction.id,
            amount = %transaction.amount,
            new_balance = %account.current_balance,
            "Transaction posted"
        );

        Ok(transaction)
    }

    pub async fn get_transaction(&self, id: Uuid) -> Result<Transaction, ApiError> {
        sqlx::query_as::<_, Transaction>(
            r#"
            SELECT t.* FROM transactions t
            JOIN loan_accounts a ON a.id = t.loan_account_id
            WHERE t.id = $1 AND a.is_deleted = FALSE
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction", id))
    }

    pub async fn list_for_account(
        &self,
        loan_account_id: Uuid,
        params: &PaginationParams,
    ) -> Result<TransactionList, ApiError> {
        fetch_live_account(&self.db_pool, loan_account_id).await?;

        let (page, limit, offset) = params.resolve();

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE loan_account_id = $1")
                .bind(loan_account_id)
                .fetch_one(&self.db_pool)
                .await?;

        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE loan_account_id = $1
            ORDER BY posted_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(loan_account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(TransactionList {
            loan_account_id,
            transactions,
            total,
            page,
            limit,
        })
    }

    /// Activity over the trailing statement period ending at `now`
    pub async fn statement(
        &self,
        loan_account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Statement, ApiError> {
        let account = fetch_live_account(&self.db_pool, loan_account_id).await?;
        let period_start = now - Duration::days(STATEMENT_DAYS);

        let opening_balance: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT balance_after FROM transactions
            WHERE loan_account_id = $1 AND posted_at < $2
            ORDER BY posted_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(loan_account_id)
        .bind(period_start)
        .fetch_optional(&self.db_pool)
        .await?;

        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE loan_account_id = $1 AND posted_at >= $2 AND posted_at <= $3
            ORDER BY posted_at DESC, id DESC
            "#,
        )
        .bind(loan_account_id)
        .bind(period_start)
        .bind(now)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(Statement::summarise(
            loan_account_id,
            period_start,
            now,
            opening_balance.unwrap_or(Decimal::ZERO),
            account.apr,
            account.due_date,
            transactions,
        ))
    }
}
