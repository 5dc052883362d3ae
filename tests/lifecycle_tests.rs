//! End-to-end account lifecycle against a real PostgreSQL database
//!
//! Run with `TEST_DATABASE_URL` pointing at a disposable database and
//! `cargo test -- --ignored`.

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use sqlx::PgPool;
    use uuid::Uuid;

    use lms_server::config::{LendingPolicy, RewardPolicy};
    use lms_server::db;
    use lms_server::error::ApiError;
    use lms_server::ledger::{CreateTransactionRequest, TransactionPoster, TransactionType};
    use lms_server::loan_account::{CreateLoanAccountRequest, LoanAccount, LoanAccountService};
    use lms_server::models::PaginationParams;
    use lms_server::repayment::{CreateRepaymentRequest, RepaymentMethod, RepaymentService};
    use lms_server::user::{CreateUserRequest, UserService};

    /// Helper to create a migrated test database pool
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/lms_test".to_string());

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        db::run_migrations(&pool).await.expect("migrations");
        pool
    }

    fn policy() -> LendingPolicy {
        LendingPolicy {
            reward: RewardPolicy {
                streak_length: 5,
                ..RewardPolicy::default()
            },
            ..LendingPolicy::default()
        }
    }

    /// A fresh user with one 24% APR account holding a 100.00 purchase
    async fn account_with_purchase(pool: &PgPool) -> LoanAccount {
        let users = UserService::new(pool.clone(), dec!(24));
        let accounts = LoanAccountService::new(pool.clone(), policy());
        let poster = TransactionPoster::new(pool.clone(), policy());

        let user = users
            .create_user(
                CreateUserRequest {
                    name: "Test Borrower".to_string(),
                    email: format!("borrower-{}@example.com", Uuid::new_v4()),
                    phone: None,
                    password: "correct horse battery".to_string(),
                    kyc_status: None,
                    account_status: None,
                    apr: None,
                },
                None,
            )
            .await
            .expect("create user");

        let account = accounts
            .open_account(
                CreateLoanAccountRequest {
                    user_id: user.id,
                    credit_limit: dec!(1000),
                    apr: None,
                },
                Some("127.0.0.1"),
            )
            .await
            .expect("open account");

        poster
            .post(
                CreateTransactionRequest {
                    loan_account_id: account.id,
                    transaction_type: TransactionType::Purchase,
                    amount: dec!(100),
                    description: Some("Groceries".to_string()),
                    card_id: None,
                },
                None,
            )
            .await
            .expect("post purchase");

        accounts.get_account(account.id).await.expect("reload")
    }

    /// Move the account's due date `days` into the past
    async fn backdate_due_date(pool: &PgPool, id: Uuid, days: i64) {
        sqlx::query("UPDATE loan_accounts SET due_date = $1 WHERE id = $2")
            .bind(Utc::now() - Duration::days(days))
            .bind(id)
            .execute(pool)
            .await
            .expect("backdate due date");
    }

    async fn repayment_count(pool: &PgPool, id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM repayments WHERE loan_account_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .expect("count")
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_interest_then_full_repayment() {
        let pool = setup_test_db().await;
        let account = account_with_purchase(&pool).await;
        assert_eq!(account.current_balance, dec!(100));
        assert_eq!(account.apr, dec!(24));

        let accounts = LoanAccountService::new(pool.clone(), policy());
        let later = Utc::now() + Duration::days(30);

        let interest = accounts
            .apply_interest(account.id, later, None)
            .await
            .expect("apply interest");
        assert_eq!(interest.days, 30);
        assert_eq!(interest.interest_charged, dec!(1.97));
        assert_eq!(interest.new_balance, dec!(101.97));

        let repayments = RepaymentService::new(pool.clone(), policy());
        let result = repayments
            .make_repayment(
                CreateRepaymentRequest {
                    loan_account_id: account.id,
                    amount: dec!(101.97),
                    method: RepaymentMethod::Manual,
                    reference: None,
                },
                later,
                None,
            )
            .await
            .expect("repay");
        assert_eq!(result.new_balance, dec!(0));
        assert_eq!(result.percentage_of_balance, dec!(100));

        let poster = TransactionPoster::new(pool.clone(), policy());
        let ledger = poster
            .list_for_account(account.id, &PaginationParams::default())
            .await
            .expect("ledger");
        assert_eq!(ledger.total, 3);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_same_day_interest_is_a_conflict() {
        let pool = setup_test_db().await;
        let account = account_with_purchase(&pool).await;
        let accounts = LoanAccountService::new(pool.clone(), policy());

        let result = accounts.apply_interest(account.id, Utc::now(), None).await;

        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_replayed_reference_is_rejected() {
        let pool = setup_test_db().await;
        let account = account_with_purchase(&pool).await;
        let repayments = RepaymentService::new(pool.clone(), policy());

        let request = || CreateRepaymentRequest {
            loan_account_id: account.id,
            amount: dec!(10),
            method: RepaymentMethod::Auto,
            reference: Some("ref-001".to_string()),
        };

        repayments
            .make_repayment(request(), Utc::now(), None)
            .await
            .expect("first repayment");
        let replay = repayments.make_repayment(request(), Utc::now(), None).await;

        assert!(matches!(replay, Err(ApiError::Conflict(_))));

        let accounts = LoanAccountService::new(pool.clone(), policy());
        let reloaded = accounts.get_account(account.id).await.expect("reload");
        assert_eq!(reloaded.current_balance, dec!(90));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_unknown_account_writes_nothing() {
        let pool = setup_test_db().await;
        let missing = Uuid::new_v4();
        let poster = TransactionPoster::new(pool.clone(), policy());

        let result = poster
            .post(
                CreateTransactionRequest {
                    loan_account_id: missing,
                    transaction_type: TransactionType::Purchase,
                    amount: dec!(5),
                    description: None,
                    card_id: None,
                },
                None,
            )
            .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));

        let repayments = RepaymentService::new(pool.clone(), policy());
        let repayment = repayments
            .make_repayment(
                CreateRepaymentRequest {
                    loan_account_id: missing,
                    amount: dec!(5),
                    method: RepaymentMethod::Manual,
                    reference: None,
                },
                Utc::now(),
                None,
            )
            .await;
        assert!(matches!(repayment, Err(ApiError::NotFound(_))));

        let repayment_rows: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM repayments WHERE loan_account_id = $1")
                .bind(missing)
                .fetch_one(&pool)
                .await
                .expect("count");
        assert_eq!(repayment_rows, 0);

        let rows: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE loan_account_id = $1")
                .bind(missing)
                .fetch_one(&pool)
                .await
                .expect("count");
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_account_open_is_audited() {
        let pool = setup_test_db().await;
        let account = account_with_purchase(&pool).await;

        let entries: Vec<(String, Option<String>)> = sqlx::query_as(
            "SELECT action, ip_address FROM audit_logs WHERE entity_type = $1 AND entity_id = $2",
        )
        .bind("LoanAccount")
        .bind(account.id)
        .fetch_all(&pool)
        .await
        .expect("audit entries");

        let open = entries
            .iter()
            .find(|(action, _)| action == "LOAN_ACCOUNT_OPEN")
            .expect("open entry");
        assert_eq!(open.1.as_deref(), Some("127.0.0.1"));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_posted_repayment_rolls_due_date_and_is_recorded() {
        let pool = setup_test_db().await;
        let account = account_with_purchase(&pool).await;
        backdate_due_date(&pool, account.id, 5).await;

        let poster = TransactionPoster::new(pool.clone(), policy());
        let transaction = poster
            .post(
                CreateTransactionRequest {
                    loan_account_id: account.id,
                    transaction_type: TransactionType::Repayment,
                    amount: dec!(99),
                    description: None,
                    card_id: None,
                },
                None,
            )
            .await
            .expect("post repayment");
        assert_eq!(transaction.balance_after, dec!(1));

        let accounts = LoanAccountService::new(pool.clone(), policy());
        let reloaded = accounts.get_account(account.id).await.expect("reload");
        assert!(reloaded.due_date > Utc::now());
        assert_eq!(repayment_count(&pool, account.id).await, 1);

        let fee = accounts
            .apply_late_fee(account.id, Utc::now(), None)
            .await
            .expect("assess late fee");
        assert_eq!(fee.fee_charged, dec!(0));
        assert!(fee.transaction_id.is_none());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_posted_repayment_with_card_is_rejected() {
        let pool = setup_test_db().await;
        let account = account_with_purchase(&pool).await;
        let poster = TransactionPoster::new(pool.clone(), policy());

        let result = poster
            .post(
                CreateTransactionRequest {
                    loan_account_id: account.id,
                    transaction_type: TransactionType::Repayment,
                    amount: dec!(10),
                    description: None,
                    card_id: Some(Uuid::new_v4()),
                },
                None,
            )
            .await;

        assert!(matches!(result, Err(ApiError::ValidationError(_))));
        assert_eq!(repayment_count(&pool, account.id).await, 0);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_late_fee_charged_once_per_missed_due_date() {
        let pool = setup_test_db().await;
        let account = account_with_purchase(&pool).await;
        backdate_due_date(&pool, account.id, 5).await;
        let accounts = LoanAccountService::new(pool.clone(), policy());

        let first = accounts
            .apply_late_fee(account.id, Utc::now(), None)
            .await
            .expect("first late fee");
        assert_eq!(first.fee_charged, dec!(5.00));
        assert_eq!(first.new_balance, dec!(105));

        let second = accounts
            .apply_late_fee(account.id, Utc::now(), None)
            .await
            .expect("second late fee");
        assert_eq!(second.fee_charged, dec!(0));
        assert!(second.transaction_id.is_none());
        assert_eq!(second.new_balance, dec!(105));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_same_day_charges_with_nothing_due_is_a_conflict() {
        let pool = setup_test_db().await;
        let account = account_with_purchase(&pool).await;
        let accounts = LoanAccountService::new(pool.clone(), policy());

        let result = accounts.apply_charges(account.id, Utc::now(), None).await;

        assert!(matches!(result, Err(ApiError::Conflict(_))));
        let reloaded = accounts.get_account(account.id).await.expect("reload");
        assert_eq!(reloaded.current_balance, dec!(100));
    }
}
