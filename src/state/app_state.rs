//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::card::CardService;
use crate::config::LendingPolicy;
use crate::ledger::TransactionPoster;
use crate::loan_account::LoanAccountService;
use crate::repayment::RepaymentService;
use crate::reward::RewardService;
use crate::user::UserService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub user_service: Arc<UserService>,
    pub loan_account_service: Arc<LoanAccountService>,
    pub transaction_poster: Arc<TransactionPoster>,
    pub repayment_service: Arc<RepaymentService>,
    pub reward_service: Arc<RewardService>,
    pub card_service: Arc<CardService>,
}

impl AppState {
    /// Wire every service to one pool and one lending policy
    pub fn new(db_pool: PgPool, policy: LendingPolicy) -> Self {
        Self {
            user_service: Arc::new(UserService::new(db_pool.clone(), policy.default_apr)),
            loan_account_service: Arc::new(LoanAccountService::new(
                db_pool.clone(),
                policy.clone(),
            )),
            transaction_poster: Arc::new(TransactionPoster::new(
                db_pool.clone(),
                policy.clone(),
            )),
            repayment_service: Arc::new(RepaymentService::new(db_pool.clone(), policy.clone())),
            reward_service: Arc::new(RewardService::new(db_pool.clone(), policy.reward)),
            card_service: Arc::new(CardService::new(db_pool.clone())),
            db_pool,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}

impl FromRef<AppState> for Arc<UserService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.user_service.clone()
    }
}

impl FromRef<AppState> for Arc<LoanAccountService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.loan_account_service.clone()
    }
}

impl FromRef<AppState> for Arc<TransactionPoster> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.transaction_poster.clone()
    }
}

impl FromRef<AppState> for Arc<RepaymentService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.repayment_service.clone()
    }
}

impl FromRef<AppState> for Arc<RewardService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.reward_service.clone()
    }
}

impl FromRef<AppState> for Arc<CardService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.card_service.clone()
    }
}
