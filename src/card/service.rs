use chrono::{DateTime, Months, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::audit::{self, AuditAction, AuditEntry};
use crate::card::model::{Card, CardStatus, CreateCardRequest};
use crate::card::pan::{generate_pan, is_luhn_valid, mask_pan};
use crate::error::ApiError;
use crate::user::service::fetch_live_user;

const ENTITY: &str = "Card";
const CARD_VALIDITY_MONTHS: u32 = 36;

/// What a status change does to a card in a given state
pub fn transition(card: &Card, target: CardStatus, now: DateTime<Utc>) -> Result<CardStatus, ApiError> {
    match (card.status, target) {
        (CardStatus::Cancelled, _) => Err(ApiError::BadRequest(format!(
            "Card {} is cancelled",
            card.id
        ))),
        (_, CardStatus::Cancelled) => Ok(CardStatus::Cancelled),
        (CardStatus::Expired, _) => Err(ApiError::BadRequest(format!(
            "Card {} has expired",
            card.id
        ))),
        (CardStatus::Locked, CardStatus::Locked) => Err(ApiError::BadRequest(format!(
            "Card {} is already locked",
            card.id
        ))),
        (CardStatus::Active, CardStatus::Active) => Err(ApiError::BadRequest(format!(
            "Card {} is not locked",
            card.id
        ))),
        (_, CardStatus::Active) if card.is_expired_at(now) => Err(ApiError::BadRequest(format!(
            "Card {} has expired",
            card.id
        ))),
        (_, target @ (CardStatus::Active | CardStatus::Locked)) => Ok(target),
        (_, CardStatus::Expired) => Ok(CardStatus::Expired),
    }
}

async fn lock_card_row(conn: &mut PgConnection, id: Uuid) -> Result<Card, ApiError> {
    sqlx::query_as::<_, Card>(
        "SELECT * FROM cards WHERE id = $1 AND status <> 'cancelled' FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| ApiError::not_found(ENTITY, id))
}

#[derive(Clone)]
pub struct CardService {
    db_pool: PgPool,
}

impl CardService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn issue_card(
        &self,
        request: CreateCardRequest,
        client_ip: Option<&str>,
    ) -> Result<Card, ApiError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_months(Months::new(CARD_VALIDITY_MONTHS))
            .ok_or_else(|| ApiError::InternalError("Card expiry out of range".to_string()))?;

        let mut tx = self.db_pool.begin().await?;

        fetch_live_user(&mut *tx, request.user_id).await?;

        let owns_account: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM loan_accounts WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE",
        )
        .bind(request.loan_account_id)
        .bind(request.user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if owns_account.is_none() {
            return Err(ApiError::NotFound(format!(
                "Loan account with ID {} not found for user {}",
                request.loan_account_id, request.user_id
            )));
        }

        // the full number is never persisted
        let masked_pan = {
            let mut rng = rand::thread_rng();
            let pan = generate_pan(&mut rng);
            debug_assert!(is_luhn_valid(&pan));
            mask_pan(&pan)
        };

        let card = sqlx::query_as::<_, Card>(
            r#"
            INSERT INTO cards (
                id, user_id, loan_account_id, card_type, status, masked_pan,
                issued_at, expires_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.loan_account_id)
        .bind(request.card_type)
        .bind(CardStatus::Active)
        .bind(&masked_pan)
        .bind(now)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            AuditEntry::new(AuditAction::CardIssue, ENTITY, card.id)
                .user(card.user_id)
                .ip(client_ip)
                .details(format!("{:?} card issued", card.card_type)),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(card_id = %card.id, loan_account_id = %card.loan_account_id, "Card issued");

        Ok(card)
    }

    pub async fn get_card(&self, id: Uuid) -> Result<Card, ApiError> {
        sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1 AND status <> 'cancelled'")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::not_found(ENTITY, id))
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Card>, ApiError> {
        fetch_live_user(&self.db_pool, user_id).await?;

        let cards = sqlx::query_as::<_, Card>(
            r#"
            SELECT * FROM cards
            WHERE user_id = $1 AND status <> 'cancelled'
            ORDER BY issued_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(cards)
    }

    async fn change_status(
        &self,
        id: Uuid,
        target: CardStatus,
        action: AuditAction,
        client_ip: Option<&str>,
    ) -> Result<Card, ApiError> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        let card = lock_card_row(&mut *tx, id).await?;

        let status = transition(&card, target, now)?;

        let card = sqlx::query_as::<_, Card>(
            "UPDATE cards SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *",
        )
        .bind(status)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            AuditEntry::new(action, ENTITY, id)
                .user(card.user_id)
                .ip(client_ip),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(card_id = %id, status = status.as_str(), "Card status changed");

        Ok(card)
    }

    pub async fn lock_card(&self, id: Uuid, client_ip: Option<&str>) -> Result<Card, ApiError> {
        self.change_status(id, CardStatus::Locked, AuditAction::CardLock, client_ip)
            .await
    }

    pub async fn unlock_card(&self, id: Uuid, client_ip: Option<&str>) -> Result<Card, ApiError> {
        self.change_status(id, CardStatus::Active, AuditAction::CardUnlock, client_ip)
            .await
    }

    /// Soft delete
    pub async fn cancel_card(&self, id: Uuid, client_ip: Option<&str>) -> Result<Card, ApiError> {
        self.change_status(id, CardStatus::Cancelled, AuditAction::CardCancel, client_ip)
            .await
    }
}
