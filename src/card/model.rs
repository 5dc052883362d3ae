use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "card_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Virtual,
    Physical,
}

/// Card lifecycle state; `Cancelled` is the soft-deleted state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "card_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Active,
    Locked,
    Expired,
    Cancelled,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "active",
            CardStatus::Locked => "locked",
            CardStatus::Expired => "expired",
            CardStatus::Cancelled => "cancelled",
        }
    }
}

/// Card row. Only the masked PAN is ever stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Card {
    pub id: Uuid,
    pub user_id: Uuid,
    pub loan_account_id: Uuid,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub status: CardStatus,
    pub masked_pan: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == CardStatus::Expired || self.expires_at <= now
    }

    /// Whether a purchase may be made with this card at `now`
    pub fn can_transact_at(&self, now: DateTime<Utc>) -> bool {
        self.status == CardStatus::Active && !self.is_expired_at(now)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    pub user_id: Uuid,
    pub loan_account_id: Uuid,
    #[serde(rename = "type")]
    pub card_type: CardType,
}
