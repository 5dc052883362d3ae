//! Audit trail
//!
//! Entries are written on the caller's connection so they commit or roll back
//! together with the change they describe.

use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::ApiError;

/// Audited actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    UserCreate,
    UserUpdate,
    UserDelete,
    LoanAccountOpen,
    LoanAccountUpdate,
    LoanAccountClose,
    TransactionPost,
    InterestApply,
    LateFeeApply,
    Repayment,
    AprAdjust,
    CardIssue,
    CardLock,
    CardUnlock,
    CardCancel,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserCreate => "USER_CREATE",
            AuditAction::UserUpdate => "USER_UPDATE",
            AuditAction::UserDelete => "USER_DELETE",
            AuditAction::LoanAccountOpen => "LOAN_ACCOUNT_OPEN",
            AuditAction::LoanAccountUpdate => "LOAN_ACCOUNT_UPDATE",
            AuditAction::LoanAccountClose => "LOAN_ACCOUNT_CLOSE",
            AuditAction::TransactionPost => "TRANSACTION_POST",
            AuditAction::InterestApply => "INTEREST_APPLY",
            AuditAction::LateFeeApply => "LATE_FEE_APPLY",
            AuditAction::Repayment => "REPAYMENT",
            AuditAction::AprAdjust => "APR_ADJUST",
            AuditAction::CardIssue => "CARD_ISSUE",
            AuditAction::CardLock => "CARD_LOCK",
            AuditAction::CardUnlock => "CARD_UNLOCK",
            AuditAction::CardCancel => "CARD_CANCEL",
        }
    }
}

/// An entry about to be written
#[derive(Debug, Clone)]
pub struct AuditEntry<'a> {
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub ip_address: Option<&'a str>,
    pub details: Option<String>,
}

impl<'a> AuditEntry<'a> {
    pub fn new(action: AuditAction, entity_type: &'static str, entity_id: Uuid) -> Self {
        Self {
            user_id: None,
            action,
            entity_type,
            entity_id: Some(entity_id),
            ip_address: None,
            details: None,
        }
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn ip(mut self, ip_address: Option<&'a str>) -> Self {
        self.ip_address = ip_address;
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Append an audit entry
pub async fn record(conn: &mut PgConnection, entry: AuditEntry<'_>) -> Result<(), ApiError> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, entity_type, entity_id, ip_address, details, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.user_id)
    .bind(entry.action.as_str())
    .bind(entry.entity_type)
    .bind(entry.entity_id)
    .bind(entry.ip_address)
    .bind(entry.details)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_builder() {
        let account = Uuid::new_v4();
        let user = Uuid::new_v4();
        let entry = AuditEntry::new(AuditAction::Repayment, "LoanAccount", account)
            .user(user)
            .ip(Some("10.0.0.1"))
            .details("Repayment of 50.00");

        assert_eq!(entry.action.as_str(), "REPAYMENT");
        assert_eq!(entry.entity_id, Some(account));
        assert_eq!(entry.user_id, Some(user));
        assert_eq!(entry.ip_address, Some("10.0.0.1"));
    }
}
