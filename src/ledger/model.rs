use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::validate_amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Purchase,
    Interest,
    Fee,
    Repayment,
}

impl TransactionType {
    /// Whether the entry increases the amount owed
    pub fn is_debit(&self) -> bool {
        !matches!(self, TransactionType::Repayment)
    }

    /// Balance change for `amount` of this type
    pub fn signed(&self, amount: Decimal) -> Decimal {
        if self.is_debit() {
            amount
        } else {
            -amount
        }
    }
}

/// Immutable ledger entry
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub loan_account_id: Uuid,
    pub card_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    /// Account balance right after this entry
    pub balance_after: Decimal,
    pub description: Option<String>,
    pub is_late_fee: bool,
    #[serde(rename = "timestamp")]
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransactionRequest {
    pub loan_account_id: Uuid,

    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    #[validate(custom = "validate_amount")]
    pub amount: Decimal,

    #[validate(length(max = 255))]
    pub description: Option<String>,

    pub card_id: Option<Uuid>,
}

/// Page of an account's ledger, newest first
#[derive(Debug, Serialize)]
pub struct TransactionList {
    pub loan_account_id: Uuid,
    pub transactions: Vec<Transaction>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Account activity over a trailing period
#[derive(Debug, Serialize)]
pub struct Statement {
    pub loan_account_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub total_purchases: Decimal,
    pub total_interest: Decimal,
    pub total_fees: Decimal,
    pub total_late_fees: Decimal,
    pub total_repayments: Decimal,
    pub apr: Decimal,
    pub due_date: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
}

impl Statement {
    /// Sum the period's entries by type. `transactions` is newest first.
    pub fn summarise(
        loan_account_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        opening_balance: Decimal,
        apr: Decimal,
        due_date: DateTime<Utc>,
        transactions: Vec<Transaction>,
    ) -> Self {
        let mut statement = Statement {
            loan_account_id,
            period_start,
            period_end,
            opening_balance,
            closing_balance: transactions
                .first()
                .map(|t| t.balance_after)
                .unwrap_or(opening_balance),
            total_purchases: Decimal::ZERO,
            total_interest: Decimal::ZERO,
            total_fees: Decimal::ZERO,
            total_late_fees: Decimal::ZERO,
            total_repayments: Decimal::ZERO,
            apr,
            due_date,
            transactions: Vec::new(),
        };

        for t in &transactions {
            match t.transaction_type {
                TransactionType::Purchase => statement.total_purchases += t.amount,
                TransactionType::Interest => statement.total_interest += t.amount,
                TransactionType::Fee => statement.total_fees += t.amount,
                TransactionType::Repayment => statement.total_repayments += t.amount,
            }
            if t.is_late_fee {
                statement.total_late_fees += t.amount;
            }
        }

        statement.transactions = transactions;
        statement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn entry(kind: TransactionType, amount: Decimal, balance_after: Decimal, late: bool) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            loan_account_id: Uuid::nil(),
            card_id: None,
            transaction_type: kind,
            amount,
            balance_after,
            description: None,
            is_late_fee: late,
            posted_at: Utc::now(),
        }
    }

    #[test]
    fn test_signed_amounts() {
        assert_eq!(TransactionType::Purchase.signed(dec!(5)), dec!(5));
        assert_eq!(TransactionType::Fee.signed(dec!(5)), dec!(5));
        assert_eq!(TransactionType::Repayment.signed(dec!(5)), dec!(-5));
    }

    #[test]
    fn test_serialises_type_and_timestamp() {
        let body = serde_json::to_value(entry(TransactionType::Interest, dec!(1.97), dec!(101.97), false)).unwrap();
        assert_eq!(body["type"], "interest");
        assert!(body.get("timestamp").is_some());
        assert!(body.get("posted_at").is_none());
    }

    #[test]
    fn test_statement_totals() {
        let now = Utc::now();
        // newest first
        let entries = vec![
            entry(TransactionType::Repayment, dec!(50), dec!(61.97), false),
            entry(TransactionType::Fee, dec!(5), dec!(111.97), true),
            entry(TransactionType::Interest, dec!(1.97), dec!(106.97), false),
            entry(TransactionType::Purchase, dec!(100), dec!(105), false),
        ];

        let statement = Statement::summarise(
            Uuid::nil(),
            now - Duration::days(30),
            now,
            dec!(5),
            dec!(24),
            now,
            entries,
        );

        assert_eq!(statement.opening_balance, dec!(5));
        assert_eq!(statement.closing_balance, dec!(61.97));
        assert_eq!(statement.total_purchases, dec!(100));
        assert_eq!(statement.total_interest, dec!(1.97));
        assert_eq!(statement.total_fees, dec!(5));
        assert_eq!(statement.total_late_fees, dec!(5));
        assert_eq!(statement.total_repayments, dec!(50));
        assert_eq!(statement.transactions.len(), 4);
    }

    #[test]
    fn test_empty_statement_closes_at_opening_balance() {
        let now = Utc::now();
        let statement = Statement::summarise(Uuid::nil(), now, now, dec!(12.5), dec!(24), now, vec![]);
        assert_eq!(statement.closing_balance, dec!(12.5));
    }
}
