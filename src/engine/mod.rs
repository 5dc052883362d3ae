//! Balance/interest engine
//!
//! Pure computation over a loan account's state: interest accrual, late fees,
//! repayment options, due-date rolling and reward tiers. Nothing in here
//! touches the database; services feed snapshots in and persist the results.

pub mod interest;
pub mod late_fee;
pub mod reward;
pub mod schedule;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

pub use interest::{Accrual, InterestCalculator, RepaymentOption};
pub use late_fee::{LateFeeAssessment, LateFeeHistory};
pub use reward::{RepaymentOutcome, RewardTier};
pub use schedule::{is_on_time, next_due_date};

/// Invalid engine input
#[derive(Error, Debug, PartialEq)]
pub enum EngineError {
    #[error("balance must not be negative, got {0}")]
    NegativeBalance(Decimal),

    #[error("APR must be positive, got {0}")]
    NonPositiveApr(Decimal),

    #[error("elapsed days must not be negative, got {0}")]
    NegativeDays(i64),

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),
}

/// The slice of a loan account the engine works on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountSnapshot {
    pub balance: Decimal,
    /// Annual percentage rate, `24` meaning 24 %
    pub apr: Decimal,
    pub due_date: DateTime<Utc>,
}

impl AccountSnapshot {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.balance < Decimal::ZERO {
            return Err(EngineError::NegativeBalance(self.balance));
        }
        if self.apr <= Decimal::ZERO {
            return Err(EngineError::NonPositiveApr(self.apr));
        }
        Ok(())
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now > self.due_date && self.balance > Decimal::ZERO
    }
}

/// Round a money amount to pennies, halves away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Whole calendar days between two instants, never negative
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to.date_naive() - from.date_naive()).num_days().max(0)
}
