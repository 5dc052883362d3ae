//! Late fee assessment

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{round_money, AccountSnapshot, EngineError};
use crate::config::LateFeeRule;

/// Late fees already on the ledger, as seen by the assessment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LateFeeHistory {
    /// Late fees posted inside the trailing window
    pub fees_in_window: i64,
    /// Whether a late fee was posted after the current due date passed
    pub charged_for_current_due_date: bool,
}

/// Outcome of a late fee assessment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LateFeeAssessment {
    pub fee: Decimal,
    pub reason: String,
}

impl LateFeeAssessment {
    fn waived(reason: impl Into<String>) -> Self {
        Self {
            fee: Decimal::ZERO,
            reason: reason.into(),
        }
    }

    pub fn is_charged(&self) -> bool {
        self.fee > Decimal::ZERO
    }
}

/// Decide whether a late fee applies at `now`, and how much
pub fn assess(
    snapshot: &AccountSnapshot,
    now: DateTime<Utc>,
    rule: LateFeeRule,
    max_fees: i64,
    history: LateFeeHistory,
) -> Result<LateFeeAssessment, EngineError> {
    snapshot.validate()?;

    if snapshot.balance.is_zero() {
        return Ok(LateFeeAssessment::waived("No outstanding balance"));
    }
    if !snapshot.is_overdue(now) {
        return Ok(LateFeeAssessment::waived("Account is not past due"));
    }
    if history.charged_for_current_due_date {
        return Ok(LateFeeAssessment::waived(
            "Late fee already charged for this due date",
        ));
    }
    if history.fees_in_window >= max_fees {
        return Ok(LateFeeAssessment::waived(format!(
            "Maximum number of late fees ({}) already applied",
            max_fees
        )));
    }

    let fee = match rule {
        LateFeeRule::Flat(amount) => round_money(amount),
        LateFeeRule::Percentage(pct) => round_money(snapshot.balance * pct / Decimal::ONE_HUNDRED),
    };

    if fee.is_zero() {
        return Ok(LateFeeAssessment::waived("Late fee rounds to zero"));
    }

    Ok(LateFeeAssessment {
        fee,
        reason: "Late payment fee".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn due() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn after_due() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap()
    }

    fn owing(balance: Decimal) -> AccountSnapshot {
        AccountSnapshot { balance, apr: dec!(25), due_date: due() }
    }

    #[test]
    fn test_flat_fee_when_overdue() {
        let result = assess(&owing(dec!(200)), after_due(), LateFeeRule::Flat(dec!(5)), 3, LateFeeHistory::default()).unwrap();
        assert_eq!(result.fee, dec!(5.00));
        assert!(result.is_charged());
    }

    #[test]
    fn test_percentage_fee() {
        let result = assess(
            &owing(dec!(333.33)),
            after_due(),
            LateFeeRule::Percentage(dec!(1.5)),
            3,
            LateFeeHistory::default(),
        )
        .unwrap();
        assert_eq!(result.fee, dec!(5.00));
    }

    #[test]
    fn test_no_fee_before_due_date() {
        let before = Utc.with_ymd_and_hms(2024, 2, 20, 0, 0, 0).unwrap();
        let result = assess(&owing(dec!(200)), before, LateFeeRule::Flat(dec!(5)), 3, LateFeeHistory::default()).unwrap();
        assert!(!result.is_charged());
        assert_eq!(result.reason, "Account is not past due");
    }

    #[test]
    fn test_no_fee_on_zero_balance() {
        let result = assess(&owing(dec!(0)), after_due(), LateFeeRule::Flat(dec!(5)), 3, LateFeeHistory::default()).unwrap();
        assert!(!result.is_charged());
        assert_eq!(result.reason, "No outstanding balance");
    }

    #[test]
    fn test_one_fee_per_due_date() {
        let history = LateFeeHistory { fees_in_window: 1, charged_for_current_due_date: true };
        let result = assess(&owing(dec!(200)), after_due(), LateFeeRule::Flat(dec!(5)), 3, history).unwrap();
        assert!(!result.is_charged());
    }

    #[test]
    fn test_window_cap() {
        let history = LateFeeHistory { fees_in_window: 3, charged_for_current_due_date: false };
        let result = assess(&owing(dec!(200)), after_due(), LateFeeRule::Flat(dec!(5)), 3, history).unwrap();
        assert!(!result.is_charged());
        assert!(result.reason.contains("(3)"));
    }

    #[test]
    fn test_invalid_snapshot_is_rejected() {
        let bad = AccountSnapshot { apr: dec!(0), ..owing(dec!(10)) };
        assert!(assess(&bad, after_due(), LateFeeRule::Flat(dec!(5)), 3, LateFeeHistory::default()).is_err());
    }
}
