//! Simple daily interest on the outstanding balance (actual/365)

use rust_decimal::Decimal;
use serde::Serialize;

use super::{round_money, AccountSnapshot, EngineError};

const DAYS_PER_YEAR: i64 = 365;

/// Result of accruing interest over a period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accrual {
    pub days: i64,
    pub interest: Decimal,
    pub new_balance: Decimal,
    pub description: String,
}

/// One row of the repayment options table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepaymentOption {
    pub percentage: Decimal,
    pub amount: Decimal,
    /// Interest still owed over the horizon after paying `amount`
    pub interest_to_pay: Decimal,
    /// Interest avoided over the horizon by paying `amount` now
    pub interest_saved: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct InterestCalculator {
    /// Days used when projecting savings and options
    pub horizon_days: i64,
}

impl Default for InterestCalculator {
    fn default() -> Self {
        Self { horizon_days: 30 }
    }
}

impl InterestCalculator {
    pub fn new(horizon_days: i64) -> Self {
        Self { horizon_days }
    }

    /// Daily rate as a fraction, `apr / 100 / 365`
    pub fn daily_rate(apr: Decimal) -> Decimal {
        apr / Decimal::ONE_HUNDRED / Decimal::from(DAYS_PER_YEAR)
    }

    /// Interest on `balance` for `days`, rounded to pennies
    pub fn interest_for_period(balance: Decimal, apr: Decimal, days: i64) -> Decimal {
        if days <= 0 || balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        // multiply first so the division happens once
        let raw = balance * apr * Decimal::from(days)
            / (Decimal::ONE_HUNDRED * Decimal::from(DAYS_PER_YEAR));
        round_money(raw)
    }

    /// Accrue interest on a snapshot for `days` elapsed days
    pub fn accrue(&self, snapshot: &AccountSnapshot, days: i64) -> Result<Accrual, EngineError> {
        snapshot.validate()?;
        if days < 0 {
            return Err(EngineError::NegativeDays(days));
        }

        let interest = Self::interest_for_period(snapshot.balance, snapshot.apr, days);

        Ok(Accrual {
            days,
            interest,
            new_balance: snapshot.balance + interest,
            description: format!(
                "Interest for {} day{} at {}% APR",
                days,
                if days == 1 { "" } else { "s" },
                snapshot.apr.normalize()
            ),
        })
    }

    /// Interest avoided over the horizon by repaying `amount` now
    pub fn interest_savings(&self, apr: Decimal, amount: Decimal) -> Decimal {
        Self::interest_for_period(amount, apr, self.horizon_days)
    }

    /// What paying each percentage of the balance would cost and save
    pub fn repayment_options(
        &self,
        balance: Decimal,
        apr: Decimal,
        percentages: &[Decimal],
    ) -> Vec<RepaymentOption> {
        percentages
            .iter()
            .map(|pct| {
                let amount = round_money(balance * *pct / Decimal::ONE_HUNDRED);
                RepaymentOption {
                    percentage: *pct,
                    amount,
                    interest_to_pay: Self::interest_for_period(
                        balance - amount,
                        apr,
                        self.horizon_days,
                    ),
                    interest_saved: self.interest_savings(apr, amount),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn snapshot(balance: Decimal, apr: Decimal) -> AccountSnapshot {
        AccountSnapshot {
            balance,
            apr,
            due_date: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_daily_rate() {
        assert_eq!(
            InterestCalculator::daily_rate(dec!(36.5)),
            dec!(0.001)
        );
    }

    #[test]
    fn test_thirty_days_at_24_percent() {
        let accrual = InterestCalculator::default()
            .accrue(&snapshot(dec!(100), dec!(24)), 30)
            .unwrap();
        assert_eq!(accrual.interest, dec!(1.97));
        assert_eq!(accrual.new_balance, dec!(101.97));
        assert_eq!(accrual.description, "Interest for 30 days at 24% APR");
    }

    #[test]
    fn test_zero_days_leaves_balance_unchanged() {
        for balance in [dec!(0), dec!(0.01), dec!(100), dec!(98765.43)] {
            let accrual = InterestCalculator::default()
                .accrue(&snapshot(balance, dec!(19.9)), 0)
                .unwrap();
            assert_eq!(accrual.interest, Decimal::ZERO);
            assert_eq!(accrual.new_balance, balance);
        }
    }

    #[test]
    fn test_zero_balance_accrues_nothing() {
        let accrual = InterestCalculator::default()
            .accrue(&snapshot(dec!(0), dec!(24)), 365)
            .unwrap();
        assert_eq!(accrual.interest, Decimal::ZERO);
    }

    #[test]
    fn test_rejects_invalid_input() {
        let calc = InterestCalculator::default();
        assert_eq!(
            calc.accrue(&snapshot(dec!(-5), dec!(24)), 1),
            Err(EngineError::NegativeBalance(dec!(-5)))
        );
        assert_eq!(
            calc.accrue(&snapshot(dec!(5), dec!(-1)), 1),
            Err(EngineError::NonPositiveApr(dec!(-1)))
        );
        assert_eq!(
            calc.accrue(&snapshot(dec!(5), dec!(24)), -3),
            Err(EngineError::NegativeDays(-3))
        );
    }

    #[test]
    fn test_interest_savings_over_horizon() {
        // 1000 at 36.5 % for 30 days = 1000 * 0.001 * 30
        let calc = InterestCalculator::new(30);
        assert_eq!(calc.interest_savings(dec!(36.5), dec!(1000)), dec!(30.00));
    }

    #[test]
    fn test_repayment_options() {
        let calc = InterestCalculator::new(30);
        let options = calc.repayment_options(dec!(1000), dec!(36.5), &[dec!(10), dec!(100)]);
        assert_eq!(options.len(), 2);

        assert_eq!(options[0].amount, dec!(100.00));
        assert_eq!(options[0].interest_to_pay, dec!(27.00));
        assert_eq!(options[0].interest_saved, dec!(3.00));

        assert_eq!(options[1].amount, dec!(1000.00));
        assert_eq!(options[1].interest_to_pay, Decimal::ZERO);
        assert_eq!(options[1].interest_saved, dec!(30.00));
    }
}
