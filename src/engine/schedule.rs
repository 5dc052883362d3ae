//! Billing-cycle due dates

use chrono::{DateTime, Duration, Utc};

/// A repayment is on time when it lands on or before the due date
pub fn is_on_time(due_date: DateTime<Utc>, applied_at: DateTime<Utc>) -> bool {
    applied_at <= due_date
}

/// Due date after a repayment made at `applied_at`.
///
/// A repayment inside the current cycle `(due - cycle, due]` or after the due
/// date moves the due date forward by whole cycles until it lies after
/// `applied_at`. A repayment made before the current cycle opened leaves it
/// untouched, so several payments in one cycle roll it only once.
pub fn next_due_date(
    due_date: DateTime<Utc>,
    applied_at: DateTime<Utc>,
    cycle_days: i64,
) -> DateTime<Utc> {
    let cycle = Duration::days(cycle_days.max(1));

    if applied_at <= due_date - cycle {
        return due_date;
    }

    let mut next = due_date + cycle;
    while next <= applied_at {
        next += cycle;
    }
    next
}
