//! Per-account running aggregates and the reports built on them.
//!
//! Every transaction write adjusts its account's analytics row with a
//! [`Delta`] inside the same database transaction, then recomputes the
//! month-over-month changes from [`PeriodTotals`].

pub mod http;
pub mod services;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::transactions::TransactionKind;

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub account_id: Uuid,
    pub income: i64,
    pub expense: i64,
    pub balance: i64,
    pub income_change: f64,
    pub expense_change: f64,
    pub balance_change: f64,
    pub updated_at: DateTime<Utc>,
}

/// A change to apply to an analytics row.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Delta {
    pub income: i64,
    pub expense: i64,
    pub balance: i64,
}

impl Delta {
    /// The change caused by writing a single entry.
    pub fn for_entry(kind: TransactionKind, amount: i64) -> Self {
        match kind {
            TransactionKind::Income => Self {
                income: amount,
                expense: 0,
                balance: amount,
            },
            TransactionKind::Expense => Self {
                income: 0,
                expense: amount,
                balance: -amount,
            },
        }
    }

    /// The change that undoes this one.
    pub fn reversed(self) -> Self {
        Self {
            income: -self.income,
            expense: -self.expense,
            balance: -self.balance,
        }
    }

    pub fn combine(self, other: Self) -> Self {
        Self {
            income: self.income + other.income,
            expense: self.expense + other.expense,
            balance: self.balance + other.balance,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Income and expense sums for the current and previous calendar month of a
/// single account, plus its balance at the end of each.
///
/// Entries dated after the current month are excluded from both balances.
#[derive(Clone, Copy, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct PeriodTotals {
    pub current_income: i64,
    pub current_expense: i64,
    pub previous_income: i64,
    pub previous_expense: i64,
    pub current_balance: i64,
    pub previous_balance: i64,
}

/// Month-over-month percentage changes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PeriodChanges {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

impl PeriodChanges {
    pub fn from_totals(totals: &PeriodTotals) -> Self {
        Self {
            income: percentage_change(totals.previous_income, totals.current_income),
            expense: percentage_change(totals.previous_expense, totals.current_expense),
            balance: percentage_change(totals.previous_balance, totals.current_balance),
        }
    }
}

/// Percentage change from `previous` to `current`, rounded to two decimals.
///
/// Zero when both are zero, and 100 when only `previous` is zero since there
/// is no base to divide by.
pub fn percentage_change(previous: i64, current: i64) -> f64 {
    if previous == 0 {
        return if current == 0 { 0.0 } else { 100.0 };
    }

    let change = (current - previous) as f64 / (previous as f64).abs() * 100.0;

    (change * 100.0).round() / 100.0
}

/// Totals across every account a user can access.
#[derive(Clone, Debug, Default, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub income: i64,
    pub expense: i64,
    pub balance: i64,
    pub account_count: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTotal {
    pub month: NaiveDate,
    pub income: i64,
    pub expense: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub total: i64,
    pub transaction_count: i64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn entry_and_reversal_cancel_out() {
        let delta = Delta::for_entry(TransactionKind::Expense, 1234);

        assert_eq!(-1234, delta.balance);
        assert!(delta.combine(delta.reversed()).is_zero());
    }

    #[test]
    fn moving_an_entry_nets_the_difference() {
        let old = Delta::for_entry(TransactionKind::Expense, 500);
        let new = Delta::for_entry(TransactionKind::Income, 200);

        assert_eq!(
            Delta {
                income: 200,
                expense: -500,
                balance: 700,
            },
            old.reversed().combine(new)
        );
    }

    #[test]
    fn percentage_change_handles_zero_base() {
        assert_eq!(0.0, percentage_change(0, 0));
        assert_eq!(100.0, percentage_change(0, 5));
    }

    #[test]
    fn percentage_change_rounds_to_two_decimals() {
        assert_eq!(33.33, percentage_change(300, 400));
        assert_eq!(-50.0, percentage_change(400, 200));
        // A negative base still reports an increase as positive.
        assert_eq!(50.0, percentage_change(-200, -100));
    }

    #[test]
    fn balance_change_compares_with_last_month_end() {
        let totals = PeriodTotals {
            current_income: 1000,
            current_expense: 500,
            previous_income: 2000,
            previous_expense: 1000,
            current_balance: 1500,
            previous_balance: 1000,
        };

        let changes = PeriodChanges::from_totals(&totals);

        assert_eq!(-50.0, changes.income);
        assert_eq!(-50.0, changes.expense);
        assert_eq!(50.0, changes.balance);
    }
}
