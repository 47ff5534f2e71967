//! Calendar arithmetic shared by budgets, reminders and schedules.

use chrono::{Datelike, Months, NaiveDate};

/// Add whole months to a date, clamping to the last day of the resulting
/// month, eg Jan 31 + 1 month = Feb 28/29.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// The number of calendar month boundaries between two dates, ignoring the
/// day of month. Negative when `to` is before `from`.
pub fn month_difference(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32
}

/// The first day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// The number of months from `from` until `to`, counting a partial month as a
/// whole one. Never less than one.
pub fn months_until(from: NaiveDate, to: NaiveDate) -> u32 {
    let mut months = month_difference(from, to);
    if to.day() > from.day() {
        months += 1;
    }

    months.max(1) as u32
}

#[cfg(test)]
mod test {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn add_months_clamps_to_month_end() {
        assert_eq!(date(2024, 2, 29), add_months(date(2024, 1, 31), 1));
        assert_eq!(date(2024, 3, 31), add_months(date(2024, 1, 31), 2));
        assert_eq!(date(2025, 2, 28), add_months(date(2024, 2, 29), 12));
    }

    #[test]
    fn month_difference_across_years() {
        assert_eq!(13, month_difference(date(2023, 12, 31), date(2025, 1, 1)));
        assert_eq!(-1, month_difference(date(2024, 3, 1), date(2024, 2, 28)));
    }

    #[test]
    fn months_until_rounds_partial_months_up() {
        assert_eq!(1, months_until(date(2024, 1, 15), date(2024, 1, 20)));
        assert_eq!(2, months_until(date(2024, 1, 15), date(2024, 2, 20)));
        assert_eq!(1, months_until(date(2024, 1, 15), date(2024, 2, 15)));
        assert_eq!(1, months_until(date(2024, 3, 15), date(2024, 1, 1)));
    }
}
