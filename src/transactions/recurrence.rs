use chrono::{Duration, NaiveDate};

use crate::dates;

use super::RecurrenceFrequency;

/// The `n`th occurrence of a template that first occurs on `start`.
///
/// Monthly and yearly occurrences are always computed from the start date so
/// a template on the 31st returns to the 31st after a shorter month.
fn nth_occurrence(start: NaiveDate, frequency: RecurrenceFrequency, n: u32) -> NaiveDate {
    match frequency {
        RecurrenceFrequency::Daily => start + Duration::days(n.into()),
        RecurrenceFrequency::Weekly => start + Duration::weeks(n.into()),
        RecurrenceFrequency::Monthly => dates::add_months(start, n),
        RecurrenceFrequency::Yearly => dates::add_months(start, n.saturating_mul(12)),
    }
}

/// A lower bound for the occurrence index at or after `on_or_after`, so we
/// don't have to walk every occurrence since the start date.
fn first_candidate(start: NaiveDate, frequency: RecurrenceFrequency, on_or_after: NaiveDate) -> u32 {
    if on_or_after <= start {
        return 0;
    }

    let days = (on_or_after - start).num_days();
    let estimate = match frequency {
        RecurrenceFrequency::Daily => days,
        RecurrenceFrequency::Weekly => days / 7,
        RecurrenceFrequency::Monthly => i64::from(dates::month_difference(start, on_or_after)) - 1,
        RecurrenceFrequency::Yearly => i64::from(dates::month_difference(start, on_or_after)) / 12 - 1,
    };

    u32::try_from(estimate.max(0)).unwrap_or(u32::MAX)
}

/// The first occurrence of a recurring template on or after `on_or_after`.
///
/// # Arguments
///
/// * `start` - The date of the template itself, which is the first
///   occurrence.
/// * `frequency` - How often the template repeats.
/// * `end` - The last date an occurrence may fall on, if any.
/// * `on_or_after` - The earliest acceptable date.
pub fn next_occurrence(
    start: NaiveDate,
    frequency: RecurrenceFrequency,
    end: Option<NaiveDate>,
    on_or_after: NaiveDate,
) -> Option<NaiveDate> {
    let mut n = first_candidate(start, frequency, on_or_after);

    loop {
        let occurrence = nth_occurrence(start, frequency, n);
        if end.map_or(false, |end| occurrence > end) || occurrence == NaiveDate::MAX {
            return None;
        }
        if occurrence >= on_or_after {
            return Some(occurrence);
        }

        n = n.checked_add(1)?;
    }
}
