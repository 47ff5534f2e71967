//! Interest and repayment arithmetic. All amounts are in minor units.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{
    currency::{self, Currency, MAX_AMOUNT},
    dates,
};

use super::InterestType;

/// Interest accrued at a flat rate: `P·r·t`.
///
/// # Arguments
///
/// * `principal` - The borrowed amount.
/// * `annual_rate` - Annual interest rate as a percentage, eg `5.0` for 5%.
/// * `years` - Duration, possibly fractional.
pub fn simple_interest(principal: i64, annual_rate: f64, years: f64) -> i64 {
    Currency::round_minor(principal as f64 * annual_rate / 100.0 * years)
}

/// Interest accrued with compounding: `P(1 + r/n)^(n·t) − P`.
pub fn compound_interest(
    principal: i64,
    annual_rate: f64,
    years: f64,
    compounds_per_year: u32,
) -> i64 {
    let n = f64::from(compounds_per_year.max(1));
    let growth = (1.0 + annual_rate / 100.0 / n).powf(n * years);

    Currency::round_minor(principal as f64 * growth - principal as f64)
}

fn default_compounds_per_year() -> u32 {
    12
}

/// `principal + interest` if it stays within [`MAX_AMOUNT`].
///
/// Interest that saturated while rounding to minor units never fits.
pub fn checked_total(principal: i64, interest: i64) -> Option<i64> {
    principal
        .checked_add(interest)
        .filter(|total| (0..=MAX_AMOUNT).contains(total))
}

/// Request for a one-off interest calculation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_total", skip_on_field_errors = true))]
pub struct InterestCalculation {
    #[validate(range(min = 0, max = "MAX_AMOUNT"))]
    pub principal: i64,

    /// Annual rate as a percentage.
    #[validate(range(min = 0.0, max = 1000.0))]
    pub rate: f64,

    #[validate(range(min = 0.0, max = 100.0))]
    pub years: f64,

    #[serde(rename = "type")]
    pub interest_type: InterestType,

    #[serde(default = "default_compounds_per_year")]
    #[validate(range(min = 1, max = 365))]
    pub compounds_per_year: u32,
}

fn validate_total(calculation: &InterestCalculation) -> Result<(), ValidationError> {
    let interest = calculation.interest();

    match checked_total(calculation.principal, interest) {
        Some(_) => Ok(()),
        None => Err(currency::amount_too_large("total_too_large")),
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct InterestResult {
    pub interest: i64,
    pub total: i64,
}

impl InterestCalculation {
    fn interest(&self) -> i64 {
        match self.interest_type {
            InterestType::Simple => simple_interest(self.principal, self.rate, self.years),
            InterestType::Compound => compound_interest(
                self.principal,
                self.rate,
                self.years,
                self.compounds_per_year,
            ),
        }
    }

    /// Only meaningful once validated. Unvalidated inputs saturate rather
    /// than overflow.
    pub fn calculate(&self) -> InterestResult {
        let interest = self.interest();

        InterestResult {
            interest,
            total: self.principal.saturating_add(interest),
        }
    }
}

/// The fixed monthly payment that clears `principal` in `months` payments.
///
/// `P·r / (1 − (1 + r)^−n)` with `r` the monthly rate, or `P / n` when there
/// is no interest.
pub fn monthly_payment(principal: i64, annual_rate: f64, months: u32) -> i64 {
    let n = f64::from(months.max(1));
    let r = annual_rate / 12.0 / 100.0;

    if r == 0.0 {
        return Currency::round_minor(principal as f64 / n);
    }

    Currency::round_minor(principal as f64 * r / (1.0 - (1.0 + r).powf(-n)))
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    pub period: u32,
    pub due_date: NaiveDate,
    pub payment: i64,
    pub interest: i64,
    pub principal: i64,
    pub balance: i64,
}

/// Amortization schedule with a fixed monthly payment, the first one due a
/// month after `start_date`.
///
/// Payments are rounded to minor units, so the final row absorbs whatever
/// residue is left and always ends on a zero balance.
pub fn amortization_schedule(
    principal: i64,
    annual_rate: f64,
    months: u32,
    start_date: NaiveDate,
) -> Vec<ScheduleRow> {
    let r = annual_rate / 12.0 / 100.0;
    let payment = monthly_payment(principal, annual_rate, months);

    let mut balance = principal;
    let mut rows = Vec::with_capacity(months as usize);

    for period in 1..=months {
        let interest = Currency::round_minor(balance as f64 * r);
        let mut principal_part = payment - interest;
        if period == months || principal_part > balance {
            principal_part = balance;
        }

        balance -= principal_part;
        rows.push(ScheduleRow {
            period,
            due_date: dates::add_months(start_date, period),
            payment: principal_part + interest,
            interest,
            principal: principal_part,
            balance,
        });

        if balance == 0 {
            break;
        }
    }

    rows
}
