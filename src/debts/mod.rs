pub mod calculators;
pub mod http;
pub mod services;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::currency::{self, MAX_AMOUNT};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "interest_type", rename_all = "lowercase")]
pub enum InterestType {
    Simple,
    /// Compounded monthly.
    Compound,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub lender: String,
    pub principal: i64,
    /// Annual rate as a percentage.
    pub interest_rate: f64,
    pub interest_type: InterestType,
    pub term_months: i32,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub amount_paid: i64,
    pub is_paid: bool,
    #[serde(skip)]
    pub last_reminded_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Debt {
    fn years(&self) -> f64 {
        f64::from(self.term_months) / 12.0
    }

    /// Interest over the full term.
    pub fn interest(&self) -> i64 {
        match self.interest_type {
            InterestType::Simple => {
                calculators::simple_interest(self.principal, self.interest_rate, self.years())
            }
            InterestType::Compound => {
                calculators::compound_interest(self.principal, self.interest_rate, self.years(), 12)
            }
        }
    }

    /// Principal plus interest, saturating for terms that were stored
    /// before amounts were bounded.
    pub fn total_due(&self) -> i64 {
        self.principal.saturating_add(self.interest())
    }

    pub fn outstanding(&self) -> i64 {
        self.total_due().saturating_sub(self.amount_paid).max(0)
    }

    /// Record a payment, marking the debt paid once the total is covered.
    pub fn apply_payment(&mut self, amount: i64) {
        self.amount_paid = self.amount_paid.saturating_add(amount);
        self.is_paid = self.amount_paid >= self.total_due();
    }

    /// Check a payment against what is still owed and apply it if it fits.
    pub fn pay(mut self, amount: i64) -> PaymentOutcome {
        if self.is_paid {
            return PaymentOutcome::AlreadyPaid;
        }

        let outstanding = self.outstanding();
        if amount > outstanding {
            return PaymentOutcome::ExceedsOutstanding(outstanding);
        }

        self.apply_payment(amount);

        PaymentOutcome::Recorded(self)
    }

    pub fn schedule(&self) -> Vec<calculators::ScheduleRow> {
        calculators::amortization_schedule(
            self.principal,
            self.interest_rate,
            u32::try_from(self.term_months).unwrap_or(1),
            self.start_date,
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PaymentOutcome {
    Recorded(Debt),
    AlreadyPaid,
    /// The payment was refused. Holds what was still owed.
    ExceedsOutstanding(i64),
}

/// How many days before the due date unpaid debts start getting reminders.
pub const REMINDER_WINDOW_DAYS: i64 = 7;

/// Days until the due date if a reminder should go out today.
pub fn reminder_due(debt: &Debt, today: NaiveDate) -> Option<i64> {
    if debt.is_paid || debt.last_reminded_on == Some(today) {
        return None;
    }

    let days_left = (debt.due_date - today).num_days();

    (0..=REMINDER_WINDOW_DAYS)
        .contains(&days_left)
        .then_some(days_left)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtWithTotals {
    #[serde(flatten)]
    pub debt: Debt,
    pub interest: i64,
    pub total_due: i64,
    pub outstanding: i64,
}

impl From<Debt> for DebtWithTotals {
    fn from(debt: Debt) -> Self {
        Self {
            interest: debt.interest(),
            total_due: debt.total_due(),
            outstanding: debt.outstanding(),
            debt,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_terms", skip_on_field_errors = true))]
pub struct NewDebtData {
    #[validate(length(min = 1, max = 128))]
    pub lender: String,

    #[validate(range(min = 1, max = "MAX_AMOUNT"))]
    pub principal: i64,

    #[validate(range(min = 0.0, max = 100.0))]
    pub interest_rate: f64,

    pub interest_type: InterestType,

    #[validate(range(min = 1, max = 600))]
    pub term_months: i32,

    pub start_date: NaiveDate,

    pub due_date: NaiveDate,
}

fn validate_terms(data: &NewDebtData) -> Result<(), ValidationError> {
    if data.due_date < data.start_date {
        let mut error = ValidationError::new("due_before_start");
        error.message = Some("The due date must not be before the start date.".into());

        return Err(error);
    }

    let years = f64::from(data.term_months) / 12.0;
    let interest = match data.interest_type {
        InterestType::Simple => {
            calculators::simple_interest(data.principal, data.interest_rate, years)
        }
        InterestType::Compound => {
            calculators::compound_interest(data.principal, data.interest_rate, years, 12)
        }
    };

    if calculators::checked_total(data.principal, interest).is_none() {
        return Err(currency::amount_too_large("total_due_too_large"));
    }

    Ok(())
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct PaymentData {
    #[validate(range(min = 1, max = "MAX_AMOUNT"))]
    pub amount: i64,
}
