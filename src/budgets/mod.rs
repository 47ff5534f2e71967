//! Spending limits per category and the windows they are measured over.

pub mod http;
pub mod services;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{currency::MAX_AMOUNT, dates};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "budget_period", rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub category_id: Uuid,
    pub amount: i64,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    pub alert_threshold: i16,
    /// Start of the last window an alert was sent for.
    pub last_alerted_window: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_alert_threshold() -> i16 {
    80
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewBudgetData {
    pub category_id: Uuid,

    #[validate(range(min = 1, max = "MAX_AMOUNT"))]
    pub amount: i64,

    pub period: BudgetPeriod,

    pub start_date: NaiveDate,

    /// Percentage of the budget at which an alert is sent.
    #[serde(default = "default_alert_threshold")]
    #[validate(range(min = 1, max = 100))]
    pub alert_threshold: i16,
}

/// A half-open date range `[start, end)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BudgetWindow {
    /// The last day inside the window.
    pub fn last_day(&self) -> NaiveDate {
        self.end - Duration::days(1)
    }
}

fn nth_window_start(period: BudgetPeriod, start_date: NaiveDate, n: u32) -> NaiveDate {
    match period {
        BudgetPeriod::Weekly => start_date + Duration::weeks(n.into()),
        BudgetPeriod::Monthly => dates::add_months(start_date, n),
        BudgetPeriod::Yearly => dates::add_months(start_date, n.saturating_mul(12)),
    }
}

/// The budget window containing `today`.
///
/// Windows repeat from `start_date`. Before the budget starts, the first
/// window is returned.
pub fn window_containing(period: BudgetPeriod, start_date: NaiveDate, today: NaiveDate) -> BudgetWindow {
    let mut n: u32 = if today <= start_date {
        0
    } else {
        let estimate = match period {
            BudgetPeriod::Weekly => (today - start_date).num_weeks(),
            BudgetPeriod::Monthly => i64::from(dates::month_difference(start_date, today)),
            BudgetPeriod::Yearly => i64::from(dates::month_difference(start_date, today)) / 12,
        };

        u32::try_from(estimate.max(0)).unwrap_or(0)
    };

    // The estimate can overshoot by one when the day of month hasn't come
    // around yet.
    while n > 0 && nth_window_start(period, start_date, n) > today {
        n -= 1;
    }

    BudgetWindow {
        start: nth_window_start(period, start_date, n),
        end: nth_window_start(period, start_date, n + 1),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetProgress {
    #[serde(flatten)]
    pub budget: Budget,
    pub category_name: String,
    pub window: BudgetWindow,
    pub spent: i64,
    pub remaining: i64,
    pub percent_used: f64,
    pub threshold_reached: bool,
}

impl BudgetProgress {
    pub fn new(budget: Budget, category_name: String, window: BudgetWindow, spent: i64) -> Self {
        let percent_used = percent_used(spent, budget.amount);
        let threshold_reached = percent_used >= f64::from(budget.alert_threshold);

        Self {
            remaining: budget.amount.saturating_sub(spent),
            budget,
            category_name,
            window,
            spent,
            percent_used,
            threshold_reached,
        }
    }

    /// Whether an alert should go out for the current window.
    pub fn needs_alert(&self) -> bool {
        self.threshold_reached && self.budget.last_alerted_window != Some(self.window.start)
    }
}

/// The share of `amount` that `spent` represents, rounded to two decimals.
pub fn percent_used(spent: i64, amount: i64) -> f64 {
    if amount <= 0 {
        return 0.0;
    }

    ((spent as f64 / amount as f64) * 10_000.0).round() / 100.0
}
