pub mod http;
pub mod services;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{currency::MAX_AMOUNT, dates};

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SavingGoal {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub account_id: Option<Uuid>,
    pub name: String,
    pub target_amount: i64,
    pub saved_amount: i64,
    pub target_date: NaiveDate,
    #[serde(skip)]
    pub last_reminded_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavingGoal {
    pub fn is_complete(&self) -> bool {
        self.saved_amount >= self.target_amount
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewGoalData {
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    #[validate(range(min = 1, max = "MAX_AMOUNT"))]
    pub target_amount: i64,

    #[serde(default)]
    #[validate(range(min = 0, max = "MAX_AMOUNT"))]
    pub saved_amount: i64,

    pub target_date: NaiveDate,

    /// Account that contributions are drawn from, if any.
    pub account_id: Option<Uuid>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ContributionData {
    #[validate(range(min = 1, max = "MAX_AMOUNT"))]
    pub amount: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    #[serde(flatten)]
    pub goal: SavingGoal,
    pub percent: f64,
    pub remaining: i64,
    /// Negative once the target date has passed.
    pub days_left: i64,
    /// What has to be saved each month from now on to hit the target on time.
    /// `None` once the goal is complete or overdue.
    pub required_monthly: Option<i64>,
}

impl GoalProgress {
    pub fn new(goal: SavingGoal, today: NaiveDate) -> Self {
        let remaining = (goal.target_amount - goal.saved_amount).max(0);
        let days_left = (goal.target_date - today).num_days();
        let percent = if goal.target_amount > 0 {
            ((goal.saved_amount as f64 / goal.target_amount as f64) * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        let required_monthly = if remaining == 0 || days_left < 0 {
            None
        } else {
            let months = i64::from(dates::months_until(today, goal.target_date));
            // Round up so the last month isn't short.
            Some((remaining + months - 1) / months)
        };

        Self {
            goal,
            percent,
            remaining,
            days_left,
            required_monthly,
        }
    }
}

/// Days before the target date on which a reminder goes out.
pub const REMINDER_DAYS: [i64; 4] = [30, 7, 1, 0];

/// The number of days left if a reminder for the goal is due today.
pub fn reminder_due(goal: &SavingGoal, today: NaiveDate) -> Option<i64> {
    if goal.is_complete() || goal.last_reminded_on == Some(today) {
        return None;
    }

    let days_left = (goal.target_date - today).num_days();

    REMINDER_DAYS.contains(&days_left).then_some(days_left)
}

#[cfg(test)]
mod test {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn goal(saved: i64, target_date: NaiveDate) -> SavingGoal {
        SavingGoal {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            account_id: None,
            name: "Bike".to_owned(),
            target_amount: 120_000,
            saved_amount: saved,
            target_date,
            last_reminded_on: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn progress_splits_remaining_over_months() {
        let progress = GoalProgress::new(goal(20_000, date(2024, 5, 1)), date(2024, 1, 1));

        assert_eq!(100_000, progress.remaining);
        assert_eq!(16.67, progress.percent);
        assert_eq!(121, progress.days_left);
        assert_eq!(Some(25_000), progress.required_monthly);
    }

    #[test]
    fn required_monthly_rounds_up() {
        let progress = GoalProgress::new(goal(0, date(2024, 4, 1)), date(2024, 1, 1));

        assert_eq!(Some(40_000), progress.required_monthly);

        let progress = GoalProgress::new(goal(20_001, date(2024, 5, 1)), date(2024, 1, 1));
        assert_eq!(Some(25_000), progress.required_monthly);
    }

    #[test]
    fn complete_and_overdue_goals_need_nothing_monthly() {
        let complete = GoalProgress::new(goal(120_000, date(2024, 5, 1)), date(2024, 1, 1));
        let overdue = GoalProgress::new(goal(0, date(2023, 12, 1)), date(2024, 1, 1));

        assert_eq!(None, complete.required_monthly);
        assert_eq!(0, complete.remaining);
        assert_eq!(None, overdue.required_monthly);
        assert_eq!(-31, overdue.days_left);
    }

    #[test]
    fn reminders_on_fixed_days_only() {
        let today = date(2024, 1, 1);

        assert_eq!(Some(7), reminder_due(&goal(0, date(2024, 1, 8)), today));
        assert_eq!(Some(0), reminder_due(&goal(0, today), today));
        assert_eq!(None, reminder_due(&goal(0, date(2024, 1, 9)), today));
    }

    #[test]
    fn no_reminder_twice_a_day_or_when_complete() {
        let today = date(2024, 1, 1);
        let mut reminded = goal(0, date(2024, 1, 2));
        reminded.last_reminded_on = Some(today);

        assert_eq!(None, reminder_due(&reminded, today));
        assert_eq!(None, reminder_due(&goal(120_000, date(2024, 1, 2)), today));
    }
}
