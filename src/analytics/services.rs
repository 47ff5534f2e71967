use std::collections::HashMap;

use chrono::{Months, NaiveDate};
use uuid::Uuid;

use crate::{
    dates,
    repos::DynAnalyticsRepo,
    service_err::{ServiceError, ServiceResult},
};

use super::{CategoryTotal, MonthlyTotal, Summary};

pub const MAX_MONTHS: u32 = 36;

#[derive(Clone)]
pub struct AnalyticsService {
    analytics_repo: DynAnalyticsRepo,
}

impl AnalyticsService {
    pub fn new(analytics_repo: DynAnalyticsRepo) -> Self {
        Self { analytics_repo }
    }

    pub async fn summary(&self, user_id: Uuid) -> ServiceResult<Summary> {
        Ok(self.analytics_repo.summary(user_id).await?)
    }

    /// Income and expense for each of the last `months` calendar months,
    /// ending with the month containing `today`. Months without
    /// transactions are reported as zero.
    pub async fn monthly(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        months: u32,
    ) -> ServiceResult<Vec<MonthlyTotal>> {
        if months == 0 || months > MAX_MONTHS {
            return Err(ServiceError::Invalid(format!(
                "Months must be between 1 and {}.",
                MAX_MONTHS
            )));
        }

        let first = dates::month_start(today)
            .checked_sub_months(Months::new(months - 1))
            .ok_or_else(|| ServiceError::Invalid("Months reach too far back.".to_owned()))?;
        let totals = self.analytics_repo.monthly_totals(user_id, first).await?;

        Ok(fill_months(first, months, totals))
    }

    /// Expenses per category in the inclusive range. The range defaults to
    /// the current month up to `today`.
    pub async fn categories(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> ServiceResult<Vec<CategoryTotal>> {
        let from = from.unwrap_or_else(|| dates::month_start(today));
        let to = to.unwrap_or(today);
        if from > to {
            return Err(ServiceError::Invalid(
                "The start of the range must not be after its end.".to_owned(),
            ));
        }

        Ok(self.analytics_repo.category_totals(user_id, from, to).await?)
    }
}

fn fill_months(first: NaiveDate, months: u32, totals: Vec<MonthlyTotal>) -> Vec<MonthlyTotal> {
    let mut by_month: HashMap<NaiveDate, MonthlyTotal> =
        totals.into_iter().map(|t| (t.month, t)).collect();

    (0..months)
        .map(|offset| {
            let month = dates::add_months(first, offset);

            by_month.remove(&month).unwrap_or(MonthlyTotal {
                month,
                income: 0,
                expense: 0,
            })
        })
        .collect()
}
