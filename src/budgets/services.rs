use chrono::NaiveDate;
use uuid::Uuid;
use validator::Validate;

use crate::{
    repos::{budgets::BudgetWithCategory, DynBudgetRepo, DynCategoryRepo},
    service_err::{ServiceError, ServiceResult},
    transactions::TransactionKind,
};

use super::{window_containing, BudgetProgress, NewBudgetData};

#[derive(Clone)]
pub struct BudgetService {
    budget_repo: DynBudgetRepo,
    category_repo: DynCategoryRepo,
}

impl BudgetService {
    pub fn new(budget_repo: DynBudgetRepo, category_repo: DynCategoryRepo) -> Self {
        Self {
            budget_repo,
            category_repo,
        }
    }

    async fn progress(
        &self,
        owner_id: Uuid,
        budget: BudgetWithCategory,
        today: NaiveDate,
    ) -> ServiceResult<BudgetProgress> {
        let window = window_containing(budget.budget.period, budget.budget.start_date, today);
        let spent = self
            .budget_repo
            .spent(owner_id, budget.budget.category_id, window)
            .await?;

        Ok(BudgetProgress::new(
            budget.budget,
            budget.category_name,
            window,
            spent,
        ))
    }

    /// Budgets may only track the owner's own expense categories.
    async fn check_category(&self, owner_id: Uuid, data: &NewBudgetData) -> ServiceResult<()> {
        let category = self
            .category_repo
            .get_category(owner_id, data.category_id)
            .await?
            .ok_or(ServiceError::NotFound("Category"))?;

        if category.kind != TransactionKind::Expense {
            return Err(ServiceError::Invalid(
                "Budgets can only track expense categories.".to_owned(),
            ));
        }

        Ok(())
    }

    pub async fn list_budgets(
        &self,
        owner_id: Uuid,
        today: NaiveDate,
    ) -> ServiceResult<Vec<BudgetProgress>> {
        let budgets = self.budget_repo.list_budgets(owner_id).await?;

        let mut progress = Vec::with_capacity(budgets.len());
        for budget in budgets {
            progress.push(self.progress(owner_id, budget, today).await?);
        }

        Ok(progress)
    }

    pub async fn get_budget(
        &self,
        owner_id: Uuid,
        budget_id: Uuid,
        today: NaiveDate,
    ) -> ServiceResult<BudgetProgress> {
        let budget = self
            .budget_repo
            .get_budget(owner_id, budget_id)
            .await?
            .ok_or(ServiceError::NotFound("Budget"))?;

        self.progress(owner_id, budget, today).await
    }

    pub async fn create_budget(
        &self,
        owner_id: Uuid,
        data: NewBudgetData,
        today: NaiveDate,
    ) -> ServiceResult<BudgetProgress> {
        data.validate()?;
        self.check_category(owner_id, &data).await?;

        let budget = self.budget_repo.create_budget(owner_id, &data).await?;

        self.get_budget(owner_id, budget.id, today).await
    }

    pub async fn update_budget(
        &self,
        owner_id: Uuid,
        budget_id: Uuid,
        data: NewBudgetData,
        today: NaiveDate,
    ) -> ServiceResult<BudgetProgress> {
        data.validate()?;
        self.check_category(owner_id, &data).await?;

        self.budget_repo
            .update_budget(owner_id, budget_id, &data)
            .await?
            .ok_or(ServiceError::NotFound("Budget"))?;

        self.get_budget(owner_id, budget_id, today).await
    }

    pub async fn delete_budget(&self, owner_id: Uuid, budget_id: Uuid) -> ServiceResult<()> {
        if self.budget_repo.delete_budget(owner_id, budget_id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Budget"))
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::{
        budgets::{Budget, BudgetPeriod, BudgetWindow},
        categories::services::test::FakeCategoryRepo,
        repos::{BudgetRepo, CategoryRepo},
    };

    use super::*;

    /// Budgets in memory with a fixed amount spent in every window.
    #[derive(Default)]
    pub(crate) struct FakeBudgetRepo {
        categories: Arc<FakeCategoryRepo>,
        budgets: Mutex<Vec<Budget>>,
        spent: i64,
    }

    #[async_trait]
    impl BudgetRepo for FakeBudgetRepo {
        async fn list_budgets(&self, owner_id: Uuid) -> Result<Vec<BudgetWithCategory>> {
            let budgets = self.budgets.lock().unwrap().clone();
            let mut listed = Vec::new();
            for budget in budgets.into_iter().filter(|b| b.owner_id == owner_id) {
                if let Some(with_category) = self.get_budget(owner_id, budget.id).await? {
                    listed.push(with_category);
                }
            }

            Ok(listed)
        }

        async fn get_budget(
            &self,
            owner_id: Uuid,
            budget_id: Uuid,
        ) -> Result<Option<BudgetWithCategory>> {
            let budget = self
                .budgets
                .lock()
                .unwrap()
                .iter()
                .find(|b| b.owner_id == owner_id && b.id == budget_id)
                .cloned();

            Ok(match budget {
                Some(budget) => {
                    let category = self
                        .categories
                        .get_category(owner_id, budget.category_id)
                        .await?;

                    Some(BudgetWithCategory {
                        budget,
                        category_name: category.map(|c| c.name).unwrap_or_default(),
                    })
                }
                None => None,
            })
        }

        async fn create_budget(&self, owner_id: Uuid, data: &NewBudgetData) -> Result<Budget> {
            let budget = Budget {
                id: Uuid::new_v4(),
                owner_id,
                category_id: data.category_id,
                amount: data.amount,
                period: data.period,
                start_date: data.start_date,
                alert_threshold: data.alert_threshold,
                last_alerted_window: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.budgets.lock().unwrap().push(budget.clone());

            Ok(budget)
        }

        async fn update_budget(
            &self,
            owner_id: Uuid,
            budget_id: Uuid,
            data: &NewBudgetData,
        ) -> Result<Option<Budget>> {
            Ok(self
                .budgets
                .lock()
                .unwrap()
                .iter_mut()
                .find(|b| b.owner_id == owner_id && b.id == budget_id)
                .map(|b| {
                    b.amount = data.amount;
                    b.period = data.period;
                    b.start_date = data.start_date;
                    b.alert_threshold = data.alert_threshold;
                    b.last_alerted_window = None;
                    b.clone()
                }))
        }

        async fn delete_budget(&self, owner_id: Uuid, budget_id: Uuid) -> Result<bool> {
            let mut budgets = self.budgets.lock().unwrap();
            let before = budgets.len();
            budgets.retain(|b| !(b.owner_id == owner_id && b.id == budget_id));

            Ok(budgets.len() < before)
        }

        async fn spent(&self, _owner_id: Uuid, _category_id: Uuid, _window: BudgetWindow) -> Result<i64> {
            Ok(self.spent)
        }

        async fn mark_alerted(&self, _budget_id: Uuid, _window_start: NaiveDate) -> Result<()> {
            Ok(())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn service(spent: i64) -> (BudgetService, Arc<FakeCategoryRepo>) {
        let categories = Arc::new(FakeCategoryRepo::default());
        let budgets = Arc::new(FakeBudgetRepo {
            categories: categories.clone(),
            budgets: Mutex::new(Vec::new()),
            spent,
        });

        (BudgetService::new(budgets, categories.clone()), categories)
    }

    fn data(category_id: Uuid) -> NewBudgetData {
        NewBudgetData {
            category_id,
            amount: 40_000,
            period: BudgetPeriod::Monthly,
            start_date: date(2024, 1, 1),
            alert_threshold: 75,
        }
    }

    #[tokio::test]
    async fn created_budget_reports_progress_for_current_window() {
        let (service, categories) = service(30_000);
        let owner = Uuid::new_v4();
        let food = categories.add_category(owner, "Food", TransactionKind::Expense);

        let progress = service
            .create_budget(owner, data(food.id), date(2024, 3, 9))
            .await
            .unwrap();

        assert_eq!("Food", progress.category_name);
        assert_eq!(date(2024, 3, 1), progress.window.start);
        assert_eq!(10_000, progress.remaining);
        assert_eq!(75.0, progress.percent_used);
        assert!(progress.threshold_reached);
    }

    #[tokio::test]
    async fn income_categories_cannot_be_budgeted() {
        let (service, categories) = service(0);
        let owner = Uuid::new_v4();
        let salary = categories.add_category(owner, "Salary", TransactionKind::Income);

        let result = service
            .create_budget(owner, data(salary.id), date(2024, 3, 9))
            .await;

        assert!(matches!(result, Err(ServiceError::Invalid(_))));
    }

    #[tokio::test]
    async fn threshold_must_be_a_percentage() {
        let (service, categories) = service(0);
        let owner = Uuid::new_v4();
        let food = categories.add_category(owner, "Food", TransactionKind::Expense);
        let mut data = data(food.id);
        data.alert_threshold = 101;

        let result = service.create_budget(owner, data, date(2024, 3, 9)).await;

        assert!(matches!(result, Err(ServiceError::InvalidData(_))));
    }
}
