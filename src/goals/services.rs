use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    accounts::services::AccountService,
    repos::DynGoalRepo,
    service_err::{ServiceError, ServiceResult},
    transactions::{NewTransactionData, TransactionKind},
};

use super::{ContributionData, GoalProgress, NewGoalData, SavingGoal};

#[derive(Clone)]
pub struct GoalService {
    goal_repo: DynGoalRepo,
    account_service: AccountService,
}

/// The expense recorded on a goal's account for a contribution.
fn contribution_entry(goal: &SavingGoal, account_id: Uuid, amount: i64, today: NaiveDate) -> NewTransactionData {
    NewTransactionData {
        account_id,
        category_id: None,
        kind: TransactionKind::Expense,
        amount,
        description: format!("Contribution to {}", goal.name),
        date: today,
        recurrence: None,
    }
}

impl GoalService {
    pub fn new(goal_repo: DynGoalRepo, account_service: AccountService) -> Self {
        Self {
            goal_repo,
            account_service,
        }
    }

    async fn check_account(&self, owner_id: Uuid, data: &NewGoalData) -> ServiceResult<()> {
        if let Some(account_id) = data.account_id {
            self.account_service.get_account(owner_id, account_id).await?;
        }

        Ok(())
    }

    async fn find_goal(&self, owner_id: Uuid, goal_id: Uuid) -> ServiceResult<SavingGoal> {
        self.goal_repo
            .get_goal(owner_id, goal_id)
            .await?
            .ok_or(ServiceError::NotFound("Goal"))
    }

    pub async fn list_goals(&self, owner_id: Uuid, today: NaiveDate) -> ServiceResult<Vec<GoalProgress>> {
        Ok(self
            .goal_repo
            .list_goals(owner_id)
            .await?
            .into_iter()
            .map(|goal| GoalProgress::new(goal, today))
            .collect())
    }

    pub async fn get_goal(
        &self,
        owner_id: Uuid,
        goal_id: Uuid,
        today: NaiveDate,
    ) -> ServiceResult<GoalProgress> {
        Ok(GoalProgress::new(self.find_goal(owner_id, goal_id).await?, today))
    }

    pub async fn create_goal(
        &self,
        owner_id: Uuid,
        data: NewGoalData,
        today: NaiveDate,
    ) -> ServiceResult<GoalProgress> {
        data.validate()?;
        self.check_account(owner_id, &data).await?;

        let goal = self.goal_repo.create_goal(owner_id, &data).await?;

        Ok(GoalProgress::new(goal, today))
    }

    pub async fn update_goal(
        &self,
        owner_id: Uuid,
        goal_id: Uuid,
        data: NewGoalData,
        today: NaiveDate,
    ) -> ServiceResult<GoalProgress> {
        data.validate()?;
        self.check_account(owner_id, &data).await?;

        let goal = self
            .goal_repo
            .update_goal(owner_id, goal_id, &data)
            .await?
            .ok_or(ServiceError::NotFound("Goal"))?;

        Ok(GoalProgress::new(goal, today))
    }

    pub async fn delete_goal(&self, owner_id: Uuid, goal_id: Uuid) -> ServiceResult<()> {
        if self.goal_repo.delete_goal(owner_id, goal_id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Goal"))
        }
    }

    /// Add to a goal. When the goal draws from an account the amount is
    /// also recorded there as an expense.
    pub async fn contribute(
        &self,
        owner_id: Uuid,
        goal_id: Uuid,
        data: ContributionData,
        today: NaiveDate,
    ) -> ServiceResult<GoalProgress> {
        data.validate()?;
        let goal = self.find_goal(owner_id, goal_id).await?;

        let withdrawal = match goal.account_id {
            Some(account_id) => {
                self.account_service.get_account(owner_id, account_id).await?;

                Some((owner_id, contribution_entry(&goal, account_id, data.amount, today)))
            }
            None => None,
        };

        let goal = self
            .goal_repo
            .contribute(goal.id, data.amount, withdrawal)
            .await?;

        info!(goal_id = %goal.id, amount = data.amount, "Recorded goal contribution.");

        Ok(GoalProgress::new(goal, today))
    }
}
