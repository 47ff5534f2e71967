use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    database::PostgresConnection,
    goals::{NewGoalData, SavingGoal},
    transactions::NewTransactionData,
};

use super::{analytics, transactions};

pub type DynGoalRepo = Arc<dyn GoalRepo + Send + Sync>;

#[async_trait]
pub trait GoalRepo {
    async fn list_goals(&self, owner_id: Uuid) -> Result<Vec<SavingGoal>>;

    async fn get_goal(&self, owner_id: Uuid, goal_id: Uuid) -> Result<Option<SavingGoal>>;

    async fn create_goal(&self, owner_id: Uuid, data: &NewGoalData) -> Result<SavingGoal>;

    async fn update_goal(
        &self,
        owner_id: Uuid,
        goal_id: Uuid,
        data: &NewGoalData,
    ) -> Result<Option<SavingGoal>>;

    async fn delete_goal(&self, owner_id: Uuid, goal_id: Uuid) -> Result<bool>;

    /// Add to a goal's saved amount, recording `withdrawal` on the goal's
    /// account in the same database transaction when given.
    async fn contribute(
        &self,
        goal_id: Uuid,
        amount: i64,
        withdrawal: Option<(Uuid, NewTransactionData)>,
    ) -> Result<SavingGoal>;

    async fn mark_reminded(&self, goal_id: Uuid, on: NaiveDate) -> Result<()>;
}

#[async_trait]
impl GoalRepo for PostgresConnection {
    async fn list_goals(&self, owner_id: Uuid) -> Result<Vec<SavingGoal>> {
        Ok(sqlx::query_as::<_, SavingGoal>(
            r#"
            SELECT *
            FROM saving_goal
            WHERE owner_id = $1
            ORDER BY target_date, name
            "#,
        )
        .bind(owner_id)
        .fetch_all(&**self)
        .await?)
    }

    async fn get_goal(&self, owner_id: Uuid, goal_id: Uuid) -> Result<Option<SavingGoal>> {
        Ok(sqlx::query_as::<_, SavingGoal>(
            r#"
            SELECT *
            FROM saving_goal
            WHERE owner_id = $1 AND id = $2
            "#,
        )
        .bind(owner_id)
        .bind(goal_id)
        .fetch_optional(&**self)
        .await?)
    }

    async fn create_goal(&self, owner_id: Uuid, data: &NewGoalData) -> Result<SavingGoal> {
        Ok(sqlx::query_as::<_, SavingGoal>(
            r#"
            INSERT INTO saving_goal (owner_id, account_id, name, target_amount, saved_amount, target_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(data.account_id)
        .bind(&data.name)
        .bind(data.target_amount)
        .bind(data.saved_amount)
        .bind(data.target_date)
        .fetch_one(&**self)
        .await?)
    }

    async fn update_goal(
        &self,
        owner_id: Uuid,
        goal_id: Uuid,
        data: &NewGoalData,
    ) -> Result<Option<SavingGoal>> {
        Ok(sqlx::query_as::<_, SavingGoal>(
            r#"
            UPDATE saving_goal
            SET account_id = $3,
                name = $4,
                target_amount = $5,
                saved_amount = $6,
                target_date = $7,
                updated_at = NOW()
            WHERE owner_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(goal_id)
        .bind(data.account_id)
        .bind(&data.name)
        .bind(data.target_amount)
        .bind(data.saved_amount)
        .bind(data.target_date)
        .fetch_optional(&**self)
        .await?)
    }

    async fn delete_goal(&self, owner_id: Uuid, goal_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM saving_goal
            WHERE owner_id = $1 AND id = $2
            "#,
        )
        .bind(owner_id)
        .bind(goal_id)
        .execute(&**self)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn contribute(
        &self,
        goal_id: Uuid,
        amount: i64,
        withdrawal: Option<(Uuid, NewTransactionData)>,
    ) -> Result<SavingGoal> {
        let mut tx = self.begin().await?;

        let goal = sqlx::query_as::<_, SavingGoal>(
            r#"
            UPDATE saving_goal
            SET saved_amount = saved_amount + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(goal_id)
        .bind(amount)
        .fetch_one(&mut tx)
        .await?;

        if let Some((created_by, entry)) = withdrawal {
            transactions::insert_transaction(&mut tx, created_by, &entry).await?;
            analytics::refresh_changes(&mut tx, entry.account_id, Utc::now().date_naive())
                .await?;
        }

        tx.commit().await?;

        Ok(goal)
    }

    async fn mark_reminded(&self, goal_id: Uuid, on: NaiveDate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE saving_goal
            SET last_reminded_on = $2
            WHERE id = $1
            "#,
        )
        .bind(goal_id)
        .bind(on)
        .execute(&**self)
        .await?;

        Ok(())
    }
}
