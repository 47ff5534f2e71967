use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    budgets::{Budget, BudgetWindow, NewBudgetData},
    database::PostgresConnection,
};

use super::ACCESSIBLE_ACCOUNTS;

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct BudgetWithCategory {
    #[sqlx(flatten)]
    pub budget: Budget,
    pub category_name: String,
}

pub type DynBudgetRepo = Arc<dyn BudgetRepo + Send + Sync>;

#[async_trait]
pub trait BudgetRepo {
    async fn list_budgets(&self, owner_id: Uuid) -> Result<Vec<BudgetWithCategory>>;

    async fn get_budget(&self, owner_id: Uuid, budget_id: Uuid)
        -> Result<Option<BudgetWithCategory>>;

    async fn create_budget(&self, owner_id: Uuid, data: &NewBudgetData) -> Result<Budget>;

    async fn update_budget(
        &self,
        owner_id: Uuid,
        budget_id: Uuid,
        data: &NewBudgetData,
    ) -> Result<Option<Budget>>;

    async fn delete_budget(&self, owner_id: Uuid, budget_id: Uuid) -> Result<bool>;

    /// Expenses in a category across the accounts the owner can access,
    /// within the window.
    async fn spent(&self, owner_id: Uuid, category_id: Uuid, window: BudgetWindow) -> Result<i64>;

    /// Remember that an alert went out for the window starting on
    /// `window_start`.
    async fn mark_alerted(&self, budget_id: Uuid, window_start: NaiveDate) -> Result<()>;
}

const SELECT_BUDGET: &str = r#"
    SELECT b.*, c.name AS category_name
    FROM budget b
        JOIN category c ON c.id = b.category_id
"#;

#[async_trait]
impl BudgetRepo for PostgresConnection {
    async fn list_budgets(&self, owner_id: Uuid) -> Result<Vec<BudgetWithCategory>> {
        let query = format!(
            r#"
            {}
            WHERE b.owner_id = $1
            ORDER BY c.name, b.created_at
            "#,
            SELECT_BUDGET
        );

        Ok(sqlx::query_as::<_, BudgetWithCategory>(&query)
            .bind(owner_id)
            .fetch_all(&**self)
            .await?)
    }

    async fn get_budget(
        &self,
        owner_id: Uuid,
        budget_id: Uuid,
    ) -> Result<Option<BudgetWithCategory>> {
        let query = format!(
            r#"
            {}
            WHERE b.owner_id = $1 AND b.id = $2
            "#,
            SELECT_BUDGET
        );

        Ok(sqlx::query_as::<_, BudgetWithCategory>(&query)
            .bind(owner_id)
            .bind(budget_id)
            .fetch_optional(&**self)
            .await?)
    }

    async fn create_budget(&self, owner_id: Uuid, data: &NewBudgetData) -> Result<Budget> {
        Ok(sqlx::query_as::<_, Budget>(
            r#"
            INSERT INTO budget (owner_id, category_id, amount, period, start_date, alert_threshold)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(data.category_id)
        .bind(data.amount)
        .bind(data.period)
        .bind(data.start_date)
        .bind(data.alert_threshold)
        .fetch_one(&**self)
        .await?)
    }

    async fn update_budget(
        &self,
        owner_id: Uuid,
        budget_id: Uuid,
        data: &NewBudgetData,
    ) -> Result<Option<Budget>> {
        // Changing the budget resets the alert so the new limit is honored
        // in the current window.
        Ok(sqlx::query_as::<_, Budget>(
            r#"
            UPDATE budget
            SET category_id = $3,
                amount = $4,
                period = $5,
                start_date = $6,
                alert_threshold = $7,
                last_alerted_window = NULL,
                updated_at = NOW()
            WHERE owner_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(budget_id)
        .bind(data.category_id)
        .bind(data.amount)
        .bind(data.period)
        .bind(data.start_date)
        .bind(data.alert_threshold)
        .fetch_optional(&**self)
        .await?)
    }

    async fn delete_budget(&self, owner_id: Uuid, budget_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM budget
            WHERE owner_id = $1 AND id = $2
            "#,
        )
        .bind(owner_id)
        .bind(budget_id)
        .execute(&**self)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn spent(&self, owner_id: Uuid, category_id: Uuid, window: BudgetWindow) -> Result<i64> {
        let query = format!(
            r#"
            SELECT COALESCE(SUM(t.amount), 0)::BIGINT
            FROM "transaction" t
            WHERE t.account_id IN ({})
                AND t.category_id = $2
                AND t.kind = 'expense'
                AND t."date" >= $3
                AND t."date" < $4
            "#,
            ACCESSIBLE_ACCOUNTS
        );

        let (spent,): (i64,) = sqlx::query_as(&query)
            .bind(owner_id)
            .bind(category_id)
            .bind(window.start)
            .bind(window.end)
            .fetch_one(&**self)
            .await?;

        Ok(spent)
    }

    async fn mark_alerted(&self, budget_id: Uuid, window_start: NaiveDate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE budget
            SET last_alerted_window = $2
            WHERE id = $1
            "#,
        )
        .bind(budget_id)
        .bind(window_start)
        .execute(&**self)
        .await?;

        Ok(())
    }
}
