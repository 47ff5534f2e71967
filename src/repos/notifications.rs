//! Everything a notification sweep reads, joined with whoever should be
//! told about it.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::{
    budgets::{Budget, BudgetWindow},
    currency::Currency,
    database::PostgresConnection,
    debts::{Debt, REMINDER_WINDOW_DAYS},
    goals::{SavingGoal, REMINDER_DAYS},
    transactions::Transaction,
};

use super::{BudgetRepo, DebtRepo, GoalRepo};

/// The user a notification is addressed to.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Recipient {
    pub user_name: String,
    pub user_email: String,
    #[sqlx(flatten)]
    pub currency: Currency,
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct BudgetCandidate {
    #[sqlx(flatten)]
    pub budget: Budget,
    pub category_name: String,
    #[sqlx(flatten)]
    pub recipient: Recipient,
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct GoalCandidate {
    #[sqlx(flatten)]
    pub goal: SavingGoal,
    #[sqlx(flatten)]
    pub recipient: Recipient,
}

/// A recurring expense template and the account it is charged to.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct BillCandidate {
    #[sqlx(flatten)]
    pub transaction: Transaction,
    /// The occurrence the last reminder was sent for.
    pub last_reminded_on: Option<NaiveDate>,
    pub account_name: String,
    #[sqlx(flatten)]
    pub recipient: Recipient,
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct DebtCandidate {
    #[sqlx(flatten)]
    pub debt: Debt,
    #[sqlx(flatten)]
    pub recipient: Recipient,
}

pub type DynNotificationRepo = Arc<dyn NotificationRepo + Send + Sync>;

#[async_trait]
pub trait NotificationRepo {
    async fn budget_candidates(&self) -> Result<Vec<BudgetCandidate>>;

    async fn budget_spent(
        &self,
        owner_id: Uuid,
        category_id: Uuid,
        window: BudgetWindow,
    ) -> Result<i64>;

    async fn mark_budget_alerted(&self, budget_id: Uuid, window_start: NaiveDate) -> Result<()>;

    /// Unfinished goals with a target date in the reminder range.
    async fn goal_candidates(&self, today: NaiveDate) -> Result<Vec<GoalCandidate>>;

    async fn mark_goal_reminded(&self, goal_id: Uuid, on: NaiveDate) -> Result<()>;

    /// Recurring expense templates that have not ended yet.
    async fn bill_candidates(&self, today: NaiveDate) -> Result<Vec<BillCandidate>>;

    async fn mark_bill_reminded(&self, transaction_id: Uuid, occurrence: NaiveDate) -> Result<()>;

    /// Unpaid debts due in the reminder window.
    async fn debt_candidates(&self, today: NaiveDate) -> Result<Vec<DebtCandidate>>;

    async fn mark_debt_reminded(&self, debt_id: Uuid, on: NaiveDate) -> Result<()>;
}

const RECIPIENT_COLUMNS: &str = r#"
    u.name AS user_name,
    u.email AS user_email,
    cur.code,
    cur.symbol,
    cur.minor_units
"#;

#[async_trait]
impl NotificationRepo for PostgresConnection {
    async fn budget_candidates(&self) -> Result<Vec<BudgetCandidate>> {
        let query = format!(
            r#"
            SELECT b.*, c.name AS category_name, {}
            FROM budget b
                JOIN category c ON c.id = b.category_id
                JOIN "user" u ON u.id = b.owner_id
                JOIN currency cur ON cur.code = u.currency
            "#,
            RECIPIENT_COLUMNS
        );

        Ok(sqlx::query_as::<_, BudgetCandidate>(&query)
            .fetch_all(&**self)
            .await?)
    }

    async fn budget_spent(
        &self,
        owner_id: Uuid,
        category_id: Uuid,
        window: BudgetWindow,
    ) -> Result<i64> {
        BudgetRepo::spent(self, owner_id, category_id, window).await
    }

    async fn mark_budget_alerted(&self, budget_id: Uuid, window_start: NaiveDate) -> Result<()> {
        BudgetRepo::mark_alerted(self, budget_id, window_start).await
    }

    async fn goal_candidates(&self, today: NaiveDate) -> Result<Vec<GoalCandidate>> {
        let furthest = REMINDER_DAYS.iter().copied().max().unwrap_or(0);
        let query = format!(
            r#"
            SELECT g.*, {}
            FROM saving_goal g
                JOIN "user" u ON u.id = g.owner_id
                JOIN currency cur ON cur.code = u.currency
            WHERE g.saved_amount < g.target_amount
                AND g.target_date BETWEEN $1 AND $2
                AND g.last_reminded_on IS DISTINCT FROM $1
            "#,
            RECIPIENT_COLUMNS
        );

        Ok(sqlx::query_as::<_, GoalCandidate>(&query)
            .bind(today)
            .bind(today + Duration::days(furthest))
            .fetch_all(&**self)
            .await?)
    }

    async fn mark_goal_reminded(&self, goal_id: Uuid, on: NaiveDate) -> Result<()> {
        GoalRepo::mark_reminded(self, goal_id, on).await
    }

    async fn bill_candidates(&self, today: NaiveDate) -> Result<Vec<BillCandidate>> {
        let query = format!(
            r#"
            SELECT t.*, a.name AS account_name, {}
            FROM "transaction" t
                JOIN account a ON a.id = t.account_id
                JOIN "user" u ON u.id = a.owner_id
                JOIN currency cur ON cur.code = u.currency
            WHERE t.recurrence IS NOT NULL
                AND t.kind = 'expense'
                AND (t.recurrence_end_date IS NULL OR t.recurrence_end_date >= $1)
            "#,
            RECIPIENT_COLUMNS
        );

        Ok(sqlx::query_as::<_, BillCandidate>(&query)
            .bind(today)
            .fetch_all(&**self)
            .await?)
    }

    async fn mark_bill_reminded(&self, transaction_id: Uuid, occurrence: NaiveDate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE "transaction"
            SET last_reminded_on = $2
            WHERE id = $1
            "#,
        )
        .bind(transaction_id)
        .bind(occurrence)
        .execute(&**self)
        .await?;

        Ok(())
    }

    async fn debt_candidates(&self, today: NaiveDate) -> Result<Vec<DebtCandidate>> {
        let query = format!(
            r#"
            SELECT d.*, {}
            FROM debt d
                JOIN "user" u ON u.id = d.owner_id
                JOIN currency cur ON cur.code = u.currency
            WHERE NOT d.is_paid
                AND d.due_date BETWEEN $1 AND $2
                AND d.last_reminded_on IS DISTINCT FROM $1
            "#,
            RECIPIENT_COLUMNS
        );

        Ok(sqlx::query_as::<_, DebtCandidate>(&query)
            .bind(today)
            .bind(today + Duration::days(REMINDER_WINDOW_DAYS))
            .fetch_all(&**self)
            .await?)
    }

    async fn mark_debt_reminded(&self, debt_id: Uuid, on: NaiveDate) -> Result<()> {
        DebtRepo::mark_reminded(self, debt_id, on).await
    }
}
