use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Months, NaiveDate};
use sqlx::{Postgres, Transaction};
use tracing::trace;
use uuid::Uuid;

use crate::{
    analytics::{Analytics, CategoryTotal, Delta, MonthlyTotal, PeriodChanges, PeriodTotals, Summary},
    database::PostgresConnection,
    dates,
};

use super::ACCESSIBLE_ACCOUNTS;

pub type DynAnalyticsRepo = Arc<dyn AnalyticsRepo + Send + Sync>;

#[async_trait]
pub trait AnalyticsRepo {
    async fn get_analytics(&self, account_id: Uuid) -> Result<Option<Analytics>>;

    /// Totals over every account the user can access.
    async fn summary(&self, user_id: Uuid) -> Result<Summary>;

    /// Income and expense per calendar month starting with the month that
    /// contains `since`. Months without transactions are omitted.
    async fn monthly_totals(&self, user_id: Uuid, since: NaiveDate) -> Result<Vec<MonthlyTotal>>;

    /// Expenses grouped by category within an inclusive date range.
    async fn category_totals(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CategoryTotal>>;
}

#[async_trait]
impl AnalyticsRepo for PostgresConnection {
    async fn get_analytics(&self, account_id: Uuid) -> Result<Option<Analytics>> {
        Ok(sqlx::query_as::<_, Analytics>(
            r#"
            SELECT *
            FROM analytics
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&**self)
        .await?)
    }

    async fn summary(&self, user_id: Uuid) -> Result<Summary> {
        let query = format!(
            r#"
            SELECT
                COALESCE(SUM(an.income), 0)::BIGINT AS income,
                COALESCE(SUM(an.expense), 0)::BIGINT AS expense,
                COALESCE(SUM(a.balance), 0)::BIGINT AS balance,
                COUNT(a.id) AS account_count
            FROM account a
                LEFT JOIN analytics an ON an.account_id = a.id
            WHERE a.id IN ({})
            "#,
            ACCESSIBLE_ACCOUNTS
        );

        Ok(sqlx::query_as::<_, Summary>(&query)
            .bind(user_id)
            .fetch_one(&**self)
            .await?)
    }

    async fn monthly_totals(&self, user_id: Uuid, since: NaiveDate) -> Result<Vec<MonthlyTotal>> {
        let query = format!(
            r#"
            SELECT
                date_trunc('month', t."date")::DATE AS month,
                COALESCE(SUM(t.amount) FILTER (WHERE t.kind = 'income'), 0)::BIGINT AS income,
                COALESCE(SUM(t.amount) FILTER (WHERE t.kind = 'expense'), 0)::BIGINT AS expense
            FROM "transaction" t
            WHERE t.account_id IN ({})
                AND t."date" >= $2
            GROUP BY 1
            ORDER BY 1
            "#,
            ACCESSIBLE_ACCOUNTS
        );

        Ok(sqlx::query_as::<_, MonthlyTotal>(&query)
            .bind(user_id)
            .bind(dates::month_start(since))
            .fetch_all(&**self)
            .await?)
    }

    async fn category_totals(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CategoryTotal>> {
        let query = format!(
            r#"
            SELECT
                t.category_id,
                c.name AS category_name,
                SUM(t.amount)::BIGINT AS total,
                COUNT(*) AS transaction_count
            FROM "transaction" t
                LEFT JOIN category c ON c.id = t.category_id
            WHERE t.account_id IN ({})
                AND t.kind = 'expense'
                AND t."date" BETWEEN $2 AND $3
            GROUP BY t.category_id, c.name
            ORDER BY total DESC
            "#,
            ACCESSIBLE_ACCOUNTS
        );

        Ok(sqlx::query_as::<_, CategoryTotal>(&query)
            .bind(user_id)
            .bind(from)
            .bind(to)
            .fetch_all(&**self)
            .await?)
    }
}

/// Create the empty analytics row for a new account.
pub(crate) async fn insert_row(tx: &mut Transaction<'_, Postgres>, account_id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO analytics (account_id)
        VALUES ($1)
        "#,
    )
    .bind(account_id)
    .execute(&mut *tx)
    .await?;

    Ok(())
}

/// Apply a change to an account's analytics row and running balance.
pub(crate) async fn apply_delta(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    delta: Delta,
) -> Result<()> {
    if delta.is_zero() {
        return Ok(());
    }

    trace!(%account_id, ?delta, "Applying analytics delta.");

    sqlx::query(
        r#"
        INSERT INTO analytics (account_id, income, expense, balance)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (account_id) DO UPDATE
        SET income = analytics.income + EXCLUDED.income,
            expense = analytics.expense + EXCLUDED.expense,
            balance = analytics.balance + EXCLUDED.balance,
            updated_at = NOW()
        "#,
    )
    .bind(account_id)
    .bind(delta.income)
    .bind(delta.expense)
    .bind(delta.balance)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE account
        SET balance = balance + $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(account_id)
    .bind(delta.balance)
    .execute(&mut *tx)
    .await?;

    Ok(())
}

/// Recompute the month-over-month changes of an account as of `today`.
pub(crate) async fn refresh_changes(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    today: NaiveDate,
) -> Result<()> {
    let this_month = dates::month_start(today);
    let last_month = this_month - Months::new(1);
    let next_month = this_month + Months::new(1);

    // Entries dated after the current month count toward neither balance.
    let totals = sqlx::query_as::<_, PeriodTotals>(
        r#"
        SELECT
            COALESCE(SUM(amount) FILTER (
                WHERE kind = 'income' AND "date" >= $2 AND "date" < $4
            ), 0)::BIGINT AS current_income,
            COALESCE(SUM(amount) FILTER (
                WHERE kind = 'expense' AND "date" >= $2 AND "date" < $4
            ), 0)::BIGINT AS current_expense,
            COALESCE(SUM(amount) FILTER (
                WHERE kind = 'income' AND "date" >= $3 AND "date" < $2
            ), 0)::BIGINT AS previous_income,
            COALESCE(SUM(amount) FILTER (
                WHERE kind = 'expense' AND "date" >= $3 AND "date" < $2
            ), 0)::BIGINT AS previous_expense,
            COALESCE(SUM(
                CASE WHEN kind = 'income' THEN amount ELSE -amount END
            ) FILTER (WHERE "date" < $4), 0)::BIGINT AS current_balance,
            COALESCE(SUM(
                CASE WHEN kind = 'income' THEN amount ELSE -amount END
            ) FILTER (WHERE "date" < $2), 0)::BIGINT AS previous_balance
        FROM "transaction"
        WHERE account_id = $1
        "#,
    )
    .bind(account_id)
    .bind(this_month)
    .bind(last_month)
    .bind(next_month)
    .fetch_one(&mut *tx)
    .await?;

    let changes = PeriodChanges::from_totals(&totals);

    sqlx::query(
        r#"
        UPDATE analytics
        SET income_change = $2,
            expense_change = $3,
            balance_change = $4,
            updated_at = NOW()
        WHERE account_id = $1
        "#,
    )
    .bind(account_id)
    .bind(changes.income)
    .bind(changes.expense)
    .bind(changes.balance)
    .execute(&mut *tx)
    .await?;

    Ok(())
}
