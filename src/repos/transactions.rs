use std::{collections::BTreeSet, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::{
    analytics::Delta,
    database::PostgresConnection,
    transactions::{
        NewTransactionData, Transaction, TransactionCollection, TransactionCursor,
        TransactionQuery,
    },
};

use super::{analytics, push_accessible_accounts, ACCESSIBLE_ACCOUNTS};

pub type DynTransactionRepo = Arc<dyn TransactionRepo + Send + Sync>;

#[async_trait]
pub trait TransactionRepo {
    /// Persist a transaction and update its account's balance and analytics.
    async fn create_transaction(
        &self,
        created_by: Uuid,
        data: &NewTransactionData,
    ) -> Result<Transaction>;

    /// Persist several transactions at once. Either all of them are saved or
    /// none are.
    async fn create_transactions(
        &self,
        created_by: Uuid,
        entries: &[NewTransactionData],
    ) -> Result<Vec<Transaction>>;

    /// Get a transaction from one of the accounts the user can access.
    async fn get_transaction(&self, user_id: Uuid, transaction_id: Uuid)
        -> Result<Option<Transaction>>;

    /// Replace a transaction's data, moving its effect between accounts if
    /// necessary.
    ///
    /// # Returns
    ///
    /// The updated transaction, or `None` if it no longer exists.
    async fn update_transaction(
        &self,
        transaction_id: Uuid,
        data: &NewTransactionData,
    ) -> Result<Option<Transaction>>;

    /// Delete a transaction and reverse its effect on the account.
    async fn delete_transaction(&self, transaction_id: Uuid) -> Result<()>;

    /// List a page of transactions matching the query.
    async fn list_transactions(&self, query: TransactionQuery) -> Result<TransactionCollection>;

    /// List every transaction matching the query in chronological order,
    /// ignoring the cursor.
    async fn list_all_transactions(&self, query: TransactionQuery) -> Result<Vec<Transaction>>;

    /// Recurring templates on the accounts the user can access.
    async fn list_recurring(&self, user_id: Uuid) -> Result<Vec<Transaction>>;

    /// The balance of an account from every transaction dated before `date`.
    async fn balance_before(&self, account_id: Uuid, date: NaiveDate) -> Result<i64>;
}

const TRANSACTION_PAGE_SIZE: u8 = 50;

const SELECT_TRANSACTION: &str = r#"
    SELECT t.*, c.name AS category_name
    FROM "transaction" t
        LEFT JOIN category c ON c.id = t.category_id
"#;

/// Insert a transaction and apply its delta to the account. The caller is
/// responsible for refreshing the account's period changes afterwards.
pub(crate) async fn insert_transaction(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    created_by: Uuid,
    data: &NewTransactionData,
) -> Result<Transaction> {
    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO "transaction" (
            account_id,
            category_id,
            created_by,
            kind,
            amount,
            description,
            "date",
            recurrence,
            recurrence_end_date
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(data.account_id)
    .bind(data.category_id)
    .bind(created_by)
    .bind(data.kind)
    .bind(data.amount)
    .bind(&data.description)
    .bind(data.date)
    .bind(data.recurrence_frequency())
    .bind(data.recurrence_end_date())
    .fetch_one(&mut *tx)
    .await?;

    analytics::apply_delta(
        tx,
        transaction.account_id,
        Delta::for_entry(transaction.kind, transaction.amount),
    )
    .await?;

    Ok(transaction)
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &TransactionQuery) {
    builder.push(" WHERE t.account_id IN ");
    push_accessible_accounts(builder, query.user_id);

    if let Some(account_id) = query.account_id {
        builder.push(" AND t.account_id = ").push_bind(account_id);
    }

    if let Some(category_id) = query.category_id {
        builder.push(" AND t.category_id = ").push_bind(category_id);
    }

    if let Some(kind) = query.kind {
        builder.push(" AND t.kind = ").push_bind(kind);
    }

    if let Some(from) = query.from {
        builder.push(r#" AND t."date" >= "#).push_bind(from);
    }

    if let Some(to) = query.to {
        builder.push(r#" AND t."date" <= "#).push_bind(to);
    }

    if let Some(search) = query.search.as_ref().filter(|s| !s.trim().is_empty()) {
        builder
            .push(" AND t.description ILIKE '%' || ")
            .push_bind(search.trim().to_owned())
            .push(" || '%'");
    }

    match query.recurring {
        Some(true) => {
            builder.push(" AND t.recurrence IS NOT NULL");
        }
        Some(false) => {
            builder.push(" AND t.recurrence IS NULL");
        }
        None => (),
    }
}

#[async_trait]
impl TransactionRepo for PostgresConnection {
    async fn create_transaction(
        &self,
        created_by: Uuid,
        data: &NewTransactionData,
    ) -> Result<Transaction> {
        let mut tx = self.begin().await?;

        let transaction = insert_transaction(&mut tx, created_by, data).await?;
        analytics::refresh_changes(&mut tx, transaction.account_id, Utc::now().date_naive())
            .await?;

        tx.commit().await?;

        Ok(transaction)
    }

    async fn create_transactions(
        &self,
        created_by: Uuid,
        entries: &[NewTransactionData],
    ) -> Result<Vec<Transaction>> {
        let mut tx = self.begin().await?;

        let mut transactions = Vec::with_capacity(entries.len());
        for entry in entries {
            transactions.push(insert_transaction(&mut tx, created_by, entry).await?);
        }

        let today = Utc::now().date_naive();
        let touched_accounts = entries.iter().map(|e| e.account_id).collect::<BTreeSet<_>>();
        for account_id in touched_accounts {
            analytics::refresh_changes(&mut tx, account_id, today).await?;
        }

        tx.commit().await?;

        Ok(transactions)
    }

    async fn get_transaction(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>> {
        let query = format!(
            r#"
            {}
            WHERE t.id = $2
                AND t.account_id IN ({})
            "#,
            SELECT_TRANSACTION, ACCESSIBLE_ACCOUNTS
        );

        Ok(sqlx::query_as::<_, Transaction>(&query)
            .bind(user_id)
            .bind(transaction_id)
            .fetch_optional(&**self)
            .await?)
    }

    async fn update_transaction(
        &self,
        transaction_id: Uuid,
        data: &NewTransactionData,
    ) -> Result<Option<Transaction>> {
        let mut tx = self.begin().await?;

        let existing = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT *
            FROM "transaction"
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&mut tx)
        .await?;

        let existing = match existing {
            Some(t) => t,
            None => {
                debug!(%transaction_id, "Transaction disappeared before update.");

                return Ok(None);
            }
        };

        analytics::apply_delta(
            &mut tx,
            existing.account_id,
            Delta::for_entry(existing.kind, existing.amount).reversed(),
        )
        .await?;

        let updated = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE "transaction"
            SET account_id = $2,
                category_id = $3,
                kind = $4,
                amount = $5,
                description = $6,
                "date" = $7,
                recurrence = $8,
                recurrence_end_date = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(transaction_id)
        .bind(data.account_id)
        .bind(data.category_id)
        .bind(data.kind)
        .bind(data.amount)
        .bind(&data.description)
        .bind(data.date)
        .bind(data.recurrence_frequency())
        .bind(data.recurrence_end_date())
        .fetch_one(&mut tx)
        .await?;

        analytics::apply_delta(
            &mut tx,
            updated.account_id,
            Delta::for_entry(updated.kind, updated.amount),
        )
        .await?;

        let today = Utc::now().date_naive();
        analytics::refresh_changes(&mut tx, existing.account_id, today).await?;
        if updated.account_id != existing.account_id {
            analytics::refresh_changes(&mut tx, updated.account_id, today).await?;
        }

        tx.commit().await?;

        Ok(Some(updated))
    }

    async fn delete_transaction(&self, transaction_id: Uuid) -> Result<()> {
        let mut tx = self.begin().await?;

        let deleted = sqlx::query_as::<_, Transaction>(
            r#"
            DELETE FROM "transaction"
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&mut tx)
        .await?;

        if let Some(deleted) = deleted {
            analytics::apply_delta(
                &mut tx,
                deleted.account_id,
                Delta::for_entry(deleted.kind, deleted.amount).reversed(),
            )
            .await?;
            analytics::refresh_changes(&mut tx, deleted.account_id, Utc::now().date_naive())
                .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn list_transactions(&self, query: TransactionQuery) -> Result<TransactionCollection> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(SELECT_TRANSACTION);
        push_filters(&mut builder, &query);

        if let Some(cursor) = query.after.as_ref() {
            builder
                .push(r#" AND (t."date" < "#)
                .push_bind(cursor.after_date)
                .push(r#" OR (t."date" = "#)
                .push_bind(cursor.after_date)
                .push(" AND t.created_at < ")
                .push_bind(cursor.after_created_at)
                .push("))");
        }

        builder
            .push(r#" ORDER BY t."date" DESC, t.created_at DESC LIMIT "#)
            // Select one more than the page size so we can determine if there
            // is a next page.
            .push_bind(i16::from(TRANSACTION_PAGE_SIZE) + 1);

        let mut items = builder
            .build_query_as::<Transaction>()
            .fetch_all(&**self)
            .await?;

        let has_next_page = items.len() > usize::from(TRANSACTION_PAGE_SIZE);
        if has_next_page {
            items.pop();
        }

        let next = if has_next_page {
            items.last().map(|last| TransactionCursor {
                after_date: last.date,
                after_created_at: last.created_at,
            })
        } else {
            None
        };

        Ok(TransactionCollection { next, items })
    }

    async fn list_all_transactions(&self, query: TransactionQuery) -> Result<Vec<Transaction>> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(SELECT_TRANSACTION);
        push_filters(&mut builder, &query);
        builder.push(r#" ORDER BY t."date", t.created_at"#);

        Ok(builder
            .build_query_as::<Transaction>()
            .fetch_all(&**self)
            .await?)
    }

    async fn list_recurring(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        let query = format!(
            r#"
            {}
            WHERE t.recurrence IS NOT NULL
                AND t.account_id IN ({})
            ORDER BY t."date"
            "#,
            SELECT_TRANSACTION, ACCESSIBLE_ACCOUNTS
        );

        Ok(sqlx::query_as::<_, Transaction>(&query)
            .bind(user_id)
            .fetch_all(&**self)
            .await?)
    }

    async fn balance_before(&self, account_id: Uuid, date: NaiveDate) -> Result<i64> {
        let (balance,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(
                SUM(CASE WHEN kind = 'income' THEN amount ELSE -amount END),
                0
            )::BIGINT
            FROM "transaction"
            WHERE account_id = $1
                AND "date" < $2
            "#,
        )
        .bind(account_id)
        .bind(date)
        .fetch_one(&**self)
        .await?;

        Ok(balance)
    }
}
