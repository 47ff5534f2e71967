use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    accounts::{
        Account, AccountMember, AccountRole, AccountUpdateData, AccountWithAnalytics,
        NewAccountData, OpeningTransaction,
    },
    analytics::Analytics,
    database::PostgresConnection,
    transactions::NewTransactionData,
};

use super::{analytics, transactions, ACCESSIBLE_ACCOUNTS};

pub type DynAccountRepo = Arc<dyn AccountRepo + Send + Sync>;

#[async_trait]
pub trait AccountRepo {
    /// Create an account with its analytics row and, if given, the
    /// transaction that brings it to its opening balance.
    async fn create_account(
        &self,
        owner_id: Uuid,
        data: &NewAccountData,
        opening: Option<OpeningTransaction>,
    ) -> Result<Account>;

    /// Every account the user owns or is a member of.
    async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<AccountWithAnalytics>>;

    /// Get an account the user has access to.
    async fn get_account(&self, user_id: Uuid, account_id: Uuid)
        -> Result<Option<AccountWithAnalytics>>;

    async fn update_account(&self, account_id: Uuid, data: &AccountUpdateData) -> Result<Account>;

    async fn delete_account(&self, account_id: Uuid) -> Result<()>;

    async fn list_members(&self, account_id: Uuid) -> Result<Vec<AccountMember>>;

    /// # Returns
    ///
    /// `true` if the user was a member.
    async fn remove_member(&self, account_id: Uuid, user_id: Uuid) -> Result<bool>;
}

#[derive(sqlx::FromRow)]
struct AccountWithRoleRow {
    #[sqlx(flatten)]
    account: Account,
    is_owner: bool,
}

/// Insert an account along with its analytics row.
pub(crate) async fn insert_account(
    tx: &mut Transaction<'_, Postgres>,
    owner_id: Uuid,
    name: &str,
    description: Option<&str>,
    is_default: bool,
) -> Result<Account> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO account (owner_id, name, description, is_default)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(owner_id)
    .bind(name)
    .bind(description)
    .bind(is_default)
    .fetch_one(&mut *tx)
    .await?;

    analytics::insert_row(tx, account.id).await?;

    Ok(account)
}

impl PostgresConnection {
    async fn attach_analytics(
        &self,
        rows: Vec<AccountWithRoleRow>,
    ) -> Result<Vec<AccountWithAnalytics>> {
        let account_ids = rows.iter().map(|row| row.account.id).collect::<Vec<_>>();

        let mut analytics = sqlx::query_as::<_, Analytics>(
            r#"
            SELECT *
            FROM analytics
            WHERE account_id = ANY($1)
            "#,
        )
        .bind(&account_ids)
        .fetch_all(&**self)
        .await?
        .into_iter()
        .map(|row| (row.account_id, row))
        .collect::<HashMap<_, _>>();

        Ok(rows
            .into_iter()
            .map(|row| AccountWithAnalytics {
                analytics: analytics.remove(&row.account.id),
                role: if row.is_owner {
                    AccountRole::Owner
                } else {
                    AccountRole::Member
                },
                account: row.account,
            })
            .collect())
    }
}

#[async_trait]
impl AccountRepo for PostgresConnection {
    async fn create_account(
        &self,
        owner_id: Uuid,
        data: &NewAccountData,
        opening: Option<OpeningTransaction>,
    ) -> Result<Account> {
        let mut tx = self.begin().await?;

        let mut account = insert_account(
            &mut tx,
            owner_id,
            &data.name,
            data.description.as_deref(),
            false,
        )
        .await?;

        if let Some(opening) = opening {
            let entry = NewTransactionData {
                account_id: account.id,
                category_id: None,
                kind: opening.kind,
                amount: opening.amount,
                description: opening.description,
                date: opening.date,
                recurrence: None,
            };
            transactions::insert_transaction(&mut tx, owner_id, &entry).await?;
            analytics::refresh_changes(&mut tx, account.id, Utc::now().date_naive()).await?;

            account.balance = entry.kind.signed(entry.amount);
        }

        tx.commit().await?;

        Ok(account)
    }

    async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<AccountWithAnalytics>> {
        let query = format!(
            r#"
            SELECT a.*, a.owner_id = $1 AS is_owner
            FROM account a
            WHERE a.id IN ({})
            ORDER BY a.is_default DESC, a.created_at
            "#,
            ACCESSIBLE_ACCOUNTS
        );

        let rows = sqlx::query_as::<_, AccountWithRoleRow>(&query)
            .bind(user_id)
            .fetch_all(&**self)
            .await?;

        self.attach_analytics(rows).await
    }

    async fn get_account(
        &self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<AccountWithAnalytics>> {
        let query = format!(
            r#"
            SELECT a.*, a.owner_id = $1 AS is_owner
            FROM account a
            WHERE a.id = $2
                AND a.id IN ({})
            "#,
            ACCESSIBLE_ACCOUNTS
        );

        let row = sqlx::query_as::<_, AccountWithRoleRow>(&query)
            .bind(user_id)
            .bind(account_id)
            .fetch_optional(&**self)
            .await?;

        match row {
            Some(row) => Ok(self.attach_analytics(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn update_account(&self, account_id: Uuid, data: &AccountUpdateData) -> Result<Account> {
        Ok(sqlx::query_as::<_, Account>(
            r#"
            UPDATE account
            SET name = $2, description = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(&data.name)
        .bind(&data.description)
        .fetch_one(&**self)
        .await?)
    }

    async fn delete_account(&self, account_id: Uuid) -> Result<()> {
        // Transactions, analytics, members and invitations go with it.
        sqlx::query(
            r#"
            DELETE FROM account
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .execute(&**self)
        .await?;

        Ok(())
    }

    async fn list_members(&self, account_id: Uuid) -> Result<Vec<AccountMember>> {
        Ok(sqlx::query_as::<_, AccountMember>(
            r#"
            SELECT u.id AS user_id, u.name, u.email, m.created_at AS joined_at
            FROM account_member m
                JOIN "user" u ON u.id = m.user_id
            WHERE m.account_id = $1
            ORDER BY m.created_at
            "#,
        )
        .bind(account_id)
        .fetch_all(&**self)
        .await?)
    }

    async fn remove_member(&self, account_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM account_member
            WHERE account_id = $1 AND user_id = $2
            "#,
        )
        .bind(account_id)
        .bind(user_id)
        .execute(&**self)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
