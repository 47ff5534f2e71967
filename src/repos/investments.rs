use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    database::PostgresConnection,
    investments::{Investment, InvestmentAccount, InvestmentAccountData, InvestmentData},
};

pub type DynInvestmentRepo = Arc<dyn InvestmentRepo + Send + Sync>;

#[async_trait]
pub trait InvestmentRepo {
    async fn list_accounts(&self, owner_id: Uuid) -> Result<Vec<InvestmentAccount>>;

    async fn get_account(&self, owner_id: Uuid, account_id: Uuid)
        -> Result<Option<InvestmentAccount>>;

    async fn create_account(
        &self,
        owner_id: Uuid,
        data: &InvestmentAccountData,
    ) -> Result<InvestmentAccount>;

    async fn update_account(
        &self,
        owner_id: Uuid,
        account_id: Uuid,
        data: &InvestmentAccountData,
    ) -> Result<Option<InvestmentAccount>>;

    /// Delete an investment account and every investment in it.
    async fn delete_account(&self, owner_id: Uuid, account_id: Uuid) -> Result<bool>;

    /// Investments held in any of the given accounts.
    async fn list_investments(&self, account_ids: &[Uuid]) -> Result<Vec<Investment>>;

    /// Get an investment held in one of the owner's accounts.
    async fn get_investment(&self, owner_id: Uuid, investment_id: Uuid)
        -> Result<Option<Investment>>;

    async fn create_investment(&self, account_id: Uuid, data: &InvestmentData)
        -> Result<Investment>;

    async fn update_investment(&self, investment_id: Uuid, data: &InvestmentData)
        -> Result<Investment>;

    async fn delete_investment(&self, investment_id: Uuid) -> Result<()>;
}

#[async_trait]
impl InvestmentRepo for PostgresConnection {
    async fn list_accounts(&self, owner_id: Uuid) -> Result<Vec<InvestmentAccount>> {
        Ok(sqlx::query_as::<_, InvestmentAccount>(
            r#"
            SELECT *
            FROM investment_account
            WHERE owner_id = $1
            ORDER BY name
            "#,
        )
        .bind(owner_id)
        .fetch_all(&**self)
        .await?)
    }

    async fn get_account(
        &self,
        owner_id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<InvestmentAccount>> {
        Ok(sqlx::query_as::<_, InvestmentAccount>(
            r#"
            SELECT *
            FROM investment_account
            WHERE owner_id = $1 AND id = $2
            "#,
        )
        .bind(owner_id)
        .bind(account_id)
        .fetch_optional(&**self)
        .await?)
    }

    async fn create_account(
        &self,
        owner_id: Uuid,
        data: &InvestmentAccountData,
    ) -> Result<InvestmentAccount> {
        Ok(sqlx::query_as::<_, InvestmentAccount>(
            r#"
            INSERT INTO investment_account (owner_id, name, platform)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&data.name)
        .bind(&data.platform)
        .fetch_one(&**self)
        .await?)
    }

    async fn update_account(
        &self,
        owner_id: Uuid,
        account_id: Uuid,
        data: &InvestmentAccountData,
    ) -> Result<Option<InvestmentAccount>> {
        Ok(sqlx::query_as::<_, InvestmentAccount>(
            r#"
            UPDATE investment_account
            SET name = $3, platform = $4, updated_at = NOW()
            WHERE owner_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(account_id)
        .bind(&data.name)
        .bind(&data.platform)
        .fetch_optional(&**self)
        .await?)
    }

    async fn delete_account(&self, owner_id: Uuid, account_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM investment_account
            WHERE owner_id = $1 AND id = $2
            "#,
        )
        .bind(owner_id)
        .bind(account_id)
        .execute(&**self)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_investments(&self, account_ids: &[Uuid]) -> Result<Vec<Investment>> {
        Ok(sqlx::query_as::<_, Investment>(
            r#"
            SELECT *
            FROM investment
            WHERE investment_account_id = ANY($1)
            ORDER BY symbol, purchase_date
            "#,
        )
        .bind(account_ids)
        .fetch_all(&**self)
        .await?)
    }

    async fn get_investment(
        &self,
        owner_id: Uuid,
        investment_id: Uuid,
    ) -> Result<Option<Investment>> {
        Ok(sqlx::query_as::<_, Investment>(
            r#"
            SELECT i.*
            FROM investment i
                JOIN investment_account a ON a.id = i.investment_account_id
            WHERE a.owner_id = $1 AND i.id = $2
            "#,
        )
        .bind(owner_id)
        .bind(investment_id)
        .fetch_optional(&**self)
        .await?)
    }

    async fn create_investment(
        &self,
        account_id: Uuid,
        data: &InvestmentData,
    ) -> Result<Investment> {
        Ok(sqlx::query_as::<_, Investment>(
            r#"
            INSERT INTO investment (
                investment_account_id,
                symbol,
                name,
                shares,
                purchase_price,
                current_price,
                purchase_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(&data.symbol)
        .bind(&data.name)
        .bind(data.shares)
        .bind(data.purchase_price)
        .bind(data.current_price)
        .bind(data.purchase_date)
        .fetch_one(&**self)
        .await?)
    }

    async fn update_investment(
        &self,
        investment_id: Uuid,
        data: &InvestmentData,
    ) -> Result<Investment> {
        Ok(sqlx::query_as::<_, Investment>(
            r#"
            UPDATE investment
            SET symbol = $2,
                name = $3,
                shares = $4,
                purchase_price = $5,
                current_price = $6,
                purchase_date = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(investment_id)
        .bind(&data.symbol)
        .bind(&data.name)
        .bind(data.shares)
        .bind(data.purchase_price)
        .bind(data.current_price)
        .bind(data.purchase_date)
        .fetch_one(&**self)
        .await?)
    }

    async fn delete_investment(&self, investment_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM investment
            WHERE id = $1
            "#,
        )
        .bind(investment_id)
        .execute(&**self)
        .await?;

        Ok(())
    }
}
