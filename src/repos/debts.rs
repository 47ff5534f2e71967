use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    database::PostgresConnection,
    debts::{Debt, NewDebtData, PaymentOutcome},
};

pub type DynDebtRepo = Arc<dyn DebtRepo + Send + Sync>;

#[async_trait]
pub trait DebtRepo {
    async fn list_debts(&self, owner_id: Uuid) -> Result<Vec<Debt>>;

    async fn get_debt(&self, owner_id: Uuid, debt_id: Uuid) -> Result<Option<Debt>>;

    async fn create_debt(&self, owner_id: Uuid, data: &NewDebtData) -> Result<Debt>;

    async fn update_debt(
        &self,
        owner_id: Uuid,
        debt_id: Uuid,
        data: &NewDebtData,
    ) -> Result<Option<Debt>>;

    async fn delete_debt(&self, owner_id: Uuid, debt_id: Uuid) -> Result<bool>;

    /// Add a payment to a debt, marking it paid once the total due is
    /// covered. The debt is locked while the payment is checked, so
    /// concurrent payments cannot together exceed what is owed.
    async fn record_payment(
        &self,
        owner_id: Uuid,
        debt_id: Uuid,
        amount: i64,
    ) -> Result<Option<PaymentOutcome>>;

    async fn mark_reminded(&self, debt_id: Uuid, on: NaiveDate) -> Result<()>;
}

#[async_trait]
impl DebtRepo for PostgresConnection {
    async fn list_debts(&self, owner_id: Uuid) -> Result<Vec<Debt>> {
        Ok(sqlx::query_as::<_, Debt>(
            r#"
            SELECT *
            FROM debt
            WHERE owner_id = $1
            ORDER BY is_paid, due_date
            "#,
        )
        .bind(owner_id)
        .fetch_all(&**self)
        .await?)
    }

    async fn get_debt(&self, owner_id: Uuid, debt_id: Uuid) -> Result<Option<Debt>> {
        Ok(sqlx::query_as::<_, Debt>(
            r#"
            SELECT *
            FROM debt
            WHERE owner_id = $1 AND id = $2
            "#,
        )
        .bind(owner_id)
        .bind(debt_id)
        .fetch_optional(&**self)
        .await?)
    }

    async fn create_debt(&self, owner_id: Uuid, data: &NewDebtData) -> Result<Debt> {
        Ok(sqlx::query_as::<_, Debt>(
            r#"
            INSERT INTO debt (
                owner_id,
                lender,
                principal,
                interest_rate,
                interest_type,
                term_months,
                start_date,
                due_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&data.lender)
        .bind(data.principal)
        .bind(data.interest_rate)
        .bind(data.interest_type)
        .bind(data.term_months)
        .bind(data.start_date)
        .bind(data.due_date)
        .fetch_one(&**self)
        .await?)
    }

    async fn update_debt(
        &self,
        owner_id: Uuid,
        debt_id: Uuid,
        data: &NewDebtData,
    ) -> Result<Option<Debt>> {
        let mut tx = self.begin().await?;

        let updated = sqlx::query_as::<_, Debt>(
            r#"
            UPDATE debt
            SET lender = $3,
                principal = $4,
                interest_rate = $5,
                interest_type = $6,
                term_months = $7,
                start_date = $8,
                due_date = $9,
                updated_at = NOW()
            WHERE owner_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(debt_id)
        .bind(&data.lender)
        .bind(data.principal)
        .bind(data.interest_rate)
        .bind(data.interest_type)
        .bind(data.term_months)
        .bind(data.start_date)
        .bind(data.due_date)
        .fetch_optional(&mut tx)
        .await?;

        // The new terms may change the total due.
        let updated = match updated {
            Some(mut debt) => {
                debt.apply_payment(0);
                sqlx::query(
                    r#"
                    UPDATE debt
                    SET is_paid = $2
                    WHERE id = $1
                    "#,
                )
                .bind(debt.id)
                .bind(debt.is_paid)
                .execute(&mut tx)
                .await?;

                Some(debt)
            }
            None => None,
        };

        tx.commit().await?;

        Ok(updated)
    }

    async fn delete_debt(&self, owner_id: Uuid, debt_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM debt
            WHERE owner_id = $1 AND id = $2
            "#,
        )
        .bind(owner_id)
        .bind(debt_id)
        .execute(&**self)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_payment(
        &self,
        owner_id: Uuid,
        debt_id: Uuid,
        amount: i64,
    ) -> Result<Option<PaymentOutcome>> {
        let mut tx = self.begin().await?;

        let debt = sqlx::query_as::<_, Debt>(
            r#"
            SELECT *
            FROM debt
            WHERE owner_id = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(owner_id)
        .bind(debt_id)
        .fetch_optional(&mut tx)
        .await?;

        let debt = match debt.map(|debt| debt.pay(amount)) {
            Some(PaymentOutcome::Recorded(debt)) => debt,
            // Dropping the transaction releases the lock.
            refused => return Ok(refused),
        };

        let saved = sqlx::query_as::<_, Debt>(
            r#"
            UPDATE debt
            SET amount_paid = $2, is_paid = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(debt.id)
        .bind(debt.amount_paid)
        .bind(debt.is_paid)
        .fetch_one(&mut tx)
        .await?;

        tx.commit().await?;

        Ok(Some(PaymentOutcome::Recorded(saved)))
    }

    async fn mark_reminded(&self, debt_id: Uuid, on: NaiveDate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE debt
            SET last_reminded_on = $2
            WHERE id = $1
            "#,
        )
        .bind(debt_id)
        .bind(on)
        .execute(&**self)
        .await?;

        Ok(())
    }
}
