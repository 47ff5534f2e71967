use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    categories::DEFAULT_CATEGORIES,
    currency::Currency,
    database::PostgresConnection,
    users::{NewUser, User, UserUpdateData},
};

use super::{accounts, is_unique_violation};

/// Name of the account every user starts with.
pub const DEFAULT_ACCOUNT_NAME: &str = "Cash";

#[derive(Debug, Error)]
pub enum UserPersistenceError {
    #[error("duplicate email address: {0}")]
    DuplicateEmail(String),

    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for UserPersistenceError {
    fn from(error: sqlx::Error) -> Self {
        Self::Other(error.into())
    }
}

pub type DynUserRepo = Arc<dyn UserRepo + Send + Sync>;

#[async_trait]
pub trait UserRepo {
    /// Register a user together with their default account and categories.
    async fn persist_new_user(
        &self,
        user: &NewUser,
        password_hash: &str,
    ) -> Result<User, UserPersistenceError>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Look up a user by their normalized email address.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn update_user(
        &self,
        user_id: Uuid,
        data: &UserUpdateData,
    ) -> Result<User, UserPersistenceError>;

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<()>;

    async fn get_currency(&self, code: &str) -> Result<Option<Currency>>;
}

#[async_trait]
impl UserRepo for PostgresConnection {
    async fn persist_new_user(
        &self,
        user: &NewUser,
        password_hash: &str,
    ) -> Result<User, UserPersistenceError> {
        if self.get_currency(user.currency()).await?.is_none() {
            return Err(UserPersistenceError::UnknownCurrency(
                user.currency().to_owned(),
            ));
        }

        let mut tx = self.begin().await?;

        let email = user.email().normalized();
        let saved = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO "user" (id, name, email, password, currency)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user.id())
        .bind(user.name())
        .bind(&email)
        .bind(password_hash)
        .bind(user.currency())
        .fetch_one(&mut tx)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                UserPersistenceError::DuplicateEmail(email.clone())
            } else {
                error.into()
            }
        })?;

        accounts::insert_account(&mut tx, saved.id, DEFAULT_ACCOUNT_NAME, None, true).await?;

        for (name, kind) in DEFAULT_CATEGORIES {
            sqlx::query(
                r#"
                INSERT INTO category (owner_id, name, kind)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(saved.id)
            .bind(name)
            .bind(kind)
            .execute(&mut tx)
            .await?;
        }

        tx.commit().await?;

        Ok(saved)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            r#"
            SELECT *
            FROM "user"
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&**self)
        .await?)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            r#"
            SELECT *
            FROM "user"
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&**self)
        .await?)
    }

    async fn update_user(
        &self,
        user_id: Uuid,
        data: &UserUpdateData,
    ) -> Result<User, UserPersistenceError> {
        let currency = data.currency.trim().to_uppercase();
        if self.get_currency(&currency).await?.is_none() {
            return Err(UserPersistenceError::UnknownCurrency(currency));
        }

        Ok(sqlx::query_as::<_, User>(
            r#"
            UPDATE "user"
            SET name = $2, currency = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(data.name.trim())
        .bind(&currency)
        .fetch_one(&**self)
        .await?)
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE "user"
            SET password = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&**self)
        .await?;

        Ok(())
    }

    async fn get_currency(&self, code: &str) -> Result<Option<Currency>> {
        Ok(sqlx::query_as::<_, Currency>(
            r#"
            SELECT code, symbol, minor_units
            FROM currency
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&**self)
        .await?)
    }
}
