use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    categories::{Category, NewCategoryData},
    database::PostgresConnection,
};

use super::is_unique_violation;

#[derive(Debug, Error)]
pub enum CategoryPersistenceError {
    #[error("a category named {0:?} already exists")]
    DuplicateName(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for CategoryPersistenceError {
    fn from(error: sqlx::Error) -> Self {
        if is_unique_violation(&error) {
            // The only unique index besides the primary key.
            return Self::DuplicateName(String::new());
        }

        Self::Other(error.into())
    }
}

pub type DynCategoryRepo = Arc<dyn CategoryRepo + Send + Sync>;

#[async_trait]
pub trait CategoryRepo {
    async fn list_categories(&self, owner_id: Uuid) -> Result<Vec<Category>>;

    async fn get_category(&self, owner_id: Uuid, category_id: Uuid) -> Result<Option<Category>>;

    async fn get_category_by_name(&self, owner_id: Uuid, name: &str) -> Result<Option<Category>>;

    async fn create_category(
        &self,
        owner_id: Uuid,
        data: &NewCategoryData,
    ) -> Result<Category, CategoryPersistenceError>;

    async fn update_category(
        &self,
        owner_id: Uuid,
        category_id: Uuid,
        data: &NewCategoryData,
    ) -> Result<Option<Category>, CategoryPersistenceError>;

    /// Delete a category. Its transactions become uncategorized.
    ///
    /// # Returns
    ///
    /// `true` if the category existed.
    async fn delete_category(&self, owner_id: Uuid, category_id: Uuid) -> Result<bool>;
}

fn with_name(error: CategoryPersistenceError, name: &str) -> CategoryPersistenceError {
    match error {
        CategoryPersistenceError::DuplicateName(_) => {
            CategoryPersistenceError::DuplicateName(name.to_owned())
        }
        other => other,
    }
}

#[async_trait]
impl CategoryRepo for PostgresConnection {
    async fn list_categories(&self, owner_id: Uuid) -> Result<Vec<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            r#"
            SELECT *
            FROM category
            WHERE owner_id = $1
            ORDER BY kind, name
            "#,
        )
        .bind(owner_id)
        .fetch_all(&**self)
        .await?)
    }

    async fn get_category(&self, owner_id: Uuid, category_id: Uuid) -> Result<Option<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            r#"
            SELECT *
            FROM category
            WHERE owner_id = $1 AND id = $2
            "#,
        )
        .bind(owner_id)
        .bind(category_id)
        .fetch_optional(&**self)
        .await?)
    }

    async fn get_category_by_name(&self, owner_id: Uuid, name: &str) -> Result<Option<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            r#"
            SELECT *
            FROM category
            WHERE owner_id = $1 AND LOWER(name) = LOWER($2)
            "#,
        )
        .bind(owner_id)
        .bind(name)
        .fetch_optional(&**self)
        .await?)
    }

    async fn create_category(
        &self,
        owner_id: Uuid,
        data: &NewCategoryData,
    ) -> Result<Category, CategoryPersistenceError> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO category (owner_id, name, kind)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&data.name)
        .bind(data.kind)
        .fetch_one(&**self)
        .await
        .map_err(|error| with_name(error.into(), &data.name))
    }

    async fn update_category(
        &self,
        owner_id: Uuid,
        category_id: Uuid,
        data: &NewCategoryData,
    ) -> Result<Option<Category>, CategoryPersistenceError> {
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE category
            SET name = $3, kind = $4, updated_at = NOW()
            WHERE owner_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(category_id)
        .bind(&data.name)
        .bind(data.kind)
        .fetch_optional(&**self)
        .await
        .map_err(|error| with_name(error.into(), &data.name))
    }

    async fn delete_category(&self, owner_id: Uuid, category_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM category
            WHERE owner_id = $1 AND id = $2
            "#,
        )
        .bind(owner_id)
        .bind(category_id)
        .execute(&**self)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
