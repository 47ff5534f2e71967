use uuid::Uuid;
use validator::Validate;

use crate::{
    repos::{CategoryPersistenceError, DynCategoryRepo},
    service_err::{ServiceError, ServiceResult},
};

use super::{Category, NewCategoryData};

impl From<CategoryPersistenceError> for ServiceError {
    fn from(error: CategoryPersistenceError) -> Self {
        match error {
            CategoryPersistenceError::DuplicateName(name) => {
                Self::Conflict(format!("A category named \"{}\" already exists.", name))
            }
            CategoryPersistenceError::Other(error) => Self::Other(error),
        }
    }
}

#[derive(Clone)]
pub struct CategoryService {
    category_repo: DynCategoryRepo,
}

impl CategoryService {
    pub fn new(category_repo: DynCategoryRepo) -> Self {
        Self { category_repo }
    }

    pub async fn list_categories(&self, owner_id: Uuid) -> ServiceResult<Vec<Category>> {
        Ok(self.category_repo.list_categories(owner_id).await?)
    }

    pub async fn get_category(&self, owner_id: Uuid, category_id: Uuid) -> ServiceResult<Category> {
        self.category_repo
            .get_category(owner_id, category_id)
            .await?
            .ok_or(ServiceError::NotFound("Category"))
    }

    pub async fn create_category(
        &self,
        owner_id: Uuid,
        data: NewCategoryData,
    ) -> ServiceResult<Category> {
        let data = data.normalized();
        data.validate()?;

        Ok(self.category_repo.create_category(owner_id, &data).await?)
    }

    /// The owner's category with this name, created with `data.kind` when
    /// there is none yet. An existing category keeps its own kind.
    pub async fn find_or_create(
        &self,
        owner_id: Uuid,
        data: NewCategoryData,
    ) -> ServiceResult<Category> {
        let data = data.normalized();
        data.validate()?;

        if let Some(existing) = self
            .category_repo
            .get_category_by_name(owner_id, &data.name)
            .await?
        {
            return Ok(existing);
        }

        match self.category_repo.create_category(owner_id, &data).await {
            Ok(created) => Ok(created),
            // Created concurrently under the same name.
            Err(CategoryPersistenceError::DuplicateName(_)) => self
                .category_repo
                .get_category_by_name(owner_id, &data.name)
                .await?
                .ok_or(ServiceError::NotFound("Category")),
            Err(error) => Err(error.into()),
        }
    }

    pub async fn update_category(
        &self,
        owner_id: Uuid,
        category_id: Uuid,
        data: NewCategoryData,
    ) -> ServiceResult<Category> {
        let data = data.normalized();
        data.validate()?;

        self.category_repo
            .update_category(owner_id, category_id, &data)
            .await?
            .ok_or(ServiceError::NotFound("Category"))
    }

    pub async fn delete_category(&self, owner_id: Uuid, category_id: Uuid) -> ServiceResult<()> {
        if self
            .category_repo
            .delete_category(owner_id, category_id)
            .await?
        {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Category"))
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::{categories::name_key, repos::CategoryRepo, transactions::TransactionKind};

    use super::*;

    #[derive(Default)]
    pub(crate) struct FakeCategoryRepo {
        pub categories: Mutex<Vec<Category>>,
    }

    impl FakeCategoryRepo {
        pub(crate) fn add_category(&self, owner_id: Uuid, name: &str, kind: TransactionKind) -> Category {
            let category = Category {
                id: Uuid::new_v4(),
                owner_id,
                name: name.to_owned(),
                kind,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.categories.lock().unwrap().push(category.clone());

            category
        }
    }

    #[async_trait]
    impl CategoryRepo for FakeCategoryRepo {
        async fn list_categories(&self, owner_id: Uuid) -> Result<Vec<Category>> {
            Ok(self
                .categories
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.owner_id == owner_id)
                .cloned()
                .collect())
        }

        async fn get_category(&self, owner_id: Uuid, category_id: Uuid) -> Result<Option<Category>> {
            Ok(self
                .categories
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.owner_id == owner_id && c.id == category_id)
                .cloned())
        }

        async fn get_category_by_name(&self, owner_id: Uuid, name: &str) -> Result<Option<Category>> {
            Ok(self
                .categories
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.owner_id == owner_id && name_key(&c.name) == name_key(name))
                .cloned())
        }

        async fn create_category(
            &self,
            owner_id: Uuid,
            data: &NewCategoryData,
        ) -> Result<Category, CategoryPersistenceError> {
            if self.get_category_by_name(owner_id, &data.name).await?.is_some() {
                return Err(CategoryPersistenceError::DuplicateName(data.name.clone()));
            }

            Ok(self.add_category(owner_id, &data.name, data.kind))
        }

        async fn update_category(
            &self,
            owner_id: Uuid,
            category_id: Uuid,
            data: &NewCategoryData,
        ) -> Result<Option<Category>, CategoryPersistenceError> {
            let mut categories = self.categories.lock().unwrap();
            if categories
                .iter()
                .any(|c| {
                    c.owner_id == owner_id
                        && c.id != category_id
                        && name_key(&c.name) == name_key(&data.name)
                })
            {
                return Err(CategoryPersistenceError::DuplicateName(data.name.clone()));
            }

            Ok(categories
                .iter_mut()
                .find(|c| c.owner_id == owner_id && c.id == category_id)
                .map(|c| {
                    c.name = data.name.clone();
                    c.kind = data.kind;
                    c.clone()
                }))
        }

        async fn delete_category(&self, owner_id: Uuid, category_id: Uuid) -> Result<bool> {
            let mut categories = self.categories.lock().unwrap();
            let before = categories.len();
            categories.retain(|c| !(c.owner_id == owner_id && c.id == category_id));

            Ok(categories.len() < before)
        }
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let service = CategoryService::new(Arc::new(FakeCategoryRepo::default()));
        let owner = Uuid::new_v4();
        let data = NewCategoryData {
            name: " Rent ".to_owned(),
            kind: TransactionKind::Expense,
        };

        let created = service.create_category(owner, data.clone()).await.unwrap();
        assert_eq!("Rent", created.name);

        let result = service.create_category(owner, data).await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn names_differing_only_in_case_conflict() {
        let repo = Arc::new(FakeCategoryRepo::default());
        let owner = Uuid::new_v4();
        repo.add_category(owner, "Rent", TransactionKind::Expense);
        let other = repo.add_category(owner, "Travel", TransactionKind::Expense);
        let service = CategoryService::new(repo);

        let created = service
            .create_category(
                owner,
                NewCategoryData {
                    name: "RENT".to_owned(),
                    kind: TransactionKind::Expense,
                },
            )
            .await;
        assert!(matches!(created, Err(ServiceError::Conflict(_))));

        let renamed = service
            .update_category(
                owner,
                other.id,
                NewCategoryData {
                    name: "rent".to_owned(),
                    kind: TransactionKind::Expense,
                },
            )
            .await;
        assert!(matches!(renamed, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn renaming_to_a_different_case_of_itself_is_allowed() {
        let repo = Arc::new(FakeCategoryRepo::default());
        let owner = Uuid::new_v4();
        let rent = repo.add_category(owner, "rent", TransactionKind::Expense);
        let service = CategoryService::new(repo);

        let renamed = service
            .update_category(
                owner,
                rent.id,
                NewCategoryData {
                    name: "Rent".to_owned(),
                    kind: TransactionKind::Expense,
                },
            )
            .await
            .unwrap();

        assert_eq!("Rent", renamed.name);
    }

    #[tokio::test]
    async fn find_or_create_reuses_names_ignoring_case() {
        let repo = Arc::new(FakeCategoryRepo::default());
        let owner = Uuid::new_v4();
        let food = repo.add_category(owner, "Food", TransactionKind::Expense);
        let service = CategoryService::new(repo.clone());

        let found = service
            .find_or_create(
                owner,
                NewCategoryData {
                    name: " food ".to_owned(),
                    kind: TransactionKind::Expense,
                },
            )
            .await
            .unwrap();

        assert_eq!(food.id, found.id);
        assert_eq!(1, repo.categories.lock().unwrap().len());
    }

    #[tokio::test]
    async fn find_or_create_validates_names() {
        let service = CategoryService::new(Arc::new(FakeCategoryRepo::default()));

        let result = service
            .find_or_create(
                Uuid::new_v4(),
                NewCategoryData {
                    name: "x".repeat(65),
                    kind: TransactionKind::Expense,
                },
            )
            .await;

        assert!(matches!(result, Err(ServiceError::InvalidData(_))));
    }

    #[tokio::test]
    async fn other_users_categories_are_not_found() {
        let repo = Arc::new(FakeCategoryRepo::default());
        let category = repo.add_category(Uuid::new_v4(), "Rent", TransactionKind::Expense);
        let service = CategoryService::new(repo);

        let result = service.delete_category(Uuid::new_v4(), category.id).await;

        assert!(matches!(result, Err(ServiceError::NotFound("Category"))));
    }
}
