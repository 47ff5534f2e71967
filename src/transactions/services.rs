use chrono::{Duration, NaiveDate};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    accounts::services::AccountService,
    repos::{DynCategoryRepo, DynTransactionRepo},
    service_err::{ServiceError, ServiceResult},
};

use super::{
    next_occurrence, NewTransactionData, Transaction, TransactionCollection, TransactionQuery,
    UpcomingOccurrence,
};

/// The furthest ahead upcoming recurring transactions may be listed.
pub const MAX_UPCOMING_DAYS: u32 = 365;

#[derive(Clone)]
pub struct TransactionService {
    transaction_repo: DynTransactionRepo,
    category_repo: DynCategoryRepo,
    account_service: AccountService,
}

impl TransactionService {
    pub fn new(
        transaction_repo: DynTransactionRepo,
        category_repo: DynCategoryRepo,
        account_service: AccountService,
    ) -> Self {
        Self {
            transaction_repo,
            category_repo,
            account_service,
        }
    }

    /// Check that the user may write `data`: the account must be accessible
    /// and the category, if any, must be the user's own.
    async fn authorize_write(&self, user_id: Uuid, data: &NewTransactionData) -> ServiceResult<()> {
        data.validate()?;
        self.account_service
            .get_account(user_id, data.account_id)
            .await?;

        if let Some(category_id) = data.category_id {
            self.category_repo
                .get_category(user_id, category_id)
                .await?
                .ok_or(ServiceError::NotFound("Category"))?;
        }

        Ok(())
    }

    pub async fn create_transaction(
        &self,
        user_id: Uuid,
        data: NewTransactionData,
    ) -> ServiceResult<Transaction> {
        self.authorize_write(user_id, &data).await?;

        let transaction = self
            .transaction_repo
            .create_transaction(user_id, &data)
            .await?;

        info!(transaction_id = %transaction.id, account_id = %transaction.account_id, "Created transaction.");

        Ok(transaction)
    }

    pub async fn get_transaction(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
    ) -> ServiceResult<Transaction> {
        self.transaction_repo
            .get_transaction(user_id, transaction_id)
            .await?
            .ok_or(ServiceError::NotFound("Transaction"))
    }

    pub async fn update_transaction(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        data: NewTransactionData,
    ) -> ServiceResult<Transaction> {
        self.get_transaction(user_id, transaction_id).await?;
        self.authorize_write(user_id, &data).await?;

        self.transaction_repo
            .update_transaction(transaction_id, &data)
            .await?
            .ok_or(ServiceError::NotFound("Transaction"))
    }

    pub async fn delete_transaction(&self, user_id: Uuid, transaction_id: Uuid) -> ServiceResult<()> {
        self.get_transaction(user_id, transaction_id).await?;
        self.transaction_repo
            .delete_transaction(transaction_id)
            .await?;

        info!(%transaction_id, %user_id, "Deleted transaction.");

        Ok(())
    }

    pub async fn list_transactions(
        &self,
        query: TransactionQuery,
    ) -> ServiceResult<TransactionCollection> {
        Ok(self.transaction_repo.list_transactions(query).await?)
    }

    /// The next occurrence of each recurring template that falls within
    /// `days` days of `today`, soonest first.
    pub async fn upcoming_recurring(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        days: u32,
    ) -> ServiceResult<Vec<UpcomingOccurrence>> {
        if days > MAX_UPCOMING_DAYS {
            return Err(ServiceError::Invalid(format!(
                "Upcoming transactions can be listed at most {} days ahead.",
                MAX_UPCOMING_DAYS
            )));
        }

        let horizon = today + Duration::days(days.into());
        let templates = self.transaction_repo.list_recurring(user_id).await?;

        Ok(upcoming_within(&templates, today, horizon))
    }
}

fn upcoming_within(
    templates: &[Transaction],
    today: NaiveDate,
    horizon: NaiveDate,
) -> Vec<UpcomingOccurrence> {
    let mut upcoming: Vec<UpcomingOccurrence> = templates
        .iter()
        .filter_map(|template| {
            let frequency = template.recurrence?;
            let due_date =
                next_occurrence(template.date, frequency, template.recurrence_end_date, today)?;

            (due_date <= horizon).then(|| UpcomingOccurrence {
                transaction_id: template.id,
                account_id: template.account_id,
                description: template.description.clone(),
                kind: template.kind,
                amount: template.amount,
                due_date,
            })
        })
        .collect();

    upcoming.sort_by_key(|o| o.due_date);

    upcoming
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::{
        accounts::services::test::FakeAccountRepo,
        categories::services::test::FakeCategoryRepo,
        repos::TransactionRepo,
        transactions::{RecurrenceData, RecurrenceFrequency, TransactionKind},
    };

    use super::*;

    /// Transactions kept in memory. Access checks are left to the service,
    /// so every stored transaction is visible to every user.
    #[derive(Default)]
    pub(crate) struct FakeTransactionRepo {
        pub transactions: Mutex<Vec<Transaction>>,
    }

    fn to_transaction(created_by: Uuid, data: &NewTransactionData) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            account_id: data.account_id,
            category_id: data.category_id,
            category_name: None,
            created_by,
            kind: data.kind,
            amount: data.amount,
            description: data.description.clone(),
            date: data.date,
            recurrence: data.recurrence_frequency(),
            recurrence_end_date: data.recurrence_end_date(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[async_trait]
    impl TransactionRepo for FakeTransactionRepo {
        async fn create_transaction(
            &self,
            created_by: Uuid,
            data: &NewTransactionData,
        ) -> Result<Transaction> {
            let transaction = to_transaction(created_by, data);
            self.transactions.lock().unwrap().push(transaction.clone());

            Ok(transaction)
        }

        async fn create_transactions(
            &self,
            created_by: Uuid,
            entries: &[NewTransactionData],
        ) -> Result<Vec<Transaction>> {
            let created: Vec<Transaction> = entries
                .iter()
                .map(|data| to_transaction(created_by, data))
                .collect();
            self.transactions
                .lock()
                .unwrap()
                .extend(created.iter().cloned());

            Ok(created)
        }

        async fn get_transaction(
            &self,
            _user_id: Uuid,
            transaction_id: Uuid,
        ) -> Result<Option<Transaction>> {
            Ok(self
                .transactions
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.id == transaction_id)
                .cloned())
        }

        async fn update_transaction(
            &self,
            transaction_id: Uuid,
            data: &NewTransactionData,
        ) -> Result<Option<Transaction>> {
            let mut transactions = self.transactions.lock().unwrap();

            Ok(transactions
                .iter_mut()
                .find(|t| t.id == transaction_id)
                .map(|t| {
                    let mut updated = to_transaction(t.created_by, data);
                    updated.id = t.id;
                    *t = updated;
                    t.clone()
                }))
        }

        async fn delete_transaction(&self, transaction_id: Uuid) -> Result<()> {
            self.transactions
                .lock()
                .unwrap()
                .retain(|t| t.id != transaction_id);

            Ok(())
        }

        async fn list_transactions(&self, query: TransactionQuery) -> Result<TransactionCollection> {
            let mut items = self.list_all_transactions(query).await?;
            items.reverse();

            Ok(TransactionCollection { next: None, items })
        }

        async fn list_all_transactions(&self, query: TransactionQuery) -> Result<Vec<Transaction>> {
            let mut items: Vec<Transaction> = self
                .transactions
                .lock()
                .unwrap()
                .iter()
                .filter(|t| query.account_id.map_or(true, |id| t.account_id == id))
                .filter(|t| query.kind.map_or(true, |kind| t.kind == kind))
                .filter(|t| query.from.map_or(true, |from| t.date >= from))
                .filter(|t| query.to.map_or(true, |to| t.date <= to))
                .cloned()
                .collect();
            items.sort_by_key(|t| (t.date, t.created_at));

            Ok(items)
        }

        async fn list_recurring(&self, _user_id: Uuid) -> Result<Vec<Transaction>> {
            Ok(self
                .transactions
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.is_recurring())
                .cloned()
                .collect())
        }

        async fn balance_before(&self, account_id: Uuid, date: NaiveDate) -> Result<i64> {
            Ok(self
                .transactions
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.account_id == account_id && t.date < date)
                .map(Transaction::balance_effect)
                .sum())
        }
    }

    struct Fixture {
        service: TransactionService,
        accounts: Arc<FakeAccountRepo>,
        categories: Arc<FakeCategoryRepo>,
    }

    fn fixture() -> Fixture {
        let accounts = Arc::new(FakeAccountRepo::default());
        let categories = Arc::new(FakeCategoryRepo::default());
        let service = TransactionService::new(
            Arc::new(FakeTransactionRepo::default()),
            categories.clone(),
            AccountService::new(accounts.clone()),
        );

        Fixture {
            service,
            accounts,
            categories,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn expense(account_id: Uuid) -> NewTransactionData {
        NewTransactionData {
            account_id,
            category_id: None,
            kind: TransactionKind::Expense,
            amount: 4200,
            description: "Electricity".to_owned(),
            date: date(2024, 3, 5),
            recurrence: None,
        }
    }

    #[tokio::test]
    async fn members_may_record_on_shared_accounts() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let account = f.accounts.add_account(owner, "Household");
        f.accounts.add_member(account.id, member);

        let transaction = f
            .service
            .create_transaction(member, expense(account.id))
            .await
            .unwrap();

        assert_eq!(member, transaction.created_by);
    }

    #[tokio::test]
    async fn strangers_may_not_record_on_accounts() {
        let f = fixture();
        let account = f.accounts.add_account(Uuid::new_v4(), "Private");

        let result = f
            .service
            .create_transaction(Uuid::new_v4(), expense(account.id))
            .await;

        assert!(matches!(result, Err(ServiceError::NotFound("Account"))));
    }

    #[tokio::test]
    async fn category_must_belong_to_caller() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let account = f.accounts.add_account(owner, "Cash");
        let foreign = f
            .categories
            .add_category(Uuid::new_v4(), "Bills", TransactionKind::Expense);

        let mut data = expense(account.id);
        data.category_id = Some(foreign.id);
        let result = f.service.create_transaction(owner, data).await;

        assert!(matches!(result, Err(ServiceError::NotFound("Category"))));
    }

    #[tokio::test]
    async fn upcoming_lists_next_occurrence_within_window() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let account = f.accounts.add_account(owner, "Cash");

        let mut rent = expense(account.id);
        rent.description = "Rent".to_owned();
        rent.date = date(2024, 1, 31);
        rent.recurrence = Some(RecurrenceData {
            frequency: RecurrenceFrequency::Monthly,
            end_date: None,
        });
        f.service.create_transaction(owner, rent).await.unwrap();

        let mut gym = expense(account.id);
        gym.description = "Gym".to_owned();
        gym.date = date(2024, 1, 1);
        gym.recurrence = Some(RecurrenceData {
            frequency: RecurrenceFrequency::Yearly,
            end_date: None,
        });
        f.service.create_transaction(owner, gym).await.unwrap();

        let upcoming = f
            .service
            .upcoming_recurring(owner, date(2024, 4, 20), 14)
            .await
            .unwrap();

        assert_eq!(1, upcoming.len());
        assert_eq!("Rent", upcoming[0].description);
        assert_eq!(date(2024, 4, 30), upcoming[0].due_date);
    }

    #[tokio::test]
    async fn upcoming_window_is_bounded() {
        let f = fixture();

        let result = f
            .service
            .upcoming_recurring(Uuid::new_v4(), date(2024, 1, 1), MAX_UPCOMING_DAYS + 1)
            .await;

        assert!(matches!(result, Err(ServiceError::Invalid(_))));
    }
}
