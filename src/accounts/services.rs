use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    repos::DynAccountRepo,
    service_err::{ServiceError, ServiceResult},
};

use super::{
    AccountMember, AccountRole, AccountUpdateData, AccountWithAnalytics, NewAccountData,
    OpeningTransaction,
};

#[derive(Clone)]
pub struct AccountService {
    account_repo: DynAccountRepo,
}

impl AccountService {
    pub fn new(account_repo: DynAccountRepo) -> Self {
        Self { account_repo }
    }

    /// Open an account. A non-zero opening balance is recorded as a
    /// transaction so the account's history adds up to its balance.
    pub async fn create_account(
        &self,
        owner_id: Uuid,
        data: NewAccountData,
    ) -> ServiceResult<AccountWithAnalytics> {
        data.validate()?;

        let opening = OpeningTransaction::for_balance(data.opening_balance, Utc::now().date_naive());
        let account = self
            .account_repo
            .create_account(owner_id, &data, opening)
            .await?;

        info!(account_id = %account.id, %owner_id, "Created account.");

        self.get_account(owner_id, account.id).await
    }

    pub async fn list_accounts(&self, user_id: Uuid) -> ServiceResult<Vec<AccountWithAnalytics>> {
        Ok(self.account_repo.list_accounts(user_id).await?)
    }

    /// Get an account the user owns or is a member of.
    pub async fn get_account(
        &self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> ServiceResult<AccountWithAnalytics> {
        self.account_repo
            .get_account(user_id, account_id)
            .await?
            .ok_or(ServiceError::NotFound("Account"))
    }

    /// Get an account only its owner may manage.
    pub async fn get_owned_account(
        &self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> ServiceResult<AccountWithAnalytics> {
        let account = self.get_account(user_id, account_id).await?;

        match account.role {
            AccountRole::Owner => Ok(account),
            AccountRole::Member => Err(ServiceError::Forbidden),
        }
    }

    pub async fn update_account(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        data: AccountUpdateData,
    ) -> ServiceResult<AccountWithAnalytics> {
        data.validate()?;
        let mut account = self.get_owned_account(user_id, account_id).await?;

        account.account = self.account_repo.update_account(account_id, &data).await?;

        Ok(account)
    }

    /// Delete an account with everything recorded on it. Only the owner may
    /// do this, even for their last or default account.
    pub async fn delete_account(&self, user_id: Uuid, account_id: Uuid) -> ServiceResult<()> {
        self.get_owned_account(user_id, account_id).await?;
        self.account_repo.delete_account(account_id).await?;

        info!(%account_id, %user_id, "Deleted account.");

        Ok(())
    }

    pub async fn list_members(
        &self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> ServiceResult<Vec<AccountMember>> {
        self.get_account(user_id, account_id).await?;

        Ok(self.account_repo.list_members(account_id).await?)
    }

    /// Remove a member from an account. The owner may remove anyone and a
    /// member may remove themselves.
    pub async fn remove_member(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        member_id: Uuid,
    ) -> ServiceResult<()> {
        let account = self.get_account(user_id, account_id).await?;

        if account.role != AccountRole::Owner && member_id != user_id {
            return Err(ServiceError::Forbidden);
        }

        if !self.account_repo.remove_member(account_id, member_id).await? {
            return Err(ServiceError::NotFound("Member"));
        }

        info!(%account_id, %member_id, "Removed account member.");

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;

    use crate::{
        accounts::Account,
        analytics::Analytics,
        repos::AccountRepo,
        transactions::TransactionKind,
    };

    use super::*;

    /// Accounts kept in memory. Members are `(account, user)` pairs.
    #[derive(Default)]
    pub(crate) struct FakeAccountRepo {
        pub accounts: Mutex<Vec<Account>>,
        pub members: Mutex<Vec<(Uuid, Uuid)>>,
        /// Opening transactions handed to `create_account`, by account.
        pub openings: Mutex<Vec<(Uuid, OpeningTransaction)>>,
    }

    impl FakeAccountRepo {
        pub(crate) fn add_account(&self, owner_id: Uuid, name: &str) -> Account {
            let account = Account {
                id: Uuid::new_v4(),
                owner_id,
                name: name.to_owned(),
                description: None,
                balance: 0,
                is_default: false,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.accounts.lock().unwrap().push(account.clone());

            account
        }

        pub(crate) fn add_member(&self, account_id: Uuid, user_id: Uuid) {
            self.members.lock().unwrap().push((account_id, user_id));
        }

        fn with_role(&self, user_id: Uuid, account: &Account) -> Option<AccountWithAnalytics> {
            let role = if account.owner_id == user_id {
                AccountRole::Owner
            } else if self
                .members
                .lock()
                .unwrap()
                .contains(&(account.id, user_id))
            {
                AccountRole::Member
            } else {
                return None;
            };

            Some(AccountWithAnalytics {
                account: account.clone(),
                role,
                analytics: Some(Analytics {
                    account_id: account.id,
                    income: account.balance.max(0),
                    expense: (-account.balance).max(0),
                    balance: account.balance,
                    income_change: 0.0,
                    expense_change: 0.0,
                    balance_change: 0.0,
                    updated_at: Utc::now(),
                }),
            })
        }
    }

    #[async_trait]
    impl AccountRepo for FakeAccountRepo {
        async fn create_account(
            &self,
            owner_id: Uuid,
            data: &NewAccountData,
            opening: Option<OpeningTransaction>,
        ) -> Result<Account> {
            let mut account = self.add_account(owner_id, &data.name);
            account.balance = opening.as_ref().map_or(0, |o| o.kind.signed(o.amount));
            if let Some(opening) = opening {
                self.openings.lock().unwrap().push((account.id, opening));
            }

            let mut accounts = self.accounts.lock().unwrap();
            if let Some(saved) = accounts.iter_mut().find(|a| a.id == account.id) {
                saved.balance = account.balance;
            }

            Ok(account)
        }

        async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<AccountWithAnalytics>> {
            let accounts = self.accounts.lock().unwrap().clone();

            Ok(accounts
                .iter()
                .filter_map(|a| self.with_role(user_id, a))
                .collect())
        }

        async fn get_account(
            &self,
            user_id: Uuid,
            account_id: Uuid,
        ) -> Result<Option<AccountWithAnalytics>> {
            let account = self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.id == account_id)
                .cloned();

            Ok(account.and_then(|a| self.with_role(user_id, &a)))
        }

        async fn update_account(&self, account_id: Uuid, data: &AccountUpdateData) -> Result<Account> {
            let mut accounts = self.accounts.lock().unwrap();
            let account = accounts
                .iter_mut()
                .find(|a| a.id == account_id)
                .ok_or_else(|| anyhow::anyhow!("missing account"))?;
            account.name = data.name.clone();
            account.description = data.description.clone();

            Ok(account.clone())
        }

        async fn delete_account(&self, account_id: Uuid) -> Result<()> {
            self.accounts.lock().unwrap().retain(|a| a.id != account_id);
            self.members.lock().unwrap().retain(|(a, _)| *a != account_id);

            Ok(())
        }

        async fn list_members(&self, account_id: Uuid) -> Result<Vec<AccountMember>> {
            Ok(self
                .members
                .lock()
                .unwrap()
                .iter()
                .filter(|(a, _)| *a == account_id)
                .map(|(_, user_id)| AccountMember {
                    user_id: *user_id,
                    name: "Member".to_owned(),
                    email: format!("{}@example.com", user_id),
                    joined_at: Utc::now(),
                })
                .collect())
        }

        async fn remove_member(&self, account_id: Uuid, user_id: Uuid) -> Result<bool> {
            let mut members = self.members.lock().unwrap();
            let before = members.len();
            members.retain(|m| *m != (account_id, user_id));

            Ok(members.len() < before)
        }
    }

    fn service() -> (AccountService, Arc<FakeAccountRepo>) {
        let repo = Arc::new(FakeAccountRepo::default());

        (AccountService::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn opening_balance_becomes_an_opening_transaction() {
        let (service, repo) = service();
        let owner = Uuid::new_v4();

        let account = service
            .create_account(
                owner,
                NewAccountData {
                    name: "Checking".to_owned(),
                    description: None,
                    opening_balance: -12_500,
                },
            )
            .await
            .unwrap();

        assert_eq!(AccountRole::Owner, account.role);
        assert_eq!(
            vec![(
                account.account.id,
                OpeningTransaction {
                    kind: TransactionKind::Expense,
                    amount: 12_500,
                    description: OpeningTransaction::DESCRIPTION.to_owned(),
                    date: Utc::now().date_naive(),
                }
            )],
            *repo.openings.lock().unwrap()
        );
    }

    #[tokio::test]
    async fn empty_accounts_have_no_opening_transaction() {
        let (service, repo) = service();

        service
            .create_account(
                Uuid::new_v4(),
                NewAccountData {
                    name: "Spare".to_owned(),
                    description: None,
                    opening_balance: 0,
                },
            )
            .await
            .unwrap();

        assert!(repo.openings.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn members_cannot_delete_shared_accounts() {
        let (service, repo) = service();
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let account = repo.add_account(owner, "Household");
        repo.add_member(account.id, member);

        let result = service.delete_account(member, account.id).await;
        assert!(matches!(result, Err(ServiceError::Forbidden)));

        service.delete_account(owner, account.id).await.unwrap();
        assert!(matches!(
            service.get_account(owner, account.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn strangers_cannot_see_accounts() {
        let (service, repo) = service();
        let account = repo.add_account(Uuid::new_v4(), "Private");

        let result = service.get_account(Uuid::new_v4(), account.id).await;

        assert!(matches!(result, Err(ServiceError::NotFound("Account"))));
    }

    #[tokio::test]
    async fn member_may_leave_but_not_remove_others() {
        let (service, repo) = service();
        let owner = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let account = repo.add_account(owner, "Household");
        repo.add_member(account.id, first);
        repo.add_member(account.id, second);

        let result = service.remove_member(first, account.id, second).await;
        assert!(matches!(result, Err(ServiceError::Forbidden)));

        service.remove_member(first, account.id, first).await.unwrap();
        service.remove_member(owner, account.id, second).await.unwrap();

        assert!(service
            .list_members(owner, account.id)
            .await
            .unwrap()
            .is_empty());
    }
}
