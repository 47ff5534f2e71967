use std::collections::HashMap;

use uuid::Uuid;
use validator::Validate;

use crate::{
    repos::DynInvestmentRepo,
    service_err::{ServiceError, ServiceResult},
};

use super::{
    Investment, InvestmentAccount, InvestmentAccountData, InvestmentAccountSummary, InvestmentData,
    InvestmentWithPerformance, Performance,
};

#[derive(Clone)]
pub struct InvestmentService {
    investment_repo: DynInvestmentRepo,
}

impl InvestmentService {
    pub fn new(investment_repo: DynInvestmentRepo) -> Self {
        Self { investment_repo }
    }

    async fn find_account(&self, owner_id: Uuid, account_id: Uuid) -> ServiceResult<InvestmentAccount> {
        self.investment_repo
            .get_account(owner_id, account_id)
            .await?
            .ok_or(ServiceError::NotFound("Investment account"))
    }

    async fn find_investment(&self, owner_id: Uuid, investment_id: Uuid) -> ServiceResult<Investment> {
        self.investment_repo
            .get_investment(owner_id, investment_id)
            .await?
            .ok_or(ServiceError::NotFound("Investment"))
    }

    async fn summarize(&self, account: InvestmentAccount) -> ServiceResult<InvestmentAccountSummary> {
        let investments = self.investment_repo.list_investments(&[account.id]).await?;

        Ok(InvestmentAccountSummary::new(account, investments))
    }

    pub async fn list_accounts(&self, owner_id: Uuid) -> ServiceResult<Vec<InvestmentAccountSummary>> {
        let accounts = self.investment_repo.list_accounts(owner_id).await?;
        let ids: Vec<Uuid> = accounts.iter().map(|a| a.id).collect();

        let mut by_account: HashMap<Uuid, Vec<Investment>> = HashMap::new();
        for investment in self.investment_repo.list_investments(&ids).await? {
            by_account
                .entry(investment.investment_account_id)
                .or_default()
                .push(investment);
        }

        Ok(accounts
            .into_iter()
            .map(|account| {
                let investments = by_account.remove(&account.id).unwrap_or_default();

                InvestmentAccountSummary::new(account, investments)
            })
            .collect())
    }

    /// Performance across every investment account the owner has.
    pub async fn portfolio(&self, owner_id: Uuid) -> ServiceResult<Performance> {
        let accounts = self.investment_repo.list_accounts(owner_id).await?;
        let ids: Vec<Uuid> = accounts.iter().map(|a| a.id).collect();
        let investments = self.investment_repo.list_investments(&ids).await?;

        Ok(Performance::total(&investments))
    }

    pub async fn get_account(
        &self,
        owner_id: Uuid,
        account_id: Uuid,
    ) -> ServiceResult<InvestmentAccountSummary> {
        let account = self.find_account(owner_id, account_id).await?;

        self.summarize(account).await
    }

    pub async fn create_account(
        &self,
        owner_id: Uuid,
        data: InvestmentAccountData,
    ) -> ServiceResult<InvestmentAccountSummary> {
        data.validate()?;
        let account = self.investment_repo.create_account(owner_id, &data).await?;

        Ok(InvestmentAccountSummary::new(account, Vec::new()))
    }

    pub async fn update_account(
        &self,
        owner_id: Uuid,
        account_id: Uuid,
        data: InvestmentAccountData,
    ) -> ServiceResult<InvestmentAccountSummary> {
        data.validate()?;
        let account = self
            .investment_repo
            .update_account(owner_id, account_id, &data)
            .await?
            .ok_or(ServiceError::NotFound("Investment account"))?;

        self.summarize(account).await
    }

    pub async fn delete_account(&self, owner_id: Uuid, account_id: Uuid) -> ServiceResult<()> {
        if self
            .investment_repo
            .delete_account(owner_id, account_id)
            .await?
        {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Investment account"))
        }
    }

    pub async fn list_investments(
        &self,
        owner_id: Uuid,
        account_id: Uuid,
    ) -> ServiceResult<Vec<InvestmentWithPerformance>> {
        Ok(self.get_account(owner_id, account_id).await?.investments)
    }

    pub async fn get_investment(
        &self,
        owner_id: Uuid,
        investment_id: Uuid,
    ) -> ServiceResult<InvestmentWithPerformance> {
        let investment = self.find_investment(owner_id, investment_id).await?;

        Ok(with_performance(investment))
    }

    pub async fn create_investment(
        &self,
        owner_id: Uuid,
        account_id: Uuid,
        data: InvestmentData,
    ) -> ServiceResult<InvestmentWithPerformance> {
        let data = data.normalized();
        data.validate()?;
        self.find_account(owner_id, account_id).await?;

        let investment = self
            .investment_repo
            .create_investment(account_id, &data)
            .await?;

        Ok(with_performance(investment))
    }

    pub async fn update_investment(
        &self,
        owner_id: Uuid,
        investment_id: Uuid,
        data: InvestmentData,
    ) -> ServiceResult<InvestmentWithPerformance> {
        let data = data.normalized();
        data.validate()?;
        self.find_investment(owner_id, investment_id).await?;

        let investment = self
            .investment_repo
            .update_investment(investment_id, &data)
            .await?;

        Ok(with_performance(investment))
    }

    pub async fn delete_investment(&self, owner_id: Uuid, investment_id: Uuid) -> ServiceResult<()> {
        self.find_investment(owner_id, investment_id).await?;
        self.investment_repo
            .delete_investment(investment_id)
            .await?;

        Ok(())
    }
}

fn with_performance(investment: Investment) -> InvestmentWithPerformance {
    InvestmentWithPerformance {
        performance: Performance::of(&investment),
        investment,
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};

    use crate::repos::InvestmentRepo;

    use super::*;

    #[derive(Default)]
    struct FakeInvestmentRepo {
        accounts: Mutex<Vec<InvestmentAccount>>,
        investments: Mutex<Vec<Investment>>,
    }

    #[async_trait]
    impl InvestmentRepo for FakeInvestmentRepo {
        async fn list_accounts(&self, owner_id: Uuid) -> Result<Vec<InvestmentAccount>> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.owner_id == owner_id)
                .cloned()
                .collect())
        }

        async fn get_account(
            &self,
            owner_id: Uuid,
            account_id: Uuid,
        ) -> Result<Option<InvestmentAccount>> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.owner_id == owner_id && a.id == account_id)
                .cloned())
        }

        async fn create_account(
            &self,
            owner_id: Uuid,
            data: &InvestmentAccountData,
        ) -> Result<InvestmentAccount> {
            let account = InvestmentAccount {
                id: Uuid::new_v4(),
                owner_id,
                name: data.name.clone(),
                platform: data.platform.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.accounts.lock().unwrap().push(account.clone());

            Ok(account)
        }

        async fn update_account(
            &self,
            owner_id: Uuid,
            account_id: Uuid,
            data: &InvestmentAccountData,
        ) -> Result<Option<InvestmentAccount>> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter_mut()
                .find(|a| a.owner_id == owner_id && a.id == account_id)
                .map(|a| {
                    a.name = data.name.clone();
                    a.platform = data.platform.clone();
                    a.clone()
                }))
        }

        async fn delete_account(&self, owner_id: Uuid, account_id: Uuid) -> Result<bool> {
            let mut accounts = self.accounts.lock().unwrap();
            let before = accounts.len();
            accounts.retain(|a| !(a.owner_id == owner_id && a.id == account_id));
            self.investments
                .lock()
                .unwrap()
                .retain(|i| i.investment_account_id != account_id);

            Ok(accounts.len() < before)
        }

        async fn list_investments(&self, account_ids: &[Uuid]) -> Result<Vec<Investment>> {
            Ok(self
                .investments
                .lock()
                .unwrap()
                .iter()
                .filter(|i| account_ids.contains(&i.investment_account_id))
                .cloned()
                .collect())
        }

        async fn get_investment(
            &self,
            owner_id: Uuid,
            investment_id: Uuid,
        ) -> Result<Option<Investment>> {
            let owned: Vec<Uuid> = self
                .list_accounts(owner_id)
                .await?
                .iter()
                .map(|a| a.id)
                .collect();

            Ok(self
                .investments
                .lock()
                .unwrap()
                .iter()
                .find(|i| i.id == investment_id && owned.contains(&i.investment_account_id))
                .cloned())
        }

        async fn create_investment(
            &self,
            account_id: Uuid,
            data: &InvestmentData,
        ) -> Result<Investment> {
            let investment = Investment {
                id: Uuid::new_v4(),
                investment_account_id: account_id,
                symbol: data.symbol.clone(),
                name: data.name.clone(),
                shares: data.shares,
                purchase_price: data.purchase_price,
                current_price: data.current_price,
                purchase_date: data.purchase_date,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.investments.lock().unwrap().push(investment.clone());

            Ok(investment)
        }

        async fn update_investment(
            &self,
            investment_id: Uuid,
            data: &InvestmentData,
        ) -> Result<Investment> {
            let mut investments = self.investments.lock().unwrap();
            let investment = investments
                .iter_mut()
                .find(|i| i.id == investment_id)
                .ok_or_else(|| anyhow::anyhow!("missing investment"))?;
            investment.current_price = data.current_price;
            investment.shares = data.shares;

            Ok(investment.clone())
        }

        async fn delete_investment(&self, investment_id: Uuid) -> Result<()> {
            self.investments
                .lock()
                .unwrap()
                .retain(|i| i.id != investment_id);

            Ok(())
        }
    }

    fn position(symbol: &str, shares: f64, purchase_price: i64, current_price: i64) -> InvestmentData {
        InvestmentData {
            symbol: symbol.to_owned(),
            name: None,
            shares,
            purchase_price,
            current_price,
            purchase_date: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn account_summary_totals_positions() {
        let service = InvestmentService::new(Arc::new(FakeInvestmentRepo::default()));
        let owner = Uuid::new_v4();
        let account = service
            .create_account(
                owner,
                InvestmentAccountData {
                    name: "Brokerage".to_owned(),
                    platform: None,
                },
            )
            .await
            .unwrap();

        let created = service
            .create_investment(owner, account.account.id, position(" vti ", 10.0, 20_000, 22_000))
            .await
            .unwrap();
        assert_eq!("VTI", created.investment.symbol);

        service
            .create_investment(owner, account.account.id, position("BND", 5.0, 8_000, 7_000))
            .await
            .unwrap();

        let summaries = service.list_accounts(owner).await.unwrap();
        assert_eq!(1, summaries.len());
        assert_eq!(240_000, summaries[0].performance.cost_basis);
        assert_eq!(255_000, summaries[0].performance.current_value);
        assert_eq!(15_000, summaries[0].performance.gain);
        assert_eq!(
            summaries[0].performance,
            service.portfolio(owner).await.unwrap()
        );
    }

    #[tokio::test]
    async fn investments_in_foreign_accounts_are_hidden() {
        let service = InvestmentService::new(Arc::new(FakeInvestmentRepo::default()));
        let owner = Uuid::new_v4();
        let account = service
            .create_account(
                owner,
                InvestmentAccountData {
                    name: "Brokerage".to_owned(),
                    platform: Some("Vanguard".to_owned()),
                },
            )
            .await
            .unwrap();

        let result = service
            .create_investment(Uuid::new_v4(), account.account.id, position("VTI", 1.0, 1, 1))
            .await;

        assert!(matches!(result, Err(ServiceError::NotFound("Investment account"))));
    }
}
