use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    repos::DynDebtRepo,
    service_err::{ServiceError, ServiceResult},
};

use super::{
    calculators::{InterestCalculation, InterestResult, ScheduleRow},
    Debt, DebtWithTotals, NewDebtData, PaymentData, PaymentOutcome,
};

#[derive(Clone)]
pub struct DebtService {
    debt_repo: DynDebtRepo,
}

impl DebtService {
    pub fn new(debt_repo: DynDebtRepo) -> Self {
        Self { debt_repo }
    }

    async fn find_debt(&self, owner_id: Uuid, debt_id: Uuid) -> ServiceResult<Debt> {
        self.debt_repo
            .get_debt(owner_id, debt_id)
            .await?
            .ok_or(ServiceError::NotFound("Debt"))
    }

    pub async fn list_debts(&self, owner_id: Uuid) -> ServiceResult<Vec<DebtWithTotals>> {
        Ok(self
            .debt_repo
            .list_debts(owner_id)
            .await?
            .into_iter()
            .map(DebtWithTotals::from)
            .collect())
    }

    pub async fn get_debt(&self, owner_id: Uuid, debt_id: Uuid) -> ServiceResult<DebtWithTotals> {
        Ok(self.find_debt(owner_id, debt_id).await?.into())
    }

    pub async fn create_debt(&self, owner_id: Uuid, data: NewDebtData) -> ServiceResult<DebtWithTotals> {
        data.validate()?;

        Ok(self.debt_repo.create_debt(owner_id, &data).await?.into())
    }

    pub async fn update_debt(
        &self,
        owner_id: Uuid,
        debt_id: Uuid,
        data: NewDebtData,
    ) -> ServiceResult<DebtWithTotals> {
        data.validate()?;

        self.debt_repo
            .update_debt(owner_id, debt_id, &data)
            .await?
            .map(DebtWithTotals::from)
            .ok_or(ServiceError::NotFound("Debt"))
    }

    pub async fn delete_debt(&self, owner_id: Uuid, debt_id: Uuid) -> ServiceResult<()> {
        if self.debt_repo.delete_debt(owner_id, debt_id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Debt"))
        }
    }

    /// Pay towards a debt. Payments may not exceed what is still owed.
    pub async fn record_payment(
        &self,
        owner_id: Uuid,
        debt_id: Uuid,
        data: PaymentData,
    ) -> ServiceResult<DebtWithTotals> {
        data.validate()?;

        let outcome = self
            .debt_repo
            .record_payment(owner_id, debt_id, data.amount)
            .await?
            .ok_or(ServiceError::NotFound("Debt"))?;

        let debt = match outcome {
            PaymentOutcome::Recorded(debt) => debt,
            PaymentOutcome::AlreadyPaid => {
                return Err(ServiceError::Invalid("This debt is already paid.".to_owned()))
            }
            PaymentOutcome::ExceedsOutstanding(outstanding) => {
                return Err(ServiceError::Invalid(format!(
                    "The payment exceeds the outstanding amount of {}.",
                    outstanding
                )))
            }
        };

        info!(debt_id = %debt.id, amount = data.amount, is_paid = debt.is_paid, "Recorded debt payment.");

        Ok(debt.into())
    }

    pub async fn schedule(&self, owner_id: Uuid, debt_id: Uuid) -> ServiceResult<Vec<ScheduleRow>> {
        Ok(self.find_debt(owner_id, debt_id).await?.schedule())
    }

    pub fn calculate_interest(&self, calculation: InterestCalculation) -> ServiceResult<InterestResult> {
        calculation.validate()?;

        Ok(calculation.calculate())
    }
}
