pub mod http;
pub mod services;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::currency::{self, Currency, MAX_AMOUNT};

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentAccount {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub platform: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentAccountData {
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    #[validate(length(max = 64))]
    pub platform: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    pub id: Uuid,
    pub investment_account_id: Uuid,
    pub symbol: String,
    pub name: Option<String>,
    pub shares: f64,
    /// Price per share in minor units.
    pub purchase_price: i64,
    pub current_price: i64,
    pub purchase_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_position_value", skip_on_field_errors = true))]
pub struct InvestmentData {
    #[validate(length(min = 1, max = 16))]
    pub symbol: String,

    #[validate(length(max = 128))]
    pub name: Option<String>,

    #[validate(range(min = 0.0))]
    pub shares: f64,

    #[validate(range(min = 0, max = "MAX_AMOUNT"))]
    pub purchase_price: i64,

    #[validate(range(min = 0, max = "MAX_AMOUNT"))]
    pub current_price: i64,

    pub purchase_date: NaiveDate,
}

/// Both the cost and the current value of the position must be
/// representable amounts.
fn validate_position_value(data: &InvestmentData) -> Result<(), ValidationError> {
    let largest = data.purchase_price.max(data.current_price) as f64 * data.shares;

    if largest.is_finite() && largest <= MAX_AMOUNT as f64 {
        Ok(())
    } else {
        Err(currency::amount_too_large("position_too_large"))
    }
}

impl InvestmentData {
    pub fn normalized(mut self) -> Self {
        self.symbol = self.symbol.trim().to_uppercase();
        self
    }
}

/// How a position or group of positions has done since purchase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub cost_basis: i64,
    pub current_value: i64,
    pub gain: i64,
    pub gain_percent: f64,
}

impl Performance {
    fn from_totals(cost_basis: i64, current_value: i64) -> Self {
        let gain = current_value.saturating_sub(cost_basis);
        let gain_percent = if cost_basis == 0 {
            0.0
        } else {
            ((gain as f64 / cost_basis as f64) * 10_000.0).round() / 100.0
        };

        Self {
            cost_basis,
            current_value,
            gain,
            gain_percent,
        }
    }

    pub fn of(investment: &Investment) -> Self {
        Self::from_totals(
            Currency::round_minor(investment.shares * investment.purchase_price as f64),
            Currency::round_minor(investment.shares * investment.current_price as f64),
        )
    }

    /// Aggregate performance of several positions.
    pub fn total<'a>(investments: impl IntoIterator<Item = &'a Investment>) -> Self {
        let (cost_basis, current_value) = investments
            .into_iter()
            .map(Self::of)
            .fold((0i64, 0i64), |(cost, value), p| {
                (
                    cost.saturating_add(p.cost_basis),
                    value.saturating_add(p.current_value),
                )
            });

        Self::from_totals(cost_basis, current_value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentWithPerformance {
    #[serde(flatten)]
    pub investment: Investment,
    pub performance: Performance,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentAccountSummary {
    #[serde(flatten)]
    pub account: InvestmentAccount,
    pub investments: Vec<InvestmentWithPerformance>,
    pub performance: Performance,
}

impl InvestmentAccountSummary {
    pub fn new(account: InvestmentAccount, investments: Vec<Investment>) -> Self {
        let performance = Performance::total(&investments);

        Self {
            account,
            investments: investments
                .into_iter()
                .map(|investment| InvestmentWithPerformance {
                    performance: Performance::of(&investment),
                    investment,
                })
                .collect(),
            performance,
        }
    }
}
