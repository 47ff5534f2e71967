pub mod http;
pub mod services;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    analytics::Analytics,
    currency::{self, amount_in_range},
    transactions::TransactionKind,
};

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub balance: i64,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a user is related to an account.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Owner,
    /// The user accepted an invitation to the account.
    Member,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountWithAnalytics {
    #[serde(flatten)]
    pub account: Account,
    pub role: AccountRole,
    pub analytics: Option<Analytics>,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccountMember {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_opening_balance", skip_on_field_errors = false))]
pub struct NewAccountData {
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    #[validate(length(max = 256))]
    pub description: Option<String>,

    /// Starting balance in minor units. May be negative for an account that
    /// starts in debt.
    #[serde(default)]
    pub opening_balance: i64,
}

fn validate_opening_balance(data: &NewAccountData) -> Result<(), ValidationError> {
    if amount_in_range(data.opening_balance) {
        Ok(())
    } else {
        Err(currency::amount_too_large("opening_balance_too_large"))
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdateData {
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    #[validate(length(max = 256))]
    pub description: Option<String>,
}

/// The transaction recorded when an account is opened with a non-zero
/// balance.
#[derive(Clone, Debug, PartialEq)]
pub struct OpeningTransaction {
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    pub date: NaiveDate,
}

impl OpeningTransaction {
    pub const DESCRIPTION: &'static str = "Opening balance";

    /// The entry that brings a new account from zero to `opening_balance`, or
    /// `None` when the account starts empty.
    pub fn for_balance(opening_balance: i64, date: NaiveDate) -> Option<Self> {
        let kind = match opening_balance {
            0 => return None,
            balance if balance > 0 => TransactionKind::Income,
            _ => TransactionKind::Expense,
        };

        Some(Self {
            kind,
            amount: opening_balance.saturating_abs(),
            description: Self::DESCRIPTION.to_owned(),
            date,
        })
    }
}
