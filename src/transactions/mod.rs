//! Income and expense entries, and the recurring templates bill reminders
//! are computed from.

pub mod http;
mod recurrence;
pub mod services;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::currency::MAX_AMOUNT;

pub use recurrence::next_occurrence;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "transaction_kind", rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// The effect of an entry of this kind on an account balance.
    pub fn signed(&self, amount: i64) -> i64 {
        match self {
            Self::Income => amount,
            Self::Expense => -amount,
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(format!("'{}' is not 'income' or 'expense'", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "recurrence_frequency", rename_all = "lowercase")]
pub enum RecurrenceFrequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// A persisted transaction.
#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub category_id: Option<Uuid>,
    #[sqlx(default)]
    pub category_name: Option<String>,
    pub created_by: Uuid,
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    pub date: NaiveDate,
    pub recurrence: Option<RecurrenceFrequency>,
    pub recurrence_end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// The signed effect of this transaction on its account's balance.
    pub fn balance_effect(&self) -> i64 {
        self.kind.signed(self.amount)
    }
}

/// Recurrence settings for a new transaction.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceData {
    pub frequency: RecurrenceFrequency,
    pub end_date: Option<NaiveDate>,
}

/// Data for a new or updated transaction provided by a user.
#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_recurrence_window", skip_on_field_errors = false))]
pub struct NewTransactionData {
    pub account_id: Uuid,
    pub category_id: Option<Uuid>,
    pub kind: TransactionKind,

    /// The amount in minor units. Always positive, the kind determines the
    /// direction.
    #[validate(range(
        min = 1,
        max = "MAX_AMOUNT",
        message = "Amount must be greater than zero and within the supported range."
    ))]
    pub amount: i64,

    #[validate(length(min = 1, max = 256))]
    pub description: String,

    pub date: NaiveDate,

    pub recurrence: Option<RecurrenceData>,
}

fn validate_recurrence_window(data: &NewTransactionData) -> Result<(), ValidationError> {
    match &data.recurrence {
        Some(RecurrenceData {
            end_date: Some(end_date),
            ..
        }) if *end_date < data.date => {
            let mut error = ValidationError::new("recurrence_end_before_start");
            error.message = Some("Recurrence must end on or after the transaction date.".into());

            Err(error)
        }
        _ => Ok(()),
    }
}

impl NewTransactionData {
    pub fn recurrence_frequency(&self) -> Option<RecurrenceFrequency> {
        self.recurrence.as_ref().map(|r| r.frequency)
    }

    pub fn recurrence_end_date(&self) -> Option<NaiveDate> {
        self.recurrence.as_ref().and_then(|r| r.end_date)
    }
}

/// A position in the transaction list. Only results strictly after this
/// position are returned.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TransactionCursor {
    pub after_date: NaiveDate,
    pub after_created_at: DateTime<Utc>,
}

impl TransactionCursor {
    /// Encode the cursor as an opaque, URL-safe string.
    pub fn encode(&self) -> anyhow::Result<String> {
        Ok(base64::encode_config(
            serde_json::to_vec(self)?,
            base64::URL_SAFE_NO_PAD,
        ))
    }

    pub fn decode(encoded: &str) -> anyhow::Result<Self> {
        let bytes = base64::decode_config(encoded, base64::URL_SAFE_NO_PAD)?;

        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Query parameters for listing transactions.
#[derive(Clone, Debug, Default)]
pub struct TransactionQuery {
    /// The user listing transactions. Only accounts the user can access are
    /// searched.
    pub user_id: Uuid,
    pub after: Option<TransactionCursor>,
    pub account_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub kind: Option<TransactionKind>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Case insensitive substring of the description.
    pub search: Option<String>,
    pub recurring: Option<bool>,
}

pub struct TransactionCollection {
    pub next: Option<TransactionCursor>,
    pub items: Vec<Transaction>,
}

/// A future date on which a recurring template comes due.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingOccurrence {
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub description: String,
    pub kind: TransactionKind,
    pub amount: i64,
    pub due_date: NaiveDate,
}
