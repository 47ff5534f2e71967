pub mod http;
pub mod services;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::transactions::TransactionKind;

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewCategoryData {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    pub kind: TransactionKind,
}

impl NewCategoryData {
    /// Drops surrounding whitespace from the name before it is saved.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_owned();
        self
    }
}

/// Lookup key for a category name. Names are unique per owner ignoring case
/// and surrounding whitespace.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Categories every new user starts with.
pub const DEFAULT_CATEGORIES: [(&str, TransactionKind); 2] = [
    ("Salary", TransactionKind::Income),
    ("General", TransactionKind::Expense),
];
