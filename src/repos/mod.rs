//! Persistence for every resource.
//!
//! Each repository is a trait implemented for [`PostgresConnection`] and
//! held by services as a `Dyn*Repo` so tests can substitute in-memory
//! versions.
//!
//! [`PostgresConnection`]: crate::database::PostgresConnection

pub mod accounts;
pub mod analytics;
pub mod budgets;
pub mod categories;
pub mod conversations;
pub mod debts;
pub mod goals;
pub mod investments;
pub mod invitations;
pub mod notifications;
pub mod transactions;
pub mod users;

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

pub use accounts::{AccountRepo, DynAccountRepo};
pub use analytics::{AnalyticsRepo, DynAnalyticsRepo};
pub use budgets::{BudgetRepo, DynBudgetRepo};
pub use categories::{CategoryPersistenceError, CategoryRepo, DynCategoryRepo};
pub use conversations::{ConversationRepo, DynConversationRepo};
pub use debts::{DebtRepo, DynDebtRepo};
pub use goals::{DynGoalRepo, GoalRepo};
pub use investments::{DynInvestmentRepo, InvestmentRepo};
pub use invitations::{DynInvitationRepo, InvitationRepo};
pub use notifications::{DynNotificationRepo, NotificationRepo};
pub use transactions::{DynTransactionRepo, TransactionRepo};
pub use users::{DynUserRepo, UserPersistenceError, UserRepo};

/// IDs of the accounts a user owns or has joined, with the user bound as
/// `$1`.
pub(crate) const ACCESSIBLE_ACCOUNTS: &str = r#"
    SELECT id FROM account WHERE owner_id = $1
    UNION
    SELECT account_id FROM account_member WHERE user_id = $1
"#;

/// Push a parenthesized subquery selecting the accounts a user can access.
pub(crate) fn push_accessible_accounts(builder: &mut QueryBuilder<'_, Postgres>, user_id: Uuid) {
    builder
        .push("(SELECT id FROM account WHERE owner_id = ")
        .push_bind(user_id)
        .push(" UNION SELECT account_id FROM account_member WHERE user_id = ")
        .push_bind(user_id)
        .push(")");
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => db_error.code().as_deref() == Some("23505"),
        _ => false,
    }
}
