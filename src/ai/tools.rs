use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    accounts::services::AccountService,
    analytics::services::AnalyticsService,
    budgets::services::BudgetService,
    categories::services::CategoryService,
    debts::services::DebtService,
    goals::services::GoalService,
    service_err::{ServiceError, ServiceResult},
    transactions::{
        services::TransactionService, NewTransactionData, TransactionKind, TransactionQuery,
    },
};

use super::client::ToolDefinition;

/// The services the assistant acts through, always on behalf of the user it
/// is talking to.
#[derive(Clone)]
pub struct Toolbox {
    pub account_service: AccountService,
    pub category_service: CategoryService,
    pub transaction_service: TransactionService,
    pub analytics_service: AnalyticsService,
    pub budget_service: BudgetService,
    pub goal_service: GoalService,
    pub debt_service: DebtService,
}

fn no_parameters() -> Value {
    json!({ "type": "object", "properties": {} })
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_accounts",
            description: "List the user's accounts with balances, including shared accounts.",
            parameters: no_parameters(),
        },
        ToolDefinition {
            name: "list_categories",
            description: "List the user's income and expense categories.",
            parameters: no_parameters(),
        },
        ToolDefinition {
            name: "list_transactions",
            description: "List the most recent transactions, optionally filtered. Amounts are in minor units.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "accountId": { "type": "string", "format": "uuid" },
                    "categoryId": { "type": "string", "format": "uuid" },
                    "kind": { "type": "string", "enum": ["income", "expense"] },
                    "from": { "type": "string", "format": "date" },
                    "to": { "type": "string", "format": "date" },
                    "search": { "type": "string", "description": "Text contained in the description." },
                },
            }),
        },
        ToolDefinition {
            name: "create_transaction",
            description: "Record an income or expense. Amounts are positive integers in minor units, eg cents.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "accountId": { "type": "string", "format": "uuid" },
                    "categoryId": { "type": "string", "format": "uuid" },
                    "kind": { "type": "string", "enum": ["income", "expense"] },
                    "amount": { "type": "integer", "minimum": 1 },
                    "description": { "type": "string" },
                    "date": { "type": "string", "format": "date" },
                },
                "required": ["accountId", "kind", "amount", "description", "date"],
            }),
        },
        ToolDefinition {
            name: "get_summary",
            description: "Total income, expenses and balance across all of the user's accounts.",
            parameters: no_parameters(),
        },
        ToolDefinition {
            name: "list_budgets",
            description: "List budgets with how much has been spent in the current period.",
            parameters: no_parameters(),
        },
        ToolDefinition {
            name: "list_goals",
            description: "List saving goals with progress towards each target.",
            parameters: no_parameters(),
        },
        ToolDefinition {
            name: "list_debts",
            description: "List debts with interest and the amount still outstanding.",
            parameters: no_parameters(),
        },
    ]
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionFilter {
    account_id: Option<Uuid>,
    category_id: Option<Uuid>,
    kind: Option<TransactionKind>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    search: Option<String>,
}

impl Toolbox {
    /// Run a tool call and describe the outcome for the model. Failures are
    /// reported back to the model rather than ending the conversation.
    pub async fn call(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        name: &str,
        arguments: &str,
    ) -> Value {
        debug!(%user_id, tool = name, "Running assistant tool.");

        match self.dispatch(user_id, today, name, arguments).await {
            Ok(value) => value,
            Err(ServiceError::Other(error)) => {
                error!(?error, tool = name, "Assistant tool failed.");

                json!({ "error": "Something went wrong while running the tool." })
            }
            Err(error) => json!({ "error": error.to_string() }),
        }
    }

    async fn dispatch(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        name: &str,
        arguments: &str,
    ) -> ServiceResult<Value> {
        let value = match name {
            "list_accounts" => to_json(self.account_service.list_accounts(user_id).await?)?,
            "list_categories" => to_json(self.category_service.list_categories(user_id).await?)?,
            "list_transactions" => {
                let filter: TransactionFilter = parse_arguments(arguments)?;
                let page = self
                    .transaction_service
                    .list_transactions(TransactionQuery {
                        user_id,
                        account_id: filter.account_id,
                        category_id: filter.category_id,
                        kind: filter.kind,
                        from: filter.from,
                        to: filter.to,
                        search: filter.search,
                        ..Default::default()
                    })
                    .await?;

                to_json(page.items)?
            }
            "create_transaction" => {
                let data: NewTransactionData = parse_arguments(arguments)?;

                to_json(self.transaction_service.create_transaction(user_id, data).await?)?
            }
            "get_summary" => to_json(self.analytics_service.summary(user_id).await?)?,
            "list_budgets" => to_json(self.budget_service.list_budgets(user_id, today).await?)?,
            "list_goals" => to_json(self.goal_service.list_goals(user_id, today).await?)?,
            "list_debts" => to_json(self.debt_service.list_debts(user_id).await?)?,
            other => return Err(ServiceError::Invalid(format!("Unknown tool '{}'.", other))),
        };

        Ok(value)
    }
}

fn parse_arguments<T: DeserializeOwned>(arguments: &str) -> ServiceResult<T> {
    let arguments = match arguments.trim() {
        "" => "{}",
        arguments => arguments,
    };

    serde_json::from_str(arguments)
        .map_err(|error| ServiceError::Invalid(format!("Invalid arguments: {}", error)))
}

fn to_json<T: Serialize>(value: T) -> ServiceResult<Value> {
    Ok(serde_json::to_value(value).map_err(anyhow::Error::from)?)
}
