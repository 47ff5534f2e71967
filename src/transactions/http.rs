use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    authentication::Session,
    http_err::{ApiError, ApiResponse},
    server::AppState,
};

use super::{
    services::TransactionService, NewTransactionData, Transaction, TransactionCursor,
    TransactionKind, TransactionQuery, UpcomingOccurrence,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route(
            "/transactions/recurring/upcoming",
            get(list_upcoming_recurring),
        )
        .route(
            "/transactions/:transaction_id",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
}

#[derive(Serialize)]
pub struct ResourceCollection<T: Serialize> {
    pub next: Option<String>,
    pub items: Vec<T>,
}

#[derive(Deserialize)]
struct ListTransactionsParams {
    account: Option<Uuid>,
    category: Option<Uuid>,
    kind: Option<TransactionKind>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    search: Option<String>,
    recurring: Option<bool>,
    after: Option<String>,
}

async fn list_transactions(
    session: Session,
    State(transaction_service): State<TransactionService>,
    Query(params): Query<ListTransactionsParams>,
) -> ApiResponse<Json<ResourceCollection<Transaction>>> {
    let after = match params.after.as_deref() {
        Some(encoded) => Some(TransactionCursor::decode(encoded).map_err(|error| {
            debug!(?error, "Received invalid transaction cursor.");

            ApiError::BadRequestReason("Invalid cursor.".to_owned())
        })?),
        None => None,
    };

    let query = TransactionQuery {
        user_id: session.user_id(),
        after,
        account_id: params.account,
        category_id: params.category,
        kind: params.kind,
        from: params.from,
        to: params.to,
        search: params.search.filter(|s| !s.trim().is_empty()),
        recurring: params.recurring,
    };

    let transactions = transaction_service.list_transactions(query).await?;
    let next = match transactions.next {
        Some(cursor) => Some(cursor.encode()?),
        None => None,
    };

    Ok(Json(ResourceCollection {
        next,
        items: transactions.items,
    }))
}

async fn create_transaction(
    session: Session,
    State(transaction_service): State<TransactionService>,
    Json(data): Json<NewTransactionData>,
) -> ApiResponse<(StatusCode, Json<Transaction>)> {
    let transaction = transaction_service
        .create_transaction(session.user_id(), data)
        .await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

async fn get_transaction(
    session: Session,
    State(transaction_service): State<TransactionService>,
    Path(transaction_id): Path<Uuid>,
) -> ApiResponse<Json<Transaction>> {
    Ok(Json(
        transaction_service
            .get_transaction(session.user_id(), transaction_id)
            .await?,
    ))
}

async fn update_transaction(
    session: Session,
    State(transaction_service): State<TransactionService>,
    Path(transaction_id): Path<Uuid>,
    Json(data): Json<NewTransactionData>,
) -> ApiResponse<Json<Transaction>> {
    Ok(Json(
        transaction_service
            .update_transaction(session.user_id(), transaction_id, data)
            .await?,
    ))
}

async fn delete_transaction(
    session: Session,
    State(transaction_service): State<TransactionService>,
    Path(transaction_id): Path<Uuid>,
) -> ApiResponse<StatusCode> {
    transaction_service
        .delete_transaction(session.user_id(), transaction_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct UpcomingParams {
    days: Option<u32>,
}

async fn list_upcoming_recurring(
    session: Session,
    State(transaction_service): State<TransactionService>,
    Query(UpcomingParams { days }): Query<UpcomingParams>,
) -> ApiResponse<Json<Vec<UpcomingOccurrence>>> {
    Ok(Json(
        transaction_service
            .upcoming_recurring(session.user_id(), Utc::now().date_naive(), days.unwrap_or(30))
            .await?,
    ))
}
