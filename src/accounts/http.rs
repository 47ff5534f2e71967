use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use uuid::Uuid;

use crate::{authentication::Session, http_err::ApiResponse, server::AppState};

use super::{
    services::AccountService, AccountMember, AccountUpdateData, AccountWithAnalytics,
    NewAccountData,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route(
            "/accounts/:account_id",
            get(get_account).put(update_account).delete(delete_account),
        )
        .route("/accounts/:account_id/members", get(list_members))
        .route(
            "/accounts/:account_id/members/:user_id",
            delete(remove_member),
        )
}

async fn list_accounts(
    session: Session,
    State(account_service): State<AccountService>,
) -> ApiResponse<Json<Vec<AccountWithAnalytics>>> {
    Ok(Json(
        account_service.list_accounts(session.user_id()).await?,
    ))
}

async fn create_account(
    session: Session,
    State(account_service): State<AccountService>,
    Json(data): Json<NewAccountData>,
) -> ApiResponse<(StatusCode, Json<AccountWithAnalytics>)> {
    let account = account_service
        .create_account(session.user_id(), data)
        .await?;

    Ok((StatusCode::CREATED, Json(account)))
}

async fn get_account(
    session: Session,
    State(account_service): State<AccountService>,
    Path(account_id): Path<Uuid>,
) -> ApiResponse<Json<AccountWithAnalytics>> {
    Ok(Json(
        account_service
            .get_account(session.user_id(), account_id)
            .await?,
    ))
}

async fn update_account(
    session: Session,
    State(account_service): State<AccountService>,
    Path(account_id): Path<Uuid>,
    Json(data): Json<AccountUpdateData>,
) -> ApiResponse<Json<AccountWithAnalytics>> {
    Ok(Json(
        account_service
            .update_account(session.user_id(), account_id, data)
            .await?,
    ))
}

async fn delete_account(
    session: Session,
    State(account_service): State<AccountService>,
    Path(account_id): Path<Uuid>,
) -> ApiResponse<StatusCode> {
    account_service
        .delete_account(session.user_id(), account_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_members(
    session: Session,
    State(account_service): State<AccountService>,
    Path(account_id): Path<Uuid>,
) -> ApiResponse<Json<Vec<AccountMember>>> {
    Ok(Json(
        account_service
            .list_members(session.user_id(), account_id)
            .await?,
    ))
}

async fn remove_member(
    session: Session,
    State(account_service): State<AccountService>,
    Path((account_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResponse<StatusCode> {
    account_service
        .remove_member(session.user_id(), account_id, user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
