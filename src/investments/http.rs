use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::{authentication::Session, http_err::ApiResponse, server::AppState};

use super::{
    services::InvestmentService, InvestmentAccountData, InvestmentAccountSummary, InvestmentData,
    InvestmentWithPerformance, Performance,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/investment-accounts",
            get(list_accounts).post(create_account),
        )
        .route(
            "/investment-accounts/:account_id",
            get(get_account).put(update_account).delete(delete_account),
        )
        .route(
            "/investment-accounts/:account_id/investments",
            get(list_investments).post(create_investment),
        )
        .route("/investments/performance", get(get_portfolio))
        .route(
            "/investments/:investment_id",
            get(get_investment)
                .put(update_investment)
                .delete(delete_investment),
        )
}

async fn list_accounts(
    session: Session,
    State(investment_service): State<InvestmentService>,
) -> ApiResponse<Json<Vec<InvestmentAccountSummary>>> {
    Ok(Json(
        investment_service.list_accounts(session.user_id()).await?,
    ))
}

async fn create_account(
    session: Session,
    State(investment_service): State<InvestmentService>,
    Json(data): Json<InvestmentAccountData>,
) -> ApiResponse<(StatusCode, Json<InvestmentAccountSummary>)> {
    let account = investment_service
        .create_account(session.user_id(), data)
        .await?;

    Ok((StatusCode::CREATED, Json(account)))
}

async fn get_account(
    session: Session,
    State(investment_service): State<InvestmentService>,
    Path(account_id): Path<Uuid>,
) -> ApiResponse<Json<InvestmentAccountSummary>> {
    Ok(Json(
        investment_service
            .get_account(session.user_id(), account_id)
            .await?,
    ))
}

async fn update_account(
    session: Session,
    State(investment_service): State<InvestmentService>,
    Path(account_id): Path<Uuid>,
    Json(data): Json<InvestmentAccountData>,
) -> ApiResponse<Json<InvestmentAccountSummary>> {
    Ok(Json(
        investment_service
            .update_account(session.user_id(), account_id, data)
            .await?,
    ))
}

async fn delete_account(
    session: Session,
    State(investment_service): State<InvestmentService>,
    Path(account_id): Path<Uuid>,
) -> ApiResponse<StatusCode> {
    investment_service
        .delete_account(session.user_id(), account_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_investments(
    session: Session,
    State(investment_service): State<InvestmentService>,
    Path(account_id): Path<Uuid>,
) -> ApiResponse<Json<Vec<InvestmentWithPerformance>>> {
    Ok(Json(
        investment_service
            .list_investments(session.user_id(), account_id)
            .await?,
    ))
}

async fn create_investment(
    session: Session,
    State(investment_service): State<InvestmentService>,
    Path(account_id): Path<Uuid>,
    Json(data): Json<InvestmentData>,
) -> ApiResponse<(StatusCode, Json<InvestmentWithPerformance>)> {
    let investment = investment_service
        .create_investment(session.user_id(), account_id, data)
        .await?;

    Ok((StatusCode::CREATED, Json(investment)))
}

async fn get_portfolio(
    session: Session,
    State(investment_service): State<InvestmentService>,
) -> ApiResponse<Json<Performance>> {
    Ok(Json(investment_service.portfolio(session.user_id()).await?))
}

async fn get_investment(
    session: Session,
    State(investment_service): State<InvestmentService>,
    Path(investment_id): Path<Uuid>,
) -> ApiResponse<Json<InvestmentWithPerformance>> {
    Ok(Json(
        investment_service
            .get_investment(session.user_id(), investment_id)
            .await?,
    ))
}

async fn update_investment(
    session: Session,
    State(investment_service): State<InvestmentService>,
    Path(investment_id): Path<Uuid>,
    Json(data): Json<InvestmentData>,
) -> ApiResponse<Json<InvestmentWithPerformance>> {
    Ok(Json(
        investment_service
            .update_investment(session.user_id(), investment_id, data)
            .await?,
    ))
}

async fn delete_investment(
    session: Session,
    State(investment_service): State<InvestmentService>,
    Path(investment_id): Path<Uuid>,
) -> ApiResponse<StatusCode> {
    investment_service
        .delete_investment(session.user_id(), investment_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
