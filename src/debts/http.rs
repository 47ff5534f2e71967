use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{authentication::Session, http_err::ApiResponse, server::AppState};

use super::{
    calculators::{InterestCalculation, InterestResult, ScheduleRow},
    services::DebtService,
    DebtWithTotals, NewDebtData, PaymentData,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/debts", get(list_debts).post(create_debt))
        .route(
            "/debts/:debt_id",
            get(get_debt).put(update_debt).delete(delete_debt),
        )
        .route("/debts/:debt_id/payments", post(record_payment))
        .route("/debts/:debt_id/schedule", get(get_schedule))
        .route("/calculators/interest", post(calculate_interest))
}

async fn list_debts(
    session: Session,
    State(debt_service): State<DebtService>,
) -> ApiResponse<Json<Vec<DebtWithTotals>>> {
    Ok(Json(debt_service.list_debts(session.user_id()).await?))
}

async fn create_debt(
    session: Session,
    State(debt_service): State<DebtService>,
    Json(data): Json<NewDebtData>,
) -> ApiResponse<(StatusCode, Json<DebtWithTotals>)> {
    let debt = debt_service.create_debt(session.user_id(), data).await?;

    Ok((StatusCode::CREATED, Json(debt)))
}

async fn get_debt(
    session: Session,
    State(debt_service): State<DebtService>,
    Path(debt_id): Path<Uuid>,
) -> ApiResponse<Json<DebtWithTotals>> {
    Ok(Json(debt_service.get_debt(session.user_id(), debt_id).await?))
}

async fn update_debt(
    session: Session,
    State(debt_service): State<DebtService>,
    Path(debt_id): Path<Uuid>,
    Json(data): Json<NewDebtData>,
) -> ApiResponse<Json<DebtWithTotals>> {
    Ok(Json(
        debt_service
            .update_debt(session.user_id(), debt_id, data)
            .await?,
    ))
}

async fn delete_debt(
    session: Session,
    State(debt_service): State<DebtService>,
    Path(debt_id): Path<Uuid>,
) -> ApiResponse<StatusCode> {
    debt_service.delete_debt(session.user_id(), debt_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn record_payment(
    session: Session,
    State(debt_service): State<DebtService>,
    Path(debt_id): Path<Uuid>,
    Json(data): Json<PaymentData>,
) -> ApiResponse<(StatusCode, Json<DebtWithTotals>)> {
    let debt = debt_service
        .record_payment(session.user_id(), debt_id, data)
        .await?;

    Ok((StatusCode::CREATED, Json(debt)))
}

async fn get_schedule(
    session: Session,
    State(debt_service): State<DebtService>,
    Path(debt_id): Path<Uuid>,
) -> ApiResponse<Json<Vec<ScheduleRow>>> {
    Ok(Json(debt_service.schedule(session.user_id(), debt_id).await?))
}

async fn calculate_interest(
    _session: Session,
    State(debt_service): State<DebtService>,
    Json(calculation): Json<InterestCalculation>,
) -> ApiResponse<Json<InterestResult>> {
    Ok(Json(debt_service.calculate_interest(calculation)?))
}
