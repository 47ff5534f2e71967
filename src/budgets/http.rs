use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{authentication::Session, http_err::ApiResponse, server::AppState};

use super::{services::BudgetService, BudgetProgress, NewBudgetData};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/budgets", get(list_budgets).post(create_budget))
        .route(
            "/budgets/:budget_id",
            get(get_budget).put(update_budget).delete(delete_budget),
        )
        .route("/budgets/:budget_id/progress", get(get_budget))
}

async fn list_budgets(
    session: Session,
    State(budget_service): State<BudgetService>,
) -> ApiResponse<Json<Vec<BudgetProgress>>> {
    Ok(Json(
        budget_service
            .list_budgets(session.user_id(), Utc::now().date_naive())
            .await?,
    ))
}

async fn create_budget(
    session: Session,
    State(budget_service): State<BudgetService>,
    Json(data): Json<NewBudgetData>,
) -> ApiResponse<(StatusCode, Json<BudgetProgress>)> {
    let budget = budget_service
        .create_budget(session.user_id(), data, Utc::now().date_naive())
        .await?;

    Ok((StatusCode::CREATED, Json(budget)))
}

async fn get_budget(
    session: Session,
    State(budget_service): State<BudgetService>,
    Path(budget_id): Path<Uuid>,
) -> ApiResponse<Json<BudgetProgress>> {
    Ok(Json(
        budget_service
            .get_budget(session.user_id(), budget_id, Utc::now().date_naive())
            .await?,
    ))
}

async fn update_budget(
    session: Session,
    State(budget_service): State<BudgetService>,
    Path(budget_id): Path<Uuid>,
    Json(data): Json<NewBudgetData>,
) -> ApiResponse<Json<BudgetProgress>> {
    Ok(Json(
        budget_service
            .update_budget(session.user_id(), budget_id, data, Utc::now().date_naive())
            .await?,
    ))
}

async fn delete_budget(
    session: Session,
    State(budget_service): State<BudgetService>,
    Path(budget_id): Path<Uuid>,
) -> ApiResponse<StatusCode> {
    budget_service
        .delete_budget(session.user_id(), budget_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
