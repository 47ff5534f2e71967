use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{authentication::Session, http_err::ApiResponse, server::AppState};

use super::{services::GoalService, ContributionData, GoalProgress, NewGoalData};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/goals", get(list_goals).post(create_goal))
        .route(
            "/goals/:goal_id",
            get(get_goal).put(update_goal).delete(delete_goal),
        )
        .route("/goals/:goal_id/contributions", post(contribute))
}

async fn list_goals(
    session: Session,
    State(goal_service): State<GoalService>,
) -> ApiResponse<Json<Vec<GoalProgress>>> {
    Ok(Json(
        goal_service
            .list_goals(session.user_id(), Utc::now().date_naive())
            .await?,
    ))
}

async fn create_goal(
    session: Session,
    State(goal_service): State<GoalService>,
    Json(data): Json<NewGoalData>,
) -> ApiResponse<(StatusCode, Json<GoalProgress>)> {
    let goal = goal_service
        .create_goal(session.user_id(), data, Utc::now().date_naive())
        .await?;

    Ok((StatusCode::CREATED, Json(goal)))
}

async fn get_goal(
    session: Session,
    State(goal_service): State<GoalService>,
    Path(goal_id): Path<Uuid>,
) -> ApiResponse<Json<GoalProgress>> {
    Ok(Json(
        goal_service
            .get_goal(session.user_id(), goal_id, Utc::now().date_naive())
            .await?,
    ))
}

async fn update_goal(
    session: Session,
    State(goal_service): State<GoalService>,
    Path(goal_id): Path<Uuid>,
    Json(data): Json<NewGoalData>,
) -> ApiResponse<Json<GoalProgress>> {
    Ok(Json(
        goal_service
            .update_goal(session.user_id(), goal_id, data, Utc::now().date_naive())
            .await?,
    ))
}

async fn delete_goal(
    session: Session,
    State(goal_service): State<GoalService>,
    Path(goal_id): Path<Uuid>,
) -> ApiResponse<StatusCode> {
    goal_service.delete_goal(session.user_id(), goal_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn contribute(
    session: Session,
    State(goal_service): State<GoalService>,
    Path(goal_id): Path<Uuid>,
    Json(data): Json<ContributionData>,
) -> ApiResponse<(StatusCode, Json<GoalProgress>)> {
    let goal = goal_service
        .contribute(session.user_id(), goal_id, data, Utc::now().date_naive())
        .await?;

    Ok((StatusCode::CREATED, Json(goal)))
}
