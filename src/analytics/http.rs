use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::{authentication::Session, http_err::ApiResponse, server::AppState};

use super::{services::AnalyticsService, CategoryTotal, MonthlyTotal, Summary};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/analytics/summary", get(get_summary))
        .route("/analytics/monthly", get(get_monthly))
        .route("/analytics/categories", get(get_categories))
}

async fn get_summary(
    session: Session,
    State(analytics_service): State<AnalyticsService>,
) -> ApiResponse<Json<Summary>> {
    Ok(Json(analytics_service.summary(session.user_id()).await?))
}

#[derive(Deserialize)]
struct MonthlyParams {
    months: Option<u32>,
}

async fn get_monthly(
    session: Session,
    State(analytics_service): State<AnalyticsService>,
    Query(MonthlyParams { months }): Query<MonthlyParams>,
) -> ApiResponse<Json<Vec<MonthlyTotal>>> {
    Ok(Json(
        analytics_service
            .monthly(session.user_id(), Utc::now().date_naive(), months.unwrap_or(6))
            .await?,
    ))
}

#[derive(Deserialize)]
struct CategoryParams {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

async fn get_categories(
    session: Session,
    State(analytics_service): State<AnalyticsService>,
    Query(CategoryParams { from, to }): Query<CategoryParams>,
) -> ApiResponse<Json<Vec<CategoryTotal>>> {
    Ok(Json(
        analytics_service
            .categories(session.user_id(), Utc::now().date_naive(), from, to)
            .await?,
    ))
}
