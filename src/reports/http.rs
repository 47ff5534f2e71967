use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{authentication::Session, http_err::ApiResponse, server::AppState};

use super::{services::ReportService, ImportReport};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transactions/export.csv", get(export_csv))
        .route("/accounts/:account_id/import", post(import_csv))
        .route("/accounts/:account_id/statement.pdf", get(statement_pdf))
}

#[derive(Deserialize)]
struct ExportParams {
    account: Option<Uuid>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

async fn export_csv(
    session: Session,
    State(report_service): State<ReportService>,
    Query(params): Query<ExportParams>,
) -> ApiResponse<impl IntoResponse> {
    let csv = report_service
        .export_csv(session.user_id(), params.account, params.from, params.to)
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"transactions.csv\"",
            ),
        ],
        csv,
    ))
}

async fn import_csv(
    session: Session,
    State(report_service): State<ReportService>,
    Path(account_id): Path<Uuid>,
    body: String,
) -> ApiResponse<Json<ImportReport>> {
    Ok(Json(
        report_service
            .import_csv(session.user_id(), account_id, &body)
            .await?,
    ))
}

#[derive(Deserialize)]
struct StatementParams {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

async fn statement_pdf(
    session: Session,
    State(report_service): State<ReportService>,
    Path(account_id): Path<Uuid>,
    Query(params): Query<StatementParams>,
) -> ApiResponse<impl IntoResponse> {
    let pdf = report_service
        .statement(
            session.user_id(),
            account_id,
            Utc::now().date_naive(),
            params.from,
            params.to,
        )
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"statement.pdf\"",
            ),
        ],
        pdf,
    ))
}
