use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::{authentication::Session, http_err::ApiResponse, server::AppState};

use super::{services::CategoryService, Category, NewCategoryData};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:category_id",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
}

async fn list_categories(
    session: Session,
    State(category_service): State<CategoryService>,
) -> ApiResponse<Json<Vec<Category>>> {
    Ok(Json(
        category_service.list_categories(session.user_id()).await?,
    ))
}

async fn create_category(
    session: Session,
    State(category_service): State<CategoryService>,
    Json(data): Json<NewCategoryData>,
) -> ApiResponse<(StatusCode, Json<Category>)> {
    let category = category_service
        .create_category(session.user_id(), data)
        .await?;

    Ok((StatusCode::CREATED, Json(category)))
}

async fn get_category(
    session: Session,
    State(category_service): State<CategoryService>,
    Path(category_id): Path<Uuid>,
) -> ApiResponse<Json<Category>> {
    Ok(Json(
        category_service
            .get_category(session.user_id(), category_id)
            .await?,
    ))
}

async fn update_category(
    session: Session,
    State(category_service): State<CategoryService>,
    Path(category_id): Path<Uuid>,
    Json(data): Json<NewCategoryData>,
) -> ApiResponse<Json<Category>> {
    Ok(Json(
        category_service
            .update_category(session.user_id(), category_id, data)
            .await?,
    ))
}

async fn delete_category(
    session: Session,
    State(category_service): State<CategoryService>,
    Path(category_id): Path<Uuid>,
) -> ApiResponse<StatusCode> {
    category_service
        .delete_category(session.user_id(), category_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
