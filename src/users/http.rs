use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::{
    authentication::Session,
    client_ip::ClientIp,
    http_err::ApiResponse,
    rate_limit::{self, RateLimiter},
    server::AppState,
};

use super::{services::UserService, NewUserData, PasswordChangeData, User, UserUpdateData};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/me", get(get_me).put(update_me))
        .route("/users/me/password", put(change_password))
}

async fn create_user(
    ClientIp(client_ip): ClientIp,
    State(rate_limiter): State<Arc<dyn RateLimiter>>,
    State(user_service): State<UserService>,
    Json(data): Json<NewUserData>,
) -> ApiResponse<(StatusCode, Json<User>)> {
    rate_limit::enforce(
        rate_limiter.as_ref(),
        &format!("/users_post_{}", client_ip),
        10,
    )?;

    let user = user_service.register(data).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_me(session: Session, State(user_service): State<UserService>) -> ApiResponse<Json<User>> {
    Ok(Json(user_service.get_user(session.user_id()).await?))
}

async fn update_me(
    session: Session,
    State(user_service): State<UserService>,
    Json(data): Json<UserUpdateData>,
) -> ApiResponse<Json<User>> {
    Ok(Json(
        user_service.update_user(session.user_id(), data).await?,
    ))
}

async fn change_password(
    session: Session,
    State(user_service): State<UserService>,
    Json(data): Json<PasswordChangeData>,
) -> ApiResponse<StatusCode> {
    user_service
        .change_password(session.user_id(), data)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
