use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    client_ip::ClientIp,
    http_err::{ApiError, ApiResponse},
    rate_limit::{self, RateLimiter},
    server::AppState,
    users::services::UserService,
};

use super::{Session, SessionKeys};

pub fn routes() -> Router<AppState> {
    Router::new().route("/sessions", post(create_session))
}

#[derive(Deserialize)]
struct EmailPasswordPair {
    email: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSession {
    token: String,
    expires_at: DateTime<Utc>,
}

async fn create_session(
    ClientIp(client_ip): ClientIp,
    State(rate_limiter): State<Arc<dyn RateLimiter>>,
    State(user_service): State<UserService>,
    State(session_keys): State<SessionKeys>,
    Json(credentials): Json<EmailPasswordPair>,
) -> ApiResponse<(StatusCode, Json<CreatedSession>)> {
    rate_limit::enforce(
        rate_limiter.as_ref(),
        &format!("/sessions_post_{}", client_ip),
        10,
    )?;

    let user = match user_service
        .authenticate(&credentials.email, &credentials.password)
        .await?
    {
        Some(user) => user,
        None => {
            debug!("Rejected login attempt.");

            return Err(ApiError::BadRequestReason(
                "Invalid email or password.".to_owned(),
            ));
        }
    };

    let session = Session::new_for_user(user.id);
    let (token, expires_at) = session_keys.issue(&session)?;
    info!(user_id = %user.id, session_id = %session.id(), "Created session.");

    Ok((
        StatusCode::CREATED,
        Json(CreatedSession { token, expires_at }),
    ))
}
