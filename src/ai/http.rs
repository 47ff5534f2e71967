use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use crate::{authentication::Session, http_err::ApiResponse, server::AppState};

use super::{services::AiService, ChatData, ChatReply, ConversationMessage};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ai/chat", post(chat))
        .route("/ai/history", get(get_history).delete(clear_history))
}

async fn chat(
    session: Session,
    State(ai_service): State<AiService>,
    Json(data): Json<ChatData>,
) -> ApiResponse<Json<ChatReply>> {
    Ok(Json(
        ai_service
            .chat(session.user_id(), Utc::now().date_naive(), data)
            .await?,
    ))
}

async fn get_history(
    session: Session,
    State(ai_service): State<AiService>,
) -> ApiResponse<Json<Vec<ConversationMessage>>> {
    Ok(Json(ai_service.history(session.user_id()).await?))
}

async fn clear_history(
    session: Session,
    State(ai_service): State<AiService>,
) -> ApiResponse<StatusCode> {
    ai_service.clear_history(session.user_id()).await?;

    Ok(StatusCode::NO_CONTENT)
}
