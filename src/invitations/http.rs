use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{authentication::Session, http_err::ApiResponse, server::AppState};

use super::{services::InvitationService, Invitation, NewInvitationData};

/// Accepting and declining address an invitation by its token, revoking by
/// its ID. The router needs the same parameter name for both.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/accounts/:account_id/invitations",
            get(list_sent).post(create_invitation),
        )
        .route("/invitations", get(list_received))
        .route("/invitations/:invitation/accept", post(accept_invitation))
        .route("/invitations/:invitation/decline", post(decline_invitation))
        .route("/invitations/:invitation", delete(revoke_invitation))
}

async fn create_invitation(
    session: Session,
    State(invitation_service): State<InvitationService>,
    Path(account_id): Path<Uuid>,
    Json(data): Json<NewInvitationData>,
) -> ApiResponse<(StatusCode, Json<Invitation>)> {
    let invitation = invitation_service
        .invite(session.user_id(), account_id, data, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(invitation)))
}

async fn list_sent(
    session: Session,
    State(invitation_service): State<InvitationService>,
    Path(account_id): Path<Uuid>,
) -> ApiResponse<Json<Vec<Invitation>>> {
    Ok(Json(
        invitation_service
            .list_sent(session.user_id(), account_id)
            .await?,
    ))
}

async fn list_received(
    session: Session,
    State(invitation_service): State<InvitationService>,
) -> ApiResponse<Json<Vec<Invitation>>> {
    Ok(Json(
        invitation_service.list_received(session.user_id()).await?,
    ))
}

async fn accept_invitation(
    session: Session,
    State(invitation_service): State<InvitationService>,
    Path(token): Path<String>,
) -> ApiResponse<Json<Invitation>> {
    Ok(Json(
        invitation_service
            .accept(session.user_id(), &token, Utc::now())
            .await?,
    ))
}

async fn decline_invitation(
    session: Session,
    State(invitation_service): State<InvitationService>,
    Path(token): Path<String>,
) -> ApiResponse<Json<Invitation>> {
    Ok(Json(
        invitation_service
            .decline(session.user_id(), &token, Utc::now())
            .await?,
    ))
}

async fn revoke_invitation(
    session: Session,
    State(invitation_service): State<InvitationService>,
    Path(invitation_id): Path<Uuid>,
) -> ApiResponse<StatusCode> {
    invitation_service
        .revoke(session.user_id(), invitation_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
