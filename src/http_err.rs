use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::error;
use validator::ValidationErrors;

use crate::rate_limit::RateLimitResult;

#[derive(Debug)]
pub enum ApiError {
    /// The request was malformed for a reason that can be described in a
    /// single message.
    BadRequestReason(String),
    /// The request body failed field validation.
    InvalidData(ValidationErrors),
    Unauthorized,
    Forbidden,
    NotFound(String),
    Conflict(String),
    TooManyRequests(RateLimitResult),
    /// A third-party service we depend on failed to answer.
    BadGateway(String),
    ServiceUnavailable(String),
    InternalServerError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequestReason(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorRep { message })).into_response()
            }
            Self::InvalidData(errors) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "message": "Invalid data.",
                    "errors": errors,
                })),
            )
                .into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorRep {
                    message: "Authentication required.".to_owned(),
                }),
            )
                .into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(ErrorRep {
                    message: "You do not have permission to do that.".to_owned(),
                }),
            )
                .into_response(),
            Self::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorRep { message })).into_response()
            }
            Self::Conflict(message) => {
                (StatusCode::CONFLICT, Json(ErrorRep { message })).into_response()
            }
            Self::TooManyRequests(result) => result.into_response(),
            Self::BadGateway(message) => {
                (StatusCode::BAD_GATEWAY, Json(ErrorRep { message })).into_response()
            }
            Self::ServiceUnavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorRep { message })).into_response()
            }
            Self::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorRep {
                    message: "Internal server error.".to_owned(),
                }),
            )
                .into_response(),
        }
    }
}

impl From<RateLimitResult> for ApiError {
    fn from(result: RateLimitResult) -> Self {
        Self::TooManyRequests(result)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::InvalidData(errors)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        error!(?error, "Received error.");

        Self::InternalServerError
    }
}

pub type ApiResponse<T> = Result<T, ApiError>;

#[derive(Serialize)]
pub struct ErrorRep {
    pub message: String,
}
