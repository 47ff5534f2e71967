use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::http_err::ApiError;

/// Failures a service operation reports to its caller.
///
/// Anything that is not the caller's fault ends up in [`Self::Other`] and is
/// reported as an internal error.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The resource does not exist or is not visible to the caller. The value
    /// names the resource, eg "Account".
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The caller can see the resource but may not perform the operation.
    #[error("operation not permitted")]
    Forbidden,

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("invalid data: {0}")]
    InvalidData(#[from] ValidationErrors),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<sqlx::Error> for ServiceError {
    fn from(error: sqlx::Error) -> Self {
        Self::Other(error.into())
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::NotFound(resource) => Self::NotFound(format!("{} not found.", resource)),
            ServiceError::Forbidden => Self::Forbidden,
            ServiceError::Invalid(reason) => Self::BadRequestReason(reason),
            ServiceError::InvalidData(errors) => Self::InvalidData(errors),
            ServiceError::Conflict(reason) => Self::Conflict(reason),
            ServiceError::Other(error) => {
                error!(?error, "Service operation failed.");

                Self::InternalServerError
            }
        }
    }
}
