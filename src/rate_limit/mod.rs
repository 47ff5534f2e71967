mod memory;
mod redis;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::Serialize;
use tracing::error;

use crate::http_err::ApiError;

pub use self::memory::MemoryRateLimiter;
pub use self::redis::RedisRateLimiter;

/// A requests-per-minute definition of a rate limiter.
pub trait RateLimiter: Send + Sync {
    /// Record an operation for a specific resource and determine if the rate
    /// limit has been exceeded.
    ///
    /// # Arguments
    ///
    /// * `key` - A unique key for the resource being rate limited. In the
    ///   context of a web request, this should encapsulate the request path and
    ///   method, as well as the actor making the request.
    /// * `max_req_per_min` - The maximum number of requests allowed in a given
    ///   minute.
    ///
    /// # Returns
    ///
    /// In the typical case, an [Ok] result containing a result describing the
    /// requestor's rate limit state is returned. An [Err] is returned if the
    /// rate limiter encounters an error while trying to determine if the
    /// request should be rate limited.
    fn is_limited(&self, key: &str, max_req_per_min: u64) -> anyhow::Result<RateLimitResult>;
}

/// Record a request against `key`, rejecting it once the limit is exceeded.
pub fn enforce(limiter: &dyn RateLimiter, key: &str, max_req_per_min: u64) -> Result<(), ApiError> {
    match limiter.is_limited(key, max_req_per_min) {
        Ok(RateLimitResult::NotLimited) => Ok(()),
        Ok(result @ RateLimitResult::LimitedUntil(_)) => Err(result.into()),
        Err(error) => {
            error!(?error, "Failed to query rate limiter.");

            Err(ApiError::InternalServerError)
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum RateLimitResult {
    /// The rate limit has not been exceeded.
    NotLimited,
    /// The rate limit has been exceeded. Requests will be accepted again at the
    /// contained timestamp.
    LimitedUntil(DateTime<Utc>),
}

/// The start of the minute following `now`, which is when a per-minute limit
/// resets.
fn next_minute(now: DateTime<Utc>) -> DateTime<Utc> {
    let next = now + Duration::minutes(1);

    // Truncation only fails for timestamps outside the nanosecond range.
    next.duration_trunc(Duration::minutes(1)).unwrap_or(next)
}

#[derive(Serialize)]
pub struct RateLimitResponse {
    pub message: Option<String>,
}

impl From<RateLimitResult> for RateLimitResponse {
    fn from(result: RateLimitResult) -> Self {
        match result {
            RateLimitResult::LimitedUntil(_time) => Self {
                message: Some("Too many attempts. Please try again later.".to_string()),
            },
            RateLimitResult::NotLimited => Self { message: None },
        }
    }
}

impl IntoResponse for RateLimitResult {
    fn into_response(self) -> Response {
        if let Self::LimitedUntil(_time) = self {
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(RateLimitResponse::from(self)),
            )
                .into_response()
        } else {
            // A `RateLimitResult` will typically only be converted to a
            // response in a failure scenario, but if a non-limited result is
            // converted, we just respond with a simple success status code.
            StatusCode::OK.into_response()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn enforce_rejects_with_429_once_limited() {
        let limiter = MemoryRateLimiter::new();

        assert!(enforce(&limiter, "signup_10.0.0.1", 1).is_ok());

        let response = enforce(&limiter, "signup_10.0.0.1", 1)
            .unwrap_err()
            .into_response();
        assert_eq!(StatusCode::TOO_MANY_REQUESTS, response.status());
    }
}
