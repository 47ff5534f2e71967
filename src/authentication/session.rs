use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

/// An authenticated session for a user.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Session {
    id: Uuid,
    user_id: Uuid,
}

impl Session {
    /// Create a new session for a specific user.
    ///
    /// # Example
    ///
    /// ```
    /// # use uuid::Uuid;
    /// # use expense_tracker_api::authentication::Session;
    ///
    /// let user_id = Uuid::new_v4();
    /// let session = Session::new_for_user(user_id);
    ///
    /// assert_eq!(user_id, session.user_id());
    /// ```
    pub fn new_for_user(user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct Claims {
    /// Session ID.
    sid: Uuid,
    /// User ID.
    sub: Uuid,
    iat: i64,
    exp: i64,
}

/// Signs and verifies session tokens.
#[derive(Clone)]
pub struct SessionKeys(Arc<SessionKeysInner>);

struct SessionKeysInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl SessionKeys {
    /// # Arguments
    ///
    /// * `secret` - Secret used to sign tokens. Changing it invalidates every
    ///   outstanding session.
    /// * `lifetime` - How long an issued token stays valid.
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self(Arc::new(SessionKeysInner {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            lifetime,
        }))
    }

    /// Sign a session into a bearer token.
    ///
    /// # Returns
    ///
    /// The token and the instant it expires.
    pub fn issue(&self, session: &Session) -> Result<(String, DateTime<Utc>)> {
        self.issue_at(session, Utc::now())
    }

    fn issue_at(&self, session: &Session, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>)> {
        let expires_at = now + self.0.lifetime;
        let claims = Claims {
            sid: session.id,
            sub: session.user_id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.0.encoding)?;

        Ok((token, expires_at))
    }

    /// Verify a bearer token and recover the session it carries.
    pub fn verify(&self, token: &str) -> Result<Session, SessionError> {
        let data = decode::<Claims>(token, &self.0.decoding, &self.0.validation).map_err(
            |error| {
                debug!(?error, "Invalid authentication token received.");

                SessionError::Invalid
            },
        )?;

        Ok(Session {
            id: data.claims.sid,
            user_id: data.claims.sub,
        })
    }

    /// The expiry instant encoded in a token, if the token is valid.
    pub fn expires_at(&self, token: &str) -> Option<DateTime<Utc>> {
        decode::<Claims>(token, &self.0.decoding, &self.0.validation)
            .ok()
            .and_then(|data| Utc.timestamp_opt(data.claims.exp, 0).single())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    SessionKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = SessionError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                debug!("Cannot extract session due to missing authentication token.");

                SessionError::Missing
            })?;

        let session = keys.verify(token)?;
        debug!(user_id = %session.user_id(), session_id = %session.id(), "Parsed bearer session.");

        Ok(session)
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum SessionError {
    Invalid,
    Missing,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> axum::response::Response {
        let message = match self {
            Self::Invalid => "Invalid authentication token.",
            Self::Missing => "No authentication token provided.",
        };

        (StatusCode::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::new(b"test-secret-test-secret", Duration::days(7))
    }

    #[test]
    fn issued_token_round_trips_session() {
        let keys = keys();
        let session = Session::new_for_user(Uuid::new_v4());

        let (token, expires_at) = keys.issue(&session).unwrap();

        assert_eq!(session, keys.verify(&token).unwrap());
        assert_eq!(Some(expires_at.timestamp()), keys.expires_at(&token).map(|t| t.timestamp()));
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let session = Session::new_for_user(Uuid::new_v4());
        let (token, _) = SessionKeys::new(b"another-secret", Duration::days(7))
            .issue(&session)
            .unwrap();

        assert_eq!(SessionError::Invalid, keys().verify(&token).unwrap_err());
    }

    #[test]
    fn expired_token_is_invalid() {
        let keys = keys();
        let session = Session::new_for_user(Uuid::new_v4());
        let (token, _) = keys
            .issue_at(&session, Utc::now() - Duration::days(8))
            .unwrap();

        assert_eq!(SessionError::Invalid, keys.verify(&token).unwrap_err());
    }
}
