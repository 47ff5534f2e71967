use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use expense_tracker_api::{
    authentication::{Session, SessionKeys},
    database::PostgresConnection,
    email::{
        clients::{ConsoleMailer, FromAddress},
        Mailer, Templates,
    },
    rate_limit::MemoryRateLimiter,
    server::{app_router, build_state, Dependencies},
};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &[u8] = b"route-test-secret";

/// Routes backed by a pool that never connects. Only requests that are
/// answered before touching the database are usable here.
fn app() -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/expense_tracker_unused")
        .unwrap();

    let mailer = Mailer::new(
        Arc::new(ConsoleMailer::new(FromAddress {
            name: "Expense Tracker".to_owned(),
            address: "noreply@example.com".to_owned(),
        })),
        Templates::new("http://localhost:3000").unwrap(),
    );

    let state = build_state(Dependencies {
        db: PostgresConnection::new(pool),
        mailer,
        session_keys: session_keys(),
        rate_limiter: Arc::new(MemoryRateLimiter::new()),
        chat_client: None,
    });

    app_router(state, &["https://app.example.com".to_owned()]).unwrap()
}

fn session_keys() -> SessionKeys {
    SessionKeys::new(SECRET, chrono::Duration::days(1))
}

fn bearer() -> String {
    let (token, _) = session_keys()
        .issue(&Session::new_for_user(Uuid::new_v4()))
        .unwrap();

    format!("Bearer {}", token)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();

    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn protected_route_requires_token() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/accounts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(StatusCode::UNAUTHORIZED, response.status());
}

#[tokio::test]
async fn protected_route_rejects_forged_token() {
    let (forged, _) = SessionKeys::new(b"someone-else", chrono::Duration::days(1))
        .issue(&Session::new_for_user(Uuid::new_v4()))
        .unwrap();

    let response = app()
        .oneshot(
            Request::builder()
                .uri("/accounts")
                .header(header::AUTHORIZATION, format!("Bearer {}", forged))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(StatusCode::UNAUTHORIZED, response.status());
}

#[tokio::test]
async fn interest_calculator() {
    let request = json!({
        "principal": 10000,
        "rate": 5.0,
        "years": 2.0,
        "type": "simple",
    });

    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/calculators/interest")
                .header(header::AUTHORIZATION, bearer())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(request.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(
        json!({ "interest": 1000, "total": 11000 }),
        json_body(response).await
    );
}

#[tokio::test]
async fn interest_calculator_rejects_negative_principal() {
    let request = json!({
        "principal": -1,
        "rate": 5.0,
        "years": 2.0,
        "type": "compound",
    });

    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/calculators/interest")
                .header(header::AUTHORIZATION, bearer())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(request.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(StatusCode::BAD_REQUEST, response.status());
}

#[tokio::test]
async fn chat_without_provider_is_unavailable() {
    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/ai/chat")
                .header(header::AUTHORIZATION, bearer())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "message": "How am I doing?" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(StatusCode::SERVICE_UNAVAILABLE, response.status());
}

#[tokio::test]
async fn cors_preflight_for_allowed_origin() {
    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/accounts")
                .header(header::ORIGIN, "https://app.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(
        Some("https://app.example.com"),
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok())
    );
}
