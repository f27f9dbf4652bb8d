//! Common test utilities for integration tests.
//!
//! The app under test runs on the in-memory allocation store, so these tests
//! need no database.

// Helpers are shared by several test binaries; not every binary uses all of them.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use domain::store::InMemoryStore;
use fake::{faker::internet::en::SafeEmail, Fake};
use serde_json::{json, Value};
use survey_rewards_api::{
    app::create_app_with_store,
    config::{
        AllocationConfig, Config, DatabaseConfig, LoggingConfig, SecurityConfig, ServerConfig,
        StoreBackend,
    },
};
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN: &str = "admin@example.org";

/// Test configuration on the in-memory store.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        },
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 10,
            idle_timeout_secs: 600,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig::default(),
        allocation: AllocationConfig {
            store: StoreBackend::Memory,
            ..Default::default()
        },
    }
}

/// Create a test application router backed by a fresh in-memory store.
pub fn create_test_app(config: Config) -> Router {
    create_app_with_store(config, Arc::new(InMemoryStore::new()), None)
}

pub async fn parse_response_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

/// JSON request carrying the `X-Acted-By` header.
pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Acted-By", ADMIN)
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Body-less mutating request carrying the `X-Acted-By` header.
pub fn action_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Acted-By", ADMIN)
        .body(Body::empty())
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Send a request and return status and parsed body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, parse_response_body(response).await)
}

/// Generate a unique E.164 phone number for testing.
pub fn unique_phone() -> String {
    let n = Uuid::new_v4().as_u128() % 10_000_000;
    format!("+1555{:07}", n)
}

pub fn id_of(body: &Value) -> Uuid {
    body["id"].as_str().unwrap().parse().unwrap()
}

pub async fn register_participant(app: &Router) -> Uuid {
    let email: String = SafeEmail().fake();
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/v1/participants",
            json!({ "phone": unique_phone(), "email": email }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    id_of(&body)
}

pub async fn upload_links(app: &Router, urls: &[&str]) -> Value {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/v1/links/upload",
            json!({ "content": urls.join("\n"), "batch_label": "test-batch" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "link upload failed: {}", body);
    body
}

pub async fn upload_gift_cards(app: &Router, codes: &[&str]) -> Value {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/v1/gift-cards/upload",
            json!({ "content": codes.join("\n"), "card_type": "AMAZON", "card_value_cents": 2500 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "gift card upload failed: {}", body);
    body
}

/// Claim a survey link for the participant and mark the survey completed.
/// Returns the invitation id.
pub async fn complete_survey(app: &Router, participant_id: Uuid) -> Uuid {
    let (status, body) = send(
        app,
        action_request(
            Method::POST,
            &format!("/api/v1/participants/{}/invitation", participant_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "invitation failed: {}", body);
    let invitation_id: Uuid = body["invitation"]["id"].as_str().unwrap().parse().unwrap();

    let (status, body) = send(
        app,
        action_request(
            Method::POST,
            &format!("/api/v1/invitations/{}/complete", invitation_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "complete failed: {}", body);
    invitation_id
}

/// Send a gift card to the participant. Returns the claim body.
pub async fn send_gift_card(app: &Router, participant_id: Uuid) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            Method::POST,
            &format!("/api/v1/participants/{}/gift-card", participant_id),
            json!({ "delivery_method": "SMS" }),
        ),
    )
    .await
}
