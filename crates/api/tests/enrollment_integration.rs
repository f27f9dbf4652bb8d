//! Integration tests for the enrollment gate and participant registration.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    create_test_app, get_request, json_request, send, test_config, unique_phone, ADMIN,
};
use serde_json::json;

#[tokio::test]
async fn test_default_enrollment_is_unlimited() {
    let app = create_test_app(test_config());

    let (status, body) = send(&app, get_request("/api/v1/enrollment")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "UNLIMITED");
    assert_eq!(body["remaining_spots"], -1);
    assert_eq!(body["current_count"], 0);
    assert_eq!(body["is_enrollment_active"], true);
    assert_eq!(body["updated_by"], "SYSTEM");

    let (status, body) = send(&app, get_request("/api/v1/enrollment/check")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "ALLOWED");
    assert_eq!(body["allowed"], true);
}

#[tokio::test]
async fn test_update_requires_acted_by() {
    let app = create_test_app(test_config());

    let request = axum::http::Request::builder()
        .method(Method::PUT)
        .uri("/api/v1/enrollment")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            json!({ "max_participants": 10, "is_enrollment_active": true }).to_string(),
        ))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_limit_closes_enrollment() {
    let app = create_test_app(test_config());

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            "/api/v1/enrollment",
            json!({ "max_participants": 1, "is_enrollment_active": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OPEN");
    assert_eq!(body["remaining_spots"], 1);
    assert_eq!(body["updated_by"], ADMIN);

    let (status, _) = send(
        &app,
        json_request(Method::POST, "/api/v1/participants", json!({ "phone": unique_phone() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/v1/participants", json!({ "phone": unique_phone() })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "enrollment_closed");
    assert_eq!(body["message"], "Enrollment is full");

    let (_, body) = send(&app, get_request("/api/v1/enrollment")).await;
    assert_eq!(body["status"], "FULL");
    assert_eq!(body["current_count"], 1);
    assert_eq!(body["remaining_spots"], 0);
}

#[tokio::test]
async fn test_disabled_enrollment_rejects_registration() {
    let app = create_test_app(test_config());

    send(
        &app,
        json_request(
            Method::PUT,
            "/api/v1/enrollment",
            json!({ "max_participants": null, "is_enrollment_active": false }),
        ),
    )
    .await;

    let (_, body) = send(&app, get_request("/api/v1/enrollment/check")).await;
    assert_eq!(body["decision"], "DISABLED");

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/v1/participants", json!({ "phone": unique_phone() })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Enrollment is disabled");
}

#[tokio::test]
async fn test_limit_below_current_count_rejected() {
    let app = create_test_app(test_config());

    for _ in 0..3 {
        let (status, _) = send(
            &app,
            json_request(Method::POST, "/api/v1/participants", json!({ "phone": unique_phone() })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            "/api/v1/enrollment",
            json!({ "max_participants": 2, "is_enrollment_active": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "config_rejected");

    let (_, body) = send(&app, get_request("/api/v1/enrollment")).await;
    assert!(body["max_participants"].is_null());
    assert_eq!(body["current_count"], 3);
}

#[tokio::test]
async fn test_negative_limit_is_validation_error() {
    let app = create_test_app(test_config());

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            "/api/v1/enrollment",
            json!({ "max_participants": -5, "is_enrollment_active": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "max_participants");
}

#[tokio::test]
async fn test_registration_validates_and_rejects_duplicate_phone() {
    let app = create_test_app(test_config());

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/v1/participants", json!({ "phone": "555-1234" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "phone");

    let phone = unique_phone();
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/participants",
            json!({ "phone": phone, "email": "  Person@Example.org " }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "person@example.org");

    let (status, _) = send(
        &app,
        json_request(Method::POST, "/api/v1/participants", json!({ "phone": phone })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(&app, get_request("/api/v1/enrollment")).await;
    assert_eq!(body["current_count"], 1);
}

#[tokio::test]
async fn test_participant_listing_and_lookup() {
    let app = create_test_app(test_config());

    let id = common::register_participant(&app).await;
    common::register_participant(&app).await;

    let (status, body) = send(&app, get_request("/api/v1/participants?per_page=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["per_page"], 1);

    let (status, body) = send(&app, get_request(&format!("/api/v1/participants/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.to_string());

    let (status, body) = send(
        &app,
        get_request(&format!("/api/v1/participants/{}", uuid::Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}
