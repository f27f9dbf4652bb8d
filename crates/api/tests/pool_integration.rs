//! Integration tests for the survey link and gift card pools.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    action_request, complete_survey, create_test_app, get_request, id_of, json_request,
    register_participant, send, send_gift_card, test_config, upload_gift_cards, upload_links,
    ADMIN,
};
use serde_json::json;

#[tokio::test]
async fn test_link_upload_reports_row_errors() {
    let app = create_test_app(test_config());

    let content = "# survey wave 1\n\
                   https://survey.example.org/s/1\n\
                   \n\
                   not-a-url\n\
                   https://survey.example.org/s/1\n\
                   https://survey.example.org/s/2\n";
    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/v1/links/upload", json!({ "content": content })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_rows"], 4);
    assert_eq!(body["successful_uploads"], 2);
    assert_eq!(body["failed_uploads"], 2);

    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors[0]["line"], 4);
    assert_eq!(errors[0]["reason"], "invalid_format");
    assert_eq!(errors[1]["line"], 5);
    assert_eq!(errors[1]["reason"], "duplicate");

    let (_, body) = send(&app, get_request("/api/v1/links/status")).await;
    assert_eq!(body, json!({ "total": 2, "available": 2, "assigned": 0 }));
}

#[tokio::test]
async fn test_link_add_and_list() {
    let app = create_test_app(test_config());

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/links",
            json!({ "long_url": "https://survey.example.org/s/abc", "batch_label": "Spring" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "AVAILABLE");
    assert_eq!(body["uploaded_by"], ADMIN);

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/links",
            json!({ "long_url": "https://survey.example.org/s/abc" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    upload_links(&app, &["https://survey.example.org/s/other"]).await;

    let (status, body) = send(&app, get_request("/api/v1/links?search=spring")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["long_url"], "https://survey.example.org/s/abc");

    let (_, body) = send(&app, get_request("/api/v1/links?status=ASSIGNED")).await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_gift_card_upload_normalizes_and_skips_header() {
    let app = create_test_app(test_config());

    let content = "card_code,value\n\
                   \"abcd-123456-wxyz\",25\n\
                   ABCD-123456-WXYZ,25\n\
                   BAD-CODE,25\n\
                   EFGH-654321-STUV,25\n";
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/gift-cards/upload",
            json!({ "content": content, "card_type": "VISA", "card_value_cents": 2500 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_rows"], 4);
    assert_eq!(body["successful_uploads"], 2);
    assert_eq!(body["failed_uploads"], 2);
    assert_eq!(
        body["errors"][0]["message"],
        "Line 3: Duplicate code: ABCD-123456-WXYZ"
    );
    assert_eq!(
        body["errors"][1]["message"],
        "Line 4: Invalid code format: BAD-CODE. Expected format: XXXX-XXXXXX-XXXX"
    );

    let (_, body) = send(&app, get_request("/api/v1/gift-cards?search=abcd")).await;
    let card = &body["data"][0];
    assert_eq!(card["card_code"], "ABCD-123456-WXYZ");
    assert_eq!(card["card_type"], "VISA");
    assert_eq!(card["card_value_cents"], 2500);
    assert_eq!(card["redemption_url"], "https://www.amazon.com/gc/redeem");
}

#[tokio::test]
async fn test_gift_card_upload_over_limit_rejected() {
    let mut config = test_config();
    config.allocation.max_upload_lines = 2;
    let app = create_test_app(config);

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/gift-cards/upload",
            json!({ "content": "AAAA-111111-AAAA\nBBBB-222222-BBBB\nCCCC-333333-CCCC" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (_, body) = send(&app, get_request("/api/v1/gift-cards/status")).await;
    assert_eq!(body["total_cards"], 0);
}

#[tokio::test]
async fn test_gift_card_code_edit_and_retire() {
    let app = create_test_app(test_config());

    let (status, card) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/gift-cards",
            json!({ "card_code": "abcd-123456-wxyz", "card_value_cents": 1000 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(card["card_code"], "ABCD-123456-WXYZ");
    let card_id = id_of(&card);

    upload_gift_cards(&app, &["EFGH-654321-STUV"]).await;

    let (status, _) = send(
        &app,
        json_request(
            Method::PUT,
            &format!("/api/v1/gift-cards/{}", card_id),
            json!({ "card_code": "EFGH-654321-STUV" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        json_request(
            Method::PUT,
            &format!("/api/v1/gift-cards/{}", card_id),
            json!({ "card_code": "nope" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            &format!("/api/v1/gift-cards/{}", card_id),
            json!({ "card_code": "zzzz-999999-zzzz" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["card_code"], "ZZZZ-999999-ZZZZ");

    let (status, body) = send(
        &app,
        action_request(Method::POST, &format!("/api/v1/gift-cards/{}/expire", card_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "EXPIRED");

    let (status, _) = send(
        &app,
        action_request(Method::POST, &format!("/api/v1/gift-cards/{}/invalidate", card_id)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(&app, get_request("/api/v1/gift-cards/status")).await;
    assert_eq!(
        body,
        json!({
            "total_cards": 2,
            "available_cards": 1,
            "assigned_cards": 0,
            "expired_cards": 1,
            "invalid_cards": 0
        })
    );
}

#[tokio::test]
async fn test_assigned_items_cannot_be_deleted_or_edited() {
    let app = create_test_app(test_config());

    upload_links(&app, &["https://survey.example.org/s/1"]).await;
    upload_gift_cards(&app, &["ABCD-123456-WXYZ"]).await;

    let participant_id = register_participant(&app).await;
    complete_survey(&app, participant_id).await;
    let (status, claim) = send_gift_card(&app, participant_id).await;
    assert_eq!(status, StatusCode::CREATED);

    let link_id = {
        let (_, body) = send(&app, get_request("/api/v1/links")).await;
        body["data"][0]["id"].as_str().unwrap().to_string()
    };
    let card_id = claim["card"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        action_request(Method::DELETE, &format!("/api/v1/links/{}", link_id)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        action_request(Method::DELETE, &format!("/api/v1/gift-cards/{}", card_id)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        json_request(
            Method::PUT,
            &format!("/api/v1/gift-cards/{}", card_id),
            json!({ "card_code": "ZZZZ-999999-ZZZZ" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_available_items() {
    let app = create_test_app(test_config());

    let (_, link) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/links",
            json!({ "long_url": "https://survey.example.org/s/gone" }),
        ),
    )
    .await;
    let (status, _) = send(
        &app,
        action_request(Method::DELETE, &format!("/api/v1/links/{}", id_of(&link))),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, get_request("/api/v1/links/status")).await;
    assert_eq!(body["total"], 0);

    let (status, _) = send(
        &app,
        action_request(Method::DELETE, &format!("/api/v1/links/{}", uuid::Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
