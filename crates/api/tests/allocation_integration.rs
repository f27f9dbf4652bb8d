//! Integration tests for link and gift card allocation and the assignment
//! ledger.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    action_request, complete_survey, create_test_app, get_request, json_request,
    register_participant, send, send_gift_card, test_config, upload_gift_cards, upload_links,
    ADMIN,
};
use serde_json::json;

#[tokio::test]
async fn test_invitation_claims_link_once() {
    let app = create_test_app(test_config());
    upload_links(
        &app,
        &["https://survey.example.org/s/1", "https://survey.example.org/s/2"],
    )
    .await;
    let participant_id = register_participant(&app).await;
    let uri = format!("/api/v1/participants/{}/invitation", participant_id);

    let (status, first) = send(&app, action_request(Method::POST, &uri)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["newly_claimed"], true);
    assert_eq!(first["link"]["status"], "ASSIGNED");
    assert_eq!(first["link"]["long_url"], "https://survey.example.org/s/1");
    assert_eq!(first["invitation"]["message_status"], "sent");
    assert!(first["invitation"]["sent_at"].is_string());

    let (status, second) = send(&app, action_request(Method::POST, &uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["newly_claimed"], false);
    assert_eq!(second["link"]["id"], first["link"]["id"]);
    assert_eq!(second["invitation"]["id"], first["invitation"]["id"]);

    let (_, counts) = send(&app, get_request("/api/v1/links/status")).await;
    assert_eq!(counts, json!({ "total": 2, "available": 1, "assigned": 1 }));
}

#[tokio::test]
async fn test_empty_link_pool_is_reported() {
    let app = create_test_app(test_config());
    let participant_id = register_participant(&app).await;

    let (status, body) = send(
        &app,
        action_request(
            Method::POST,
            &format!("/api/v1/participants/{}/invitation", participant_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "no_item_available");
    assert_eq!(body["message"], "No survey link available in pool");
}

#[tokio::test]
async fn test_gift_card_requires_completed_survey() {
    let app = create_test_app(test_config());
    upload_links(&app, &["https://survey.example.org/s/1"]).await;
    upload_gift_cards(&app, &["ABCD-123456-WXYZ"]).await;
    let participant_id = register_participant(&app).await;

    let (status, body) = send_gift_card(&app, participant_id).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "not_eligible");

    complete_survey(&app, participant_id).await;

    let (status, claim) = send_gift_card(&app, participant_id).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(claim["assignment"]["status"], "SENT");
    assert_eq!(claim["assignment"]["card_code"], "ABCD-123456-WXYZ");
    assert_eq!(claim["assignment"]["sent_by"], ADMIN);
    assert_eq!(claim["assignment"]["source"], "POOL");
    assert_eq!(claim["assignment"]["delivery_status"], "sent");
    assert_eq!(claim["card"]["status"], "ASSIGNED");
    assert_eq!(claim["card"]["assigned_assignment_id"], claim["assignment"]["id"]);
}

#[tokio::test]
async fn test_one_active_gift_card_per_participant() {
    let app = create_test_app(test_config());
    upload_links(&app, &["https://survey.example.org/s/1"]).await;
    upload_gift_cards(&app, &["ABCD-123456-WXYZ", "EFGH-654321-STUV"]).await;
    let participant_id = register_participant(&app).await;
    complete_survey(&app, participant_id).await;

    let (status, _) = send_gift_card(&app, participant_id).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send_gift_card(&app, participant_id).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "not_eligible");

    let (_, counts) = send(&app, get_request("/api/v1/gift-cards/status")).await;
    assert_eq!(counts["available_cards"], 1);
    assert_eq!(counts["assigned_cards"], 1);
}

#[tokio::test]
async fn test_email_delivery_needs_email() {
    let app = create_test_app(test_config());
    upload_links(&app, &["https://survey.example.org/s/1"]).await;
    upload_gift_cards(&app, &["ABCD-123456-WXYZ"]).await;

    let (_, participant) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/participants",
            json!({ "phone": common::unique_phone() }),
        ),
    )
    .await;
    let participant_id = common::id_of(&participant);
    complete_survey(&app, participant_id).await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/participants/{}/gift-card", participant_id),
            json!({ "delivery_method": "EMAIL" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (_, counts) = send(&app, get_request("/api/v1/gift-cards/status")).await;
    assert_eq!(counts["available_cards"], 1);
}

#[tokio::test]
async fn test_empty_gift_card_pool_is_reported() {
    let app = create_test_app(test_config());
    upload_links(&app, &["https://survey.example.org/s/1"]).await;
    let participant_id = register_participant(&app).await;
    complete_survey(&app, participant_id).await;

    let (status, body) = send_gift_card(&app, participant_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "no_item_available");
    assert_eq!(body["message"], "No gift card available in pool");
}

#[tokio::test]
async fn test_batch_send_reports_each_participant() {
    let app = create_test_app(test_config());
    upload_links(
        &app,
        &[
            "https://survey.example.org/s/1",
            "https://survey.example.org/s/2",
            "https://survey.example.org/s/3",
        ],
    )
    .await;
    upload_gift_cards(&app, &["ABCD-123456-WXYZ"]).await;

    let first = register_participant(&app).await;
    let second = register_participant(&app).await;
    let not_completed = register_participant(&app).await;
    complete_survey(&app, first).await;
    complete_survey(&app, second).await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/gift-cards/batch-send",
            json!({ "participant_ids": [first, second, not_completed], "notes": "wave 1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_requested"], 3);
    assert_eq!(body["successful"], 1);
    assert_eq!(body["failed"], 2);
    assert_eq!(body["successes"][0]["participant_id"], first.to_string());
    assert_eq!(body["successes"][0]["card_code"], "ABCD-123456-WXYZ");
    assert_eq!(body["failures"][0]["participant_id"], second.to_string());
    assert_eq!(body["failures"][0]["reason"], "No gift card available in pool");
    assert_eq!(body["failures"][1]["participant_id"], not_completed.to_string());
}

#[tokio::test]
async fn test_batch_send_limits() {
    let mut config = test_config();
    config.allocation.max_batch_size = 2;
    let app = create_test_app(config);

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/gift-cards/batch-send",
            json!({ "participant_ids": [] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "participant_ids");

    let ids: Vec<_> = (0..3).map(|_| uuid::Uuid::new_v4()).collect();
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/gift-cards/batch-send",
            json!({ "participant_ids": ids }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "A batch can include at most 2 participants");
}

#[tokio::test]
async fn test_ledger_moves_forward_only() {
    let app = create_test_app(test_config());
    upload_links(&app, &["https://survey.example.org/s/1"]).await;
    upload_gift_cards(&app, &["ABCD-123456-WXYZ"]).await;
    let participant_id = register_participant(&app).await;
    complete_survey(&app, participant_id).await;
    let (_, claim) = send_gift_card(&app, participant_id).await;
    let assignment_id = claim["assignment"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        action_request(
            Method::POST,
            &format!("/api/v1/assignments/{}/redeemed", assignment_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "REDEEMED");
    assert!(body["redeemed_at"].is_string());

    let (status, body) = send(
        &app,
        action_request(
            Method::POST,
            &format!("/api/v1/assignments/{}/delivered", assignment_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["message"],
        "Cannot change gift card status from REDEEMED to DELIVERED"
    );

    // Re-applying the current status is accepted.
    let (status, _) = send(
        &app,
        action_request(
            Method::POST,
            &format!("/api/v1/assignments/{}/redeemed", assignment_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_resend_notes_and_assignment_listing() {
    let app = create_test_app(test_config());
    upload_links(&app, &["https://survey.example.org/s/1"]).await;
    upload_gift_cards(&app, &["ABCD-123456-WXYZ", "EFGH-654321-STUV"]).await;
    let participant_id = register_participant(&app).await;
    complete_survey(&app, participant_id).await;
    let (_, claim) = send_gift_card(&app, participant_id).await;
    let assignment_id = claim["assignment"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        action_request(
            Method::POST,
            &format!("/api/v1/assignments/{}/resend", assignment_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["card_code"], claim["assignment"]["card_code"]);

    let (_, counts) = send(&app, get_request("/api/v1/gift-cards/status")).await;
    assert_eq!(counts["assigned_cards"], 1);

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            &format!("/api/v1/assignments/{}/notes", assignment_id),
            json!({ "notes": "  called participant  " }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notes"], "called participant");

    let (status, body) = send(
        &app,
        get_request(&format!("/api/v1/participants/{}/assignments", participant_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let assignments = body.as_array().unwrap();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0]["id"], assignment_id.as_str());
}

#[tokio::test]
async fn test_distribution_log_records_each_change() {
    let app = create_test_app(test_config());
    upload_links(&app, &["https://survey.example.org/s/1"]).await;
    upload_gift_cards(&app, &["ABCD-123456-WXYZ"]).await;
    let participant_id = register_participant(&app).await;
    complete_survey(&app, participant_id).await;
    let (_, claim) = send_gift_card(&app, participant_id).await;
    let assignment_id = claim["assignment"]["id"].as_str().unwrap().to_string();

    send(
        &app,
        action_request(
            Method::POST,
            &format!("/api/v1/assignments/{}/resend", assignment_id),
        ),
    )
    .await;
    send(
        &app,
        json_request(
            Method::PUT,
            &format!("/api/v1/assignments/{}/notes", assignment_id),
            json!({ "notes": "left voicemail" }),
        ),
    )
    .await;

    let (status, body) = send(
        &app,
        get_request(&format!("/api/v1/assignments/{}/logs", assignment_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, ["CREATED", "DISPATCHED", "RESENT", "NOTES_UPDATED"]);
    assert_eq!(body[3]["acted_by"], ADMIN);
    assert_eq!(body[3]["detail"], "left voicemail");

    let (status, _) = send(
        &app,
        get_request(&format!("/api/v1/assignments/{}/logs", uuid::Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_dispatcher_status_reports_are_stored() {
    let app = create_test_app(test_config());
    upload_links(&app, &["https://survey.example.org/s/1"]).await;
    upload_gift_cards(&app, &["ABCD-123456-WXYZ"]).await;
    let participant_id = register_participant(&app).await;
    let invitation_id = complete_survey(&app, participant_id).await;
    let (_, claim) = send_gift_card(&app, participant_id).await;
    let assignment_id = claim["assignment"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/assignments/{}/delivery-status", assignment_id),
            json!({ "status": "failed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivery_status"], "failed");
    // Reports never move the ledger.
    assert_eq!(body["status"], "SENT");

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/assignments/{}/delivery-status", assignment_id),
            json!({ "status": "bounced" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (_, log) = send(
        &app,
        get_request(&format!("/api/v1/assignments/{}/logs", assignment_id)),
    )
    .await;
    let last = log.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["action"], "DELIVERY_REPORTED");
    assert_eq!(last["detail"], "failed");
    assert_eq!(last["acted_by"], "DISPATCHER");

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/invitations/{}/message-status", invitation_id),
            json!({ "status": "delivered" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message_status"], "delivered");

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/invitations/{}/message-status", uuid::Uuid::new_v4()),
            json!({ "status": "sent" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_eligible_lists_completed_participants_without_card() {
    let app = create_test_app(test_config());
    upload_links(
        &app,
        &[
            "https://survey.example.org/s/1",
            "https://survey.example.org/s/2",
            "https://survey.example.org/s/3",
        ],
    )
    .await;
    upload_gift_cards(&app, &["ABCD-123456-WXYZ"]).await;

    let served = register_participant(&app).await;
    complete_survey(&app, served).await;
    let (status, _) = send_gift_card(&app, served).await;
    assert_eq!(status, StatusCode::CREATED);

    let waiting = register_participant(&app).await;
    let invitation_id = complete_survey(&app, waiting).await;

    // Invited but not completed.
    let pending = register_participant(&app).await;
    send(
        &app,
        action_request(
            Method::POST,
            &format!("/api/v1/participants/{}/invitation", pending),
        ),
    )
    .await;

    let (status, body) = send(&app, get_request("/api/v1/gift-cards/eligible")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["participant_id"], waiting.to_string());
    assert_eq!(body["data"][0]["invitation_id"], invitation_id.to_string());
}

#[tokio::test]
async fn test_assignment_search_matches_card_code() {
    let app = create_test_app(test_config());
    upload_links(
        &app,
        &["https://survey.example.org/s/1", "https://survey.example.org/s/2"],
    )
    .await;
    upload_gift_cards(&app, &["ABCD-123456-WXYZ", "EFGH-654321-STUV"]).await;
    for _ in 0..2 {
        let participant_id = register_participant(&app).await;
        complete_survey(&app, participant_id).await;
        let (status, _) = send_gift_card(&app, participant_id).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, get_request("/api/v1/assignments?search=efgh-6543")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["card_code"], "EFGH-654321-STUV");

    let (_, body) = send(&app, get_request("/api/v1/assignments?status=SENT&per_page=1")).await;
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_uncomplete_warns_when_card_is_out() {
    let app = create_test_app(test_config());
    upload_links(&app, &["https://survey.example.org/s/1"]).await;
    upload_gift_cards(&app, &["ABCD-123456-WXYZ"]).await;
    let participant_id = register_participant(&app).await;
    let invitation_id = complete_survey(&app, participant_id).await;

    let (status, first) = send(
        &app,
        action_request(
            Method::POST,
            &format!("/api/v1/invitations/{}/complete", invitation_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(first["completed_at"].is_string());

    send_gift_card(&app, participant_id).await;

    let (status, body) = send(
        &app,
        action_request(
            Method::POST,
            &format!("/api/v1/invitations/{}/uncomplete", invitation_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["invitation"]["completed_at"].is_null());
    assert!(body["warning"].as_str().unwrap().contains("not revoked"));
}
