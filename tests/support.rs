//! Support Ticket Tests

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn create_ticket_defaults_to_open_medium() {
    let app = app().await;
    let user = app.create_user("ticket_create").await;

    let resp = app
        .post_json(
            "/api/support-tickets",
            json!({
                "subject": "Tent pole snapped",
                "category": "equipment",
                "description": "Second night, mid-storm.",
            }),
            user.token(),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let ticket = &resp.json()["ticket"];
    assert_eq!(ticket["status"], "open");
    assert_eq!(ticket["priority"], "medium");
    assert_eq!(ticket["userId"], user.id.to_string());
}

#[tokio::test]
async fn create_ticket_validates_input() {
    let app = app().await;
    let user = app.create_user("ticket_invalid").await;

    let long_subject = "s".repeat(201);
    let cases = [
        json!({ "subject": "", "category": "billing", "description": "d" }),
        json!({ "subject": long_subject, "category": "billing", "description": "d" }),
        json!({ "subject": "s", "category": "refunds", "description": "d" }),
        json!({ "subject": "s", "category": "billing", "priority": "asap", "description": "d" }),
        json!({ "subject": "s", "category": "billing", "description": "   " }),
    ];
    for body in cases {
        let resp = app
            .post_json("/api/support-tickets", body.clone(), user.token())
            .await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{}", body);
    }
}

#[tokio::test]
async fn customers_see_only_their_tickets() {
    let app = app().await;
    let user = app.create_user("ticket_mine").await;
    let other = app.create_user("ticket_mine_other").await;

    for (owner, subject) in [(&user, "Mine"), (&other, "Theirs")] {
        let resp = app
            .post_json(
                "/api/support-tickets",
                json!({ "subject": subject, "category": "general", "description": "d" }),
                owner.token(),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED);
    }

    let body = app.get("/api/support-tickets/my-tickets", user.token()).await.json();
    let tickets = body["tickets"].as_array().unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0]["subject"], "Mine");

    let resp = app.get("/api/support-tickets", user.token()).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_filters_and_updates_status() {
    let app = app().await;
    let user = app.create_user("ticket_admin_flow").await;
    let admin = app.create_admin("ticket_admin").await;

    let created = app
        .post_json(
            "/api/support-tickets",
            json!({
                "subject": "Double charged",
                "category": "billing",
                "priority": "urgent",
                "description": "Two identical charges.",
            }),
            user.token(),
        )
        .await
        .json();
    let ticket_id = created["ticket"]["id"].as_str().unwrap().to_string();

    let body = app
        .get(
            "/api/support-tickets?priority=urgent&category=billing&status=all",
            admin.token(),
        )
        .await
        .json();
    assert!(body["tickets"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t["id"] == ticket_id.as_str()));
    assert!(body["pagination"]["total"].as_i64().unwrap() >= 1);

    let resp = app
        .patch_json(
            &format!("/api/support-tickets/{}/status", ticket_id),
            json!({ "status": "in_progress" }),
            admin.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["ticket"]["status"], "in_progress");

    let resp = app
        .patch_json(
            &format!("/api/support-tickets/{}/status", ticket_id),
            json!({ "status": "escalated" }),
            admin.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .patch_json(
            &format!("/api/support-tickets/{}/status", Uuid::new_v4()),
            json!({ "status": "closed" }),
            admin.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .patch_json(
            &format!("/api/support-tickets/{}/status", ticket_id),
            json!({ "status": "closed" }),
            user.token(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}
