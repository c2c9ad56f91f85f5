//! Feedback Statistics Tests
//!
//! Kept to a single test so the aggregates see only the rows it creates.

mod common;

use axum::http::StatusCode;
use common::{app, feedback_body};
use serde_json::json;

#[tokio::test]
async fn stats_track_every_submission() {
    let app = app().await;
    let admin = app.create_admin("stats_admin").await;
    let user = app.create_user("stats_user").await;

    // ---- empty table ----
    let resp = app.get("/api/feedback/stats", admin.token()).await;
    assert_eq!(resp.status, StatusCode::OK);
    let stats = resp.json()["stats"].clone();
    assert_eq!(stats["totalFeedback"], 0);
    assert_eq!(stats["overallRating"], 0.0);
    assert_eq!(stats["ratingBreakdown"], json!([]));
    assert_eq!(stats["categoryBreakdown"], json!([]));
    assert_eq!(stats["recentFeedback"], 0);

    // ---- non-admins are turned away ----
    let resp = app.get("/api/feedback/stats", user.token()).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    // ---- a mix of ratings and categories ----
    app.create_feedback(&user, feedback_body("Boots", 5)).await;
    app.create_feedback(&user, feedback_body("Poles", 4)).await;
    app.create_feedback(
        &user,
        json!({ "subject": "Desk", "category": "staff", "rating": 4, "message": "Kind." }),
    )
    .await;
    app.create_feedback(
        &user,
        json!({ "subject": "Site", "category": "website", "rating": 1, "message": "Broken." }),
    )
    .await;

    let stats = app.get("/api/feedback/stats", admin.token()).await.json()["stats"].clone();
    assert_eq!(stats["totalFeedback"], 4);
    assert_eq!(stats["overallRating"].as_f64().unwrap(), 3.5);
    assert_eq!(stats["recentFeedback"], 4);
    assert_eq!(
        stats["ratingBreakdown"],
        json!([
            { "rating": 5, "count": 1 },
            { "rating": 4, "count": 2 },
            { "rating": 1, "count": 1 },
        ])
    );

    let breakdown_sum: i64 = stats["ratingBreakdown"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["count"].as_i64().unwrap())
        .sum();
    assert_eq!(breakdown_sum, stats["totalFeedback"].as_i64().unwrap());

    let categories = stats["categoryBreakdown"].as_array().unwrap();
    assert_eq!(categories[0]["category"], "equipment");
    assert_eq!(categories[0]["count"], 2);
    assert_eq!(categories[0]["averageRating"].as_f64().unwrap(), 4.5);
    // equal counts fall back to category name order
    assert_eq!(categories[1]["category"], "staff");
    assert_eq!(categories[2]["category"], "website");

    // ---- old feedback is not "recent" ----
    sqlx::query("UPDATE feedback SET created_at = now() - INTERVAL '8 days' WHERE subject = 'Site'")
        .execute(app.pool())
        .await
        .unwrap();
    let stats = app.get("/api/feedback/stats", admin.token()).await.json()["stats"].clone();
    assert_eq!(stats["recentFeedback"], 3);

    // ---- the "Great tent" scenario ----
    let camper = app.create_user("stats_camper").await;
    let before = stats["totalFeedback"].as_i64().unwrap();
    let id = app
        .create_feedback(
            &camper,
            json!({
                "subject": "Great tent",
                "category": "equipment",
                "rating": 5,
                "message": "Easy to pitch",
            }),
        )
        .await;

    let own = app.get("/api/feedback/my-feedback", camper.token()).await.json();
    let own = own["feedback"].as_array().unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0]["id"], id.to_string());
    assert_eq!(own[0]["subject"], "Great tent");
    assert_eq!(own[0]["isAnonymous"], false);

    let stats = app.get("/api/feedback/stats", admin.token()).await.json()["stats"].clone();
    assert_eq!(stats["totalFeedback"].as_i64().unwrap(), before + 1);
    assert_eq!(stats["overallRating"].as_f64().unwrap(), 19.0 / 5.0);

    // ---- figures stay consistent while submissions land ----
    let writes = futures::future::join_all(
        (1..=5).map(|rating| app.create_feedback(&camper, feedback_body("Busy weekend", rating))),
    );
    let reads = futures::future::join_all(
        (0..5).map(|_| app.get("/api/feedback/stats", admin.token())),
    );
    let (_, snapshots) = futures::future::join(writes, reads).await;

    for snapshot in snapshots {
        let stats = snapshot.json()["stats"].clone();
        let total = stats["totalFeedback"].as_i64().unwrap();
        let breakdown = stats["ratingBreakdown"].as_array().unwrap();
        let counted: i64 = breakdown
            .iter()
            .map(|entry| entry["count"].as_i64().unwrap())
            .sum();
        let rating_sum: i64 = breakdown
            .iter()
            .map(|entry| entry["rating"].as_i64().unwrap() * entry["count"].as_i64().unwrap())
            .sum();
        assert_eq!(counted, total);
        assert_eq!(
            stats["overallRating"].as_f64().unwrap(),
            rating_sum as f64 / total as f64
        );
    }

    let stats = app.get("/api/feedback/stats", admin.token()).await.json()["stats"].clone();
    assert_eq!(stats["totalFeedback"].as_i64().unwrap(), before + 6);
}
