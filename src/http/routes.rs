use axum::extract::DefaultBodyLimit;
use axum::{routing::delete, routing::get, routing::patch, routing::post, routing::put, Router};

use crate::http::handlers;
use crate::AppState;

/// Headroom above the image limit for the text fields of a post form.
const FORM_FIELDS_ALLOWANCE: usize = 1024 * 1024;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new().route("/auth/login", post(handlers::login))
}

pub fn feedback() -> Router<AppState> {
    Router::new()
        .route("/feedback", post(handlers::create_feedback))
        .route("/feedback", get(handlers::list_all_feedback))
        .route("/feedback/my-feedback", get(handlers::list_my_feedback))
        .route("/feedback/stats", get(handlers::feedback_stats))
        .route("/feedback/:id", put(handlers::update_feedback))
        .route("/feedback/:id", delete(handlers::delete_feedback))
        .route("/feedback/admin/:id", delete(handlers::admin_delete_feedback))
}

pub fn blog_posts(image_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/blog-posts", get(handlers::list_blog_posts))
        .route("/blog-posts", post(handlers::create_blog_post))
        .route("/blog-posts/stats", get(handlers::blog_stats))
        .route("/blog-posts/:id", get(handlers::get_blog_post))
        .route("/blog-posts/:id", put(handlers::update_blog_post))
        .route("/blog-posts/:id", delete(handlers::delete_blog_post))
        .layer(DefaultBodyLimit::max(
            image_max_bytes.saturating_add(FORM_FIELDS_ALLOWANCE),
        ))
}

pub fn blog_interactions() -> Router<AppState> {
    Router::new()
        .route(
            "/blog-interactions/:post_id/comments",
            get(handlers::list_comments),
        )
        .route(
            "/blog-interactions/:post_id/comments",
            post(handlers::add_comment),
        )
        .route(
            "/blog-interactions/comments/:id",
            patch(handlers::moderate_comment),
        )
        .route(
            "/blog-interactions/comments/:id",
            delete(handlers::delete_comment),
        )
        .route("/blog-interactions/:post_id/rating", post(handlers::rate_post))
        .route("/blog-interactions/:post_id/like", post(handlers::like_post))
        .route("/blog-interactions/:post_id/like", delete(handlers::unlike_post))
}

pub fn support_tickets() -> Router<AppState> {
    Router::new()
        .route("/support-tickets", post(handlers::create_ticket))
        .route("/support-tickets", get(handlers::list_tickets))
        .route("/support-tickets/my-tickets", get(handlers::list_my_tickets))
        .route(
            "/support-tickets/:id/status",
            patch(handlers::update_ticket_status),
        )
}
