use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod extract;
mod handlers;
mod middleware;
mod routes;
mod validation;

pub use auth::{AdminUser, AuthUser};
pub use error::AppError;

/// Every API route lives under `/api`; the rate limiter wraps the nested
/// router so it classifies requests by their full path.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::feedback())
        .merge(routes::blog_posts(state.image_max_bytes))
        .merge(routes::blog_interactions())
        .merge(routes::support_tickets());

    Router::new()
        .merge(routes::health())
        .nest("/api", api)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit_middleware,
        ))
        .with_state(state)
}
