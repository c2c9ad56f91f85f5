use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use crate::app::rate_limiter::RateLimiter;
use crate::config::rate_limits::LimitedAction;
use crate::http::{AppError, AuthUser};
use crate::AppState;

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    User,
    Ip,
}

/// Which quota a request counts against, if any.
fn classify(method: &Method, path: &str) -> Option<(LimitedAction, Subject)> {
    if method != Method::POST {
        return None;
    }
    let path = path.trim_end_matches('/');
    match path {
        "/api/auth/login" => Some((LimitedAction::Login, Subject::Ip)),
        "/api/feedback" => Some((LimitedAction::Feedback, Subject::User)),
        "/api/support-tickets" => Some((LimitedAction::SupportTicket, Subject::User)),
        _ => {
            let rest = path.strip_prefix("/api/blog-interactions/")?;
            let (post_id, tail) = rest.split_once('/')?;
            (tail == "comments" && post_id != "comments")
                .then_some((LimitedAction::Comment, Subject::Ip))
        }
    }
}

/// Fixed-window quotas for submissions and login attempts. Requests without a
/// resolvable subject pass through and are rejected downstream.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some((action, subject)) = classify(request.method(), request.uri().path()) else {
        return Ok(next.run(request).await);
    };

    let subject = match subject {
        Subject::User => match auth {
            Some(AuthUser(actor)) => actor.user_id.to_string(),
            None => return Ok(next.run(request).await),
        },
        Subject::Ip => connect_info
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    };

    let limiter = RateLimiter::new(state.cache.clone(), state.rate_limits);
    let info = limiter.hit(&subject, action).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to check rate limit");
        AppError::internal("failed to check rate limit")
    })?;

    if info.limited {
        return Err(AppError::rate_limited(
            "Too many requests. Please try again later.",
        ));
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(LIMIT_HEADER, HeaderValue::from(info.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(info.remaining));
    Ok(response)
}
