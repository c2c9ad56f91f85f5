use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::app::auth::AuthService;
use crate::domain::user::Actor;
use crate::http::AppError;
use crate::AppState;

/// Bearer-token identity for any signed-in caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Actor);

/// Bearer-token identity restricted to the admin role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Actor);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("invalid Authorization header"))?;

        let service = AuthService::new(
            state.db.clone(),
            state.paseto_access_key,
            state.access_ttl_minutes,
        );
        let actor = service.authenticate_access_token(token).map_err(|err| {
            tracing::error!(error = ?err, "failed to authenticate");
            AppError::internal("failed to authenticate")
        })?;

        let actor = actor.ok_or_else(|| AppError::unauthorized("invalid token"))?;
        Ok(AuthUser(actor))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(actor) = AuthUser::from_request_parts(parts, state).await?;
        if !actor.is_admin() {
            return Err(AppError::forbidden("admin access required"));
        }
        Ok(AdminUser(actor))
    }
}
