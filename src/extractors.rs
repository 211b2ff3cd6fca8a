use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::token;
use crate::db::users;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Extractor that requires a valid bearer token.
/// Returns 401 before any handler logic runs when the token is absent,
/// malformed, expired, or names a user that no longer exists.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = extract_bearer_token(parts).ok_or(AppError::Unauthorized)?;

        let claims = token::verify(&state.config.auth.jwt_secret, bearer)
            .map_err(|_| AppError::Unauthorized)?;

        // A token is only as good as the user it points at
        let user = users::find_by_id(&state.db, claims.sub)?.ok_or(AppError::Unauthorized)?;

        Ok(CurrentUser {
            id: user.id,
            username: user.username,
            email: user.email,
        })
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
