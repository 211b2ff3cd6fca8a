use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{password, token};
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<&'static str> {
    if req.username.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username, email and password are required".into(),
        ));
    }
    if users::username_taken(&state.db, &req.username)? {
        return Err(AppError::BadRequest("Username is already taken".into()));
    }
    if users::email_taken(&state.db, &req.email)? {
        return Err(AppError::BadRequest("Email is already in use".into()));
    }

    let password_hash = password::hash(&req.password)?;
    users::create(&state.db, &req.username, &req.email, &password_hash)?;

    tracing::info!("Registered user {}", req.username);
    Ok("User registered successfully")
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = users::find_by_username(&state.db, &req.username)?
        .ok_or(AppError::Unauthorized)?;

    if !password::verify(&req.password, &user.password_hash) {
        return Err(AppError::Unauthorized);
    }

    let token = token::issue(
        &state.config.auth.jwt_secret,
        user.id,
        state.config.auth.token_hours,
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;

    Ok(Json(LoginResponse {
        token,
        id: user.id,
        username: user.username,
        email: user.email,
    }))
}

/// POST /api/auth/logout — tokens are stateless, so there is nothing
/// to invalidate server-side; the client drops its copy.
pub async fn logout() -> StatusCode {
    StatusCode::OK
}
