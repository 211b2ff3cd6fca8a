use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::comments;
use crate::db::models::Comment;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/items/{id}/comments",
        get(list_comments).post(create_comment),
    )
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

/// GET /api/items/{id}/comments — public, newest first
pub async fn list_comments(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> AppResult<Json<Vec<Comment>>> {
    let comments = comments::for_item(&state.db, item_id)?;
    Ok(Json(comments))
}

/// POST /api/items/{id}/comments — authenticated
pub async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(item_id): Path<i64>,
    Json(req): Json<CommentRequest>,
) -> AppResult<Json<Comment>> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Comment text is required".into()));
    }
    let comment = comments::create(&state.db, item_id, user.id, req.text.trim())?;
    Ok(Json(comment))
}
