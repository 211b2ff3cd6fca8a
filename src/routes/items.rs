use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::items::{self, ItemInput, ListParams};
use crate::db::models::Item;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/items", get(list).post(create))
        .route("/api/items/my-items", get(my_items))
        .route(
            "/api/items/{id}",
            get(get_item).put(update).delete(delete_item),
        )
}

fn default_size() -> u32 {
    10
}

fn default_sort_by() -> String {
    "createdAt".to_string()
}

fn default_sort_dir() -> String {
    "desc".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
    pub category: Option<String>,
    pub search: Option<String>,
    #[serde(default = "default_sort_by", rename = "sortBy")]
    pub sort_by: String,
    #[serde(default = "default_sort_dir", rename = "sortDir")]
    pub sort_dir: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub current_page: u32,
    pub total_items: i64,
    pub total_pages: i64,
}

/// GET /api/items — public paginated listing with optional filters
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ItemPage>> {
    let size = query.size.max(1);
    let params = ListParams {
        page: query.page,
        size,
        // Empty strings mean "no filter", matching the query contract
        category: query.category.filter(|c| !c.is_empty()),
        search: query.search.filter(|s| !s.is_empty()),
        sort_by: query.sort_by,
        sort_dir: query.sort_dir,
    };

    let (items, total) = items::list(&state.db, &params)?;
    let total_pages = (total + size as i64 - 1) / size as i64;

    Ok(Json(ItemPage {
        items,
        current_page: query.page,
        total_items: total,
        total_pages,
    }))
}

/// GET /api/items/{id} — public
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Item>> {
    let item = items::get(&state.db, id)?.ok_or(AppError::NotFound)?;
    Ok(Json(item))
}

/// POST /api/items — authenticated
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<ItemInput>,
) -> AppResult<Json<Item>> {
    // Re-resolve the identity against storage; a token can outlive its user
    let owner = users::find_by_id(&state.db, user.id)?
        .ok_or_else(|| AppError::BadRequest("User not found".into()))?;

    let item = items::create(&state.db, owner.id, &input)?;
    Ok(Json(item))
}

/// PUT /api/items/{id} — authenticated, owner only
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<ItemInput>,
) -> AppResult<Json<Item>> {
    let item = items::update(&state.db, id, user.id, &input)?;
    Ok(Json(item))
}

/// DELETE /api/items/{id} — authenticated, owner only
pub async fn delete_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    items::delete(&state.db, id, user.id)?;
    Ok(StatusCode::OK)
}

/// GET /api/items/my-items — authenticated, unpaginated
pub async fn my_items(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Item>>> {
    let items = items::by_owner(&state.db, user.id)?;
    Ok(Json(items))
}
