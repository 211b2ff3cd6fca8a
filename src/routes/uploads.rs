use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/upload/images", post(upload_images))
        .route("/api/upload/images/{filename}", get(serve_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// POST /api/upload/images — authenticated multipart upload.
///
/// All parts are read and type-checked before anything touches disk,
/// so a non-image part rejects the whole batch with nothing written.
/// An I/O failure mid-write still leaves earlier files of the batch
/// behind; callers get a 500 and no URL list.
pub async fn upload_images(
    State(state): State<AppState>,
    _user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<Vec<String>>> {
    let mut staged: Vec<(String, Bytes)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("files") {
            continue;
        }

        let content_type = field.content_type().unwrap_or("").to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::BadRequest("Only image files are allowed".into()));
        }

        let extension = field
            .file_name()
            .and_then(|name| std::path::Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?;

        staged.push((format!("{}{}", uuid::Uuid::now_v7(), extension), data));
    }

    tokio::fs::create_dir_all(&state.uploads_dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create uploads dir: {e}")))?;

    let mut urls = Vec::with_capacity(staged.len());
    for (filename, data) in staged {
        tokio::fs::write(state.uploads_dir.join(&filename), &data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store upload: {e}")))?;
        urls.push(format!("/api/upload/images/{filename}"));
    }

    Ok(Json(urls))
}

/// GET /api/upload/images/{filename} — public
pub async fn serve_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    // Filenames are flat UUIDs; anything that walks the tree is not ours
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(AppError::NotFound);
    }

    let path = state.uploads_dir.join(&filename);
    let data = tokio::fs::read(&path).await.map_err(|_| AppError::NotFound)?;

    let mime = mime_guess::from_path(&filename).first_or_octet_stream();
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime.as_ref().to_string())],
        data,
    )
        .into_response())
}
