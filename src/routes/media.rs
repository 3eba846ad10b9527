use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Serve an uploaded file from the media root.
pub async fn serve(State(state): State<AppState>, Path(path): Path<String>) -> AppResult<Response> {
    let file = state.media.resolve(&path).ok_or(AppError::NotFound)?;

    match tokio::fs::metadata(&file).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(AppError::NotFound),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(e) => return Err(e.into()),
    }
    let data = tokio::fs::read(&file).await?;

    let mime = mime_guess::from_path(&file).first_or_octet_stream();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
        ],
        data,
    )
        .into_response())
}
