use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bolt_core::paths::is_bare_filename;
use serde::Deserialize;

use crate::auth::require_session;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    session: Option<String>,
}

/// GET /api/download/{filename}: return a previously exported table.
pub async fn download_export(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path(filename): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    require_session(&app, &headers, query.session.as_deref()).await?;
    if !is_bare_filename(&filename) {
        return Err(AppError::bad_request(format!(
            "invalid export filename '{filename}'"
        )));
    }

    let path = app.export_dir().join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::not_found(format!("export '{filename}' not found")));
        }
        Err(e) => return Err(e.into()),
    };

    let content_type = if filename.ends_with(".csv") {
        "text/csv; charset=utf-8"
    } else {
        "application/octet-stream"
    };
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
