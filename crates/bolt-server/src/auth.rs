//! Session lookup for authenticated routes.
//!
//! A session id travels in the `bolt_session` cookie, or in a `session`
//! query parameter for clients that cannot hold cookies (such as an
//! `EventSource` opened from another origin).

use axum::http::HeaderMap;

use crate::error::AppError;
use crate::state::{AppState, Session};

pub const SESSION_COOKIE: &str = "bolt_session";

/// `Set-Cookie` value for a freshly opened session.
pub fn session_cookie(id: &str) -> String {
    format!("{SESSION_COOKIE}={id}; HttpOnly; SameSite=Lax; Path=/")
}

/// `Set-Cookie` value that clears the session cookie.
pub fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

/// Session id from the cookie header, else from the query parameter.
pub fn session_id(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(cookies) = headers.get("cookie").and_then(|v| v.to_str().ok()) {
        for part in cookies.split(';') {
            if let Some(val) = part.trim().strip_prefix(&format!("{SESSION_COOKIE}=")) {
                if !val.is_empty() {
                    return Some(val.to_string());
                }
            }
        }
    }
    query.filter(|q| !q.is_empty()).map(str::to_string)
}

/// Resolve the caller's session or fail with 401.
pub async fn require_session(
    app: &AppState,
    headers: &HeaderMap,
    query: Option<&str>,
) -> Result<(String, Session), AppError> {
    let id = session_id(headers, query)
        .ok_or_else(|| AppError::unauthorized("not authenticated; POST /api/authenticate first"))?;
    let session = app
        .session(&id)
        .await
        .ok_or_else(|| AppError::unauthorized("session expired or unknown"))?;
    Ok((id, session))
}
