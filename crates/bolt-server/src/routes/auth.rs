use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bolt_core::connection::{Connection, ConnectionStatus, Endpoints, UpstreamCredentials};
use bolt_core::upstream::Credentials;
use serde::Deserialize;

use crate::auth::{expired_cookie, require_session, session_cookie};
use crate::error::AppError;
use crate::state::{AppState, Session};

#[derive(Deserialize)]
pub struct AuthenticateBody {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    xlr_username: Option<String>,
    #[serde(default)]
    xlr_password: Option<String>,
    #[serde(default)]
    ansible_username: Option<String>,
    #[serde(default)]
    ansible_password: Option<String>,
    #[serde(default)]
    xlr_url: Option<String>,
    #[serde(default)]
    tower_url: Option<String>,
}

impl AuthenticateBody {
    /// Per-upstream logins. A token is sent to both APIs; shared
    /// `username`/`password` win over the per-upstream fields.
    fn credentials(&self) -> Option<UpstreamCredentials> {
        let login = |username: &Option<String>, password: &Option<String>| {
            Credentials::from_parts(
                self.username.clone().or_else(|| username.clone()),
                self.password.clone().or_else(|| password.clone()),
                self.token.clone(),
            )
        };
        Some(UpstreamCredentials {
            releases: login(&self.xlr_username, &self.xlr_password)?,
            inventories: login(&self.ansible_username, &self.ansible_password)?,
        })
    }
}

#[derive(Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    session: Option<String>,
}

/// POST /api/authenticate: check both upstreams and open a session.
pub async fn authenticate(
    State(app): State<AppState>,
    Json(body): Json<AuthenticateBody>,
) -> Result<Response, AppError> {
    let credentials = body
        .credentials()
        .ok_or_else(|| AppError::bad_request("username and password, or a token, are required"))?;
    let endpoints = Endpoints::resolve(
        &app.config,
        body.xlr_url.as_deref(),
        body.tower_url.as_deref(),
    );
    endpoints.require()?;

    let config = app.config.clone();
    let (check_endpoints, check_credentials) = (endpoints.clone(), credentials.clone());
    let status: ConnectionStatus = tokio::task::spawn_blocking(move || {
        let connection = Connection::open(&check_endpoints, &check_credentials, &config)?;
        Ok::<_, bolt_core::BoltError>(connection.check())
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    if let Some(message) = status.failure_message() {
        tracing::warn!(
            xlr = status.xlr_status,
            tower = status.tower_status,
            "authentication rejected"
        );
        let body = serde_json::json!({
            "status": "error",
            "message": message,
            "xlr_status": status.xlr_status,
            "tower_status": status.tower_status,
        });
        return Ok((StatusCode::UNAUTHORIZED, Json(body)).into_response());
    }

    let id = app
        .open_session(Session {
            credentials,
            endpoints,
        })
        .await;
    tracing::info!("session opened");
    let body = serde_json::json!({
        "status": "success",
        "message": "Authenticated against both APIs",
        "session": id,
    });
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&id))],
        Json(body),
    )
        .into_response())
}

/// POST /api/logout: drop the caller's session.
pub async fn logout(
    State(app): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
) -> Result<Response, AppError> {
    let (id, _) = require_session(&app, &headers, query.session.as_deref()).await?;
    app.close_session(&id).await;
    let body = serde_json::json!({ "status": "success", "message": "Logged out" });
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, expired_cookie())],
        Json(body),
    )
        .into_response())
}
