use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use bolt_core::connection::Connection;
use bolt_core::export::CsvExporter;
use bolt_core::pipeline::{ErrorKind, EventStatus, Pipeline, PipelineOutcome, ProgressEvent, Stage};
use serde::Deserialize;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;

use crate::auth::require_session;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct FetchQuery {
    #[serde(default)]
    release_train_url: Option<String>,
    #[serde(default)]
    session: Option<String>,
}

/// GET /api/fetch: run the discovery pipeline and stream its progress events.
///
/// The pipeline runs on a blocking worker. When the client disconnects the
/// receiver is dropped, `blocking_send` fails, and the pipeline stops.
pub async fn fetch_servers(
    State(app): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<FetchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (_, session) = require_session(&app, &headers, query.session.as_deref()).await?;
    let reference = query
        .release_train_url
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::bad_request("release_train_url is required"))?;

    let (tx, rx) = mpsc::channel::<ProgressEvent>(32);
    let config = app.config.clone();
    let export_dir = app.export_dir();
    let cache = app.inventory_cache.clone();

    tokio::task::spawn_blocking(move || {
        let connection = match Connection::open(&session.endpoints, &session.credentials, &config)
        {
            Ok(c) => c,
            Err(e) => {
                let event = ProgressEvent::new(
                    Stage::ExtractComponents,
                    EventStatus::Error,
                    format!("failed to create API clients: {e}"),
                )
                .with_kind(ErrorKind::UpstreamUnavailable);
                let _ = tx.blocking_send(event);
                return;
            }
        };
        let exporter = CsvExporter::new(export_dir);
        let pipeline = Pipeline::new(&connection.releases, &connection.inventories, &exporter)
            .with_cache(cache.as_deref());
        let mut sink = |event: ProgressEvent| tx.blocking_send(event).is_ok();
        match pipeline.run(&reference, &mut sink) {
            PipelineOutcome::Completed { export, .. } => {
                tracing::info!(file = %export.filename, rows = export.rows, "fetch complete");
            }
            PipelineOutcome::Failed { stage, message, .. } => {
                tracing::warn!(%stage, %message, "fetch failed");
            }
            PipelineOutcome::Cancelled | PipelineOutcome::Disconnected => {
                tracing::info!("fetch stopped before completion");
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        Ok::<Event, Infallible>(
            Event::default()
                .json_data(&event)
                .unwrap_or_else(|_| Event::default().data(event.message.clone())),
        )
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
