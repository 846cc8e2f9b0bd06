//! HTTP surface: document upload, chat and satellite tracking routes.

use std::sync::Arc;

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::completion::Completer;
use crate::error::RagError;
use crate::rag::{ChatAnswer, IngestOutcome, RagService};
use crate::tracking::{fetch_and_record, nlq, N2yoClient, NlqParams, TrackRequest};
use crate::vector_store::TrackArchive;

/// Message returned when the upload carried no usable file.
pub const EMPTY_UPLOAD_MSG: &str = "No file uploaded or file is empty.";

/// Message returned when nothing could be extracted from the upload.
pub const NO_TEXT_MSG: &str = "No text extracted from file.";

/// Shared handles used by every route.
#[derive(Clone)]
pub struct AppState {
    /// Document ingest and question answering.
    pub rag: RagService,
    /// Satellite positions client.
    pub n2yo: N2yoClient,
    /// Model used to translate tracking requests.
    pub completer: Arc<dyn Completer>,
    /// Archive receiving every fetched track.
    pub tracks: TrackArchive,
}

/// Builds the service router; uploads above `max_upload_bytes` get a 413.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/chat", post(chat_handler))
        .route("/n2yo/track", get(track_handler))
        .route("/n2yo/nlq", post(nlq_handler))
        .with_state(state)
}

/// HTTP status for a pipeline error.
pub fn status_for(err: &RagError) -> StatusCode {
    match err {
        RagError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        RagError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        RagError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        RagError::Parse { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        RagError::Extraction(_)
        | RagError::VectorStore(_)
        | RagError::Http(_)
        | RagError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `{"error": ...}` response for the chat route.
#[derive(Debug)]
pub struct ApiError(pub RagError);

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        error!(error = %self.0, %status, "request failed");
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
struct UploadBody {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,
}

impl UploadBody {
    fn stored(chunks: usize) -> Json<Self> {
        Json(Self {
            ok: true,
            chunks: Some(chunks),
            msg: None,
        })
    }

    fn failed(msg: impl Into<String>) -> Json<Self> {
        Json(Self {
            ok: false,
            chunks: None,
            msg: Some(msg.into()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    query: String,
}

#[derive(Debug, Serialize)]
struct TrackBody {
    ok: bool,
    id: String,
    /// Number of position samples archived under `id`.
    positions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    parsed: Option<NlqParams>,
}

#[derive(Debug, Serialize)]
struct TrackFailure {
    ok: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
}

/// `{"ok": false, "error", "raw"?}` response for the tracking routes.
struct TrackError(StatusCode, RagError);

impl From<RagError> for TrackError {
    fn from(err: RagError) -> Self {
        Self(status_for(&err), err)
    }
}

impl IntoResponse for TrackError {
    fn into_response(self) -> Response {
        let TrackError(status, err) = self;
        error!(error = %err, %status, "tracking request failed");
        let raw = match &err {
            RagError::Parse { raw, .. } => Some(raw.clone()),
            _ => None,
        };
        (
            status,
            Json(TrackFailure {
                ok: false,
                error: err.to_string(),
                raw,
            }),
        )
            .into_response()
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> (StatusCode, Json<UploadBody>) {
    let Ok(mut multipart) = multipart else {
        return (StatusCode::OK, UploadBody::failed(EMPTY_UPLOAD_MSG));
    };
    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let filename = field.file_name().unwrap_or("upload").to_string();
                match field.bytes().await {
                    Ok(bytes) => {
                        upload = Some((filename, bytes));
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to read upload body");
                        return (err.status(), UploadBody::failed(err.body_text()));
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "malformed multipart upload");
                return (err.status(), UploadBody::failed(err.body_text()));
            }
        }
    }

    let Some((filename, bytes)) = upload.filter(|(_, bytes)| !bytes.is_empty()) else {
        return (StatusCode::OK, UploadBody::failed(EMPTY_UPLOAD_MSG));
    };
    match state.rag.ingest(&filename, &bytes).await {
        Ok(IngestOutcome::Stored { chunks }) => (StatusCode::OK, UploadBody::stored(chunks)),
        Ok(IngestOutcome::NoContent) => (StatusCode::OK, UploadBody::failed(NO_TEXT_MSG)),
        Err(err) => {
            error!(filename = %filename, error = %err, "upload ingestion failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                UploadBody::failed(err.to_string()),
            )
        }
    }
}

async fn chat_handler(
    State(state): State<AppState>,
    body: Result<Json<QueryBody>, JsonRejection>,
) -> Result<Json<ChatAnswer>, ApiError> {
    let Json(request) =
        body.map_err(|rejection| RagError::InvalidRequest(rejection.body_text()))?;
    let answer = state.rag.answer(&request.query).await?;
    Ok(Json(answer))
}

async fn track_handler(
    State(state): State<AppState>,
    query: Result<Query<TrackRequest>, QueryRejection>,
) -> Result<Json<TrackBody>, TrackError> {
    let Query(request) = query.map_err(|rejection| {
        TrackError(
            rejection.status(),
            RagError::InvalidRequest(rejection.body_text()),
        )
    })?;
    let request = request.validated()?;
    let track = fetch_and_record(&state.n2yo, &state.tracks, &request, None).await?;
    Ok(Json(TrackBody {
        ok: true,
        id: track.id,
        positions: track.positions.len(),
        parsed: None,
    }))
}

async fn nlq_handler(
    State(state): State<AppState>,
    body: Result<Json<QueryBody>, JsonRejection>,
) -> Result<Json<TrackBody>, TrackError> {
    let Json(request) =
        body.map_err(|rejection| RagError::InvalidRequest(rejection.body_text()))?;
    let params = nlq::translate(state.completer.as_ref(), &request.query).await?;
    let track_request = TrackRequest::from(&params).validated()?;
    let track = fetch_and_record(
        &state.n2yo,
        &state.tracks,
        &track_request,
        Some(params.clone()),
    )
    .await?;
    Ok(Json(TrackBody {
        ok: true,
        id: track.id,
        positions: track.positions.len(),
        parsed: Some(params),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(
            status_for(&RagError::InvalidRequest("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&RagError::Config("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&RagError::Upstream {
                service: "n2yo",
                status: 500,
                body: String::new()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&RagError::Parse {
                message: "bad".into(),
                raw: "x".into()
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&RagError::Extraction("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn upload_failure_body_has_no_chunk_count() {
        let Json(body) = UploadBody::failed(EMPTY_UPLOAD_MSG);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"ok": false, "msg": "No file uploaded or file is empty."})
        );
    }
}
