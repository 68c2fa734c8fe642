//! HTTP handlers for the page and the session API.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use bytes::BytesMut;
use uuid::Uuid;

use super::AppState;
use crate::media::{FileCandidate, MediaContent, MAX_UPLOAD_BYTES};
use crate::session::{self, ErrorReport, SessionError, SessionSnapshot};

const INDEX_HTML: &str = include_str!("index.html");

/// Error response: `{"error": {"kind": ..., "message": ...}}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    report: ErrorReport,
}

impl ApiError {
    fn new(status: StatusCode, kind: &str, message: impl std::fmt::Display) -> Self {
        Self {
            status,
            report: ErrorReport::new(kind, message),
        }
    }

    fn session_not_found(id: &Uuid) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "SessionNotFound",
            format!("no session with id {id}"),
        )
    }

    fn bad_upload(message: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BadUpload", message)
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let status = match err {
            SessionError::Busy | SessionError::NoFile => StatusCode::CONFLICT,
            SessionError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, err.kind(), &err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.report })),
        )
            .into_response()
    }
}

pub(super) async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub(super) async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.session_count(),
    }))
}

pub(super) async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionSnapshot>) {
    let session = state.create_session();
    let snapshot = session.lock().snapshot();
    (StatusCode::CREATED, Json(snapshot))
}

pub(super) async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state
        .session(&id)
        .ok_or_else(|| ApiError::session_not_found(&id))?;
    let snapshot = session.lock().snapshot();
    Ok(Json(snapshot))
}

/// Ends the session. An attempt still in flight finishes in the background
/// and its outcome is discarded along with the session.
pub(super) async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.remove_session(&id) {
        tracing::debug!(session = %id, "Session closed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::session_not_found(&id))
    }
}

/// Accepts a multipart upload. Rejected files answer 422 with the updated
/// snapshot so the page can show the reason.
pub(super) async fn upload_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let session = state
        .session(&id)
        .ok_or_else(|| ApiError::session_not_found(&id))?;

    if session.lock().is_busy() {
        return Err(SessionError::Busy.into());
    }

    let candidate = read_upload(&mut multipart).await?;

    let mut session = session.lock();
    match session.select(candidate) {
        Ok(_) => Ok((StatusCode::OK, Json(session.snapshot())).into_response()),
        Err(SessionError::Rejected(_)) => {
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(session.snapshot())).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Read the `file` field, keeping at most `MAX_UPLOAD_BYTES + 1` bytes.
/// The returned size is what was seen, so oversized uploads still fail
/// validation as too large rather than as a body-limit error.
async fn read_upload(multipart: &mut Multipart) -> Result<FileCandidate, ApiError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(ApiError::bad_upload)?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field.file_name().map(str::to_string);
        let mut buf = BytesMut::new();
        let mut size: u64 = 0;
        while let Some(chunk) = field.chunk().await.map_err(ApiError::bad_upload)? {
            size += chunk.len() as u64;
            if size > MAX_UPLOAD_BYTES {
                break;
            }
            buf.extend_from_slice(&chunk);
        }

        tracing::debug!(file = ?name, size, "Upload received");
        return Ok(FileCandidate::from_upload(name, size, buf.freeze()));
    }

    Err(ApiError::bad_upload("multipart body has no 'file' field"))
}

/// Starts one analysis attempt on a background task and answers 202.
pub(super) async fn submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let session = state
        .session(&id)
        .ok_or_else(|| ApiError::session_not_found(&id))?;

    let (submission, snapshot) = {
        let mut guard = session.lock();
        let submission = guard.begin_submit()?;
        (submission, guard.snapshot())
    };

    let analyzer = Arc::clone(&state.analyzer);
    tokio::spawn(async move {
        session::finish_submission(&session, submission, analyzer.as_ref()).await;
    });

    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// Streams the clip behind a live preview handle.
pub(super) async fn preview(
    State(state): State<AppState>,
    Path(handle): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let file = state.previews().get(&handle).ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "PreviewNotFound",
            "preview has been released",
        )
    })?;

    let bytes = match file.content() {
        MediaContent::Memory(bytes) => bytes.clone(),
        MediaContent::Disk(path) => tokio::fs::read(path)
            .await
            .map(bytes::Bytes::from)
            .map_err(|e| {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "PreviewUnavailable", e)
            })?,
    };
    let total = bytes.len() as u64;

    let content_type = mime_guess::from_path(file.name())
        .first_or_octet_stream()
        .to_string();
    let builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, "no-store");

    let requested = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .map(|value| parse_byte_range(value, total));

    let response = match requested {
        None | Some(ByteRange::Ignored) => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, total)
            .body(Body::from(bytes)),
        Some(ByteRange::Unsatisfiable) => builder
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(header::CONTENT_RANGE, format!("bytes */{total}"))
            .body(Body::empty()),
        Some(ByteRange::Partial { start, end }) => builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{total}"))
            .header(header::CONTENT_LENGTH, end - start + 1)
            .body(Body::from(bytes.slice(start as usize..=end as usize))),
    };
    response.map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal", e))
}

/// Outcome of reading a `Range` header against a body of known length.
#[derive(Debug, PartialEq, Eq)]
enum ByteRange {
    /// Inclusive bounds, already clamped to the body.
    Partial { start: u64, end: u64 },
    Unsatisfiable,
    /// Not a single `bytes=` range; serve the whole body.
    Ignored,
}

/// Parse `bytes=a-b`, `bytes=a-` or `bytes=-n`. Multi-range requests are
/// answered with the full body.
fn parse_byte_range(value: &str, total: u64) -> ByteRange {
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return ByteRange::Ignored;
    };
    if spec.contains(',') {
        return ByteRange::Ignored;
    }
    let Some((first, last)) = spec.trim().split_once('-') else {
        return ByteRange::Ignored;
    };
    let (first, last) = (first.trim(), last.trim());

    let bounds = match (first.is_empty(), last.is_empty()) {
        (true, true) => return ByteRange::Ignored,
        (true, false) => match last.parse::<u64>() {
            Ok(0) => return ByteRange::Unsatisfiable,
            Ok(suffix) => (total.saturating_sub(suffix), total.saturating_sub(1)),
            Err(_) => return ByteRange::Ignored,
        },
        (false, _) => {
            let Ok(start) = first.parse::<u64>() else {
                return ByteRange::Ignored;
            };
            let end = if last.is_empty() {
                total.saturating_sub(1)
            } else {
                match last.parse::<u64>() {
                    Ok(end) if end >= start => end.min(total.saturating_sub(1)),
                    _ => return ByteRange::Ignored,
                }
            };
            (start, end)
        }
    };

    if total == 0 || bounds.0 >= total {
        return ByteRange::Unsatisfiable;
    }
    ByteRange::Partial {
        start: bounds.0,
        end: bounds.1,
    }
}
