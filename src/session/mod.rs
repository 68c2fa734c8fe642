//! Per-user session state.
//!
//! One [`Session`] tracks one user's selected clip and the outcome of its
//! analysis as a single tagged state:
//!
//! ```text
//! Idle ──select ok──▶ Selected ──begin_submit──▶ Submitting ──complete──▶ Succeeded | Failed
//!   ▲                   ▲                                                     │
//!   └──select rejected──┴──────────────select ok / begin_submit (replay)──────┘
//! ```
//!
//! `busy` is simply "in `Submitting`", so a result, an error and an in-flight
//! attempt can never coexist. Selecting a new file while an attempt is in
//! flight is refused with [`SessionError::Busy`]. Every attempt carries a
//! number and completions for any other attempt are dropped.

pub mod preview;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::analysis::{self, AnalysisError, VideoAnalyzer};
use crate::media::{validate, FileCandidate, MediaFile, ValidationError, ValidationOutcome, VideoFormat};

pub use preview::{PreviewHandle, PreviewRegistry};

/// Session operations refused in the current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("an analysis is already in progress")]
    Busy,

    #[error("no video selected")]
    NoFile,

    #[error(transparent)]
    Rejected(#[from] ValidationError),
}

impl SessionError {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Busy => "Busy",
            SessionError::NoFile => "NoFile",
            SessionError::Rejected(e) => e.kind(),
        }
    }
}

/// An accepted file and its live preview.
#[derive(Debug)]
pub struct Selection {
    file: Arc<MediaFile>,
    preview: PreviewHandle,
}

impl Selection {
    pub fn file(&self) -> &Arc<MediaFile> {
        &self.file
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }
}

/// Successful analysis text.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub text: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum SessionState {
    /// Nothing selected; `error` holds the last rejection, if any.
    Idle { error: Option<ValidationError> },
    Selected(Selection),
    Submitting { selection: Selection, attempt: u64 },
    Succeeded { selection: Selection, analysis: Analysis },
    Failed { selection: Selection, error: AnalysisError },
}

impl SessionState {
    pub fn selection(&self) -> Option<&Selection> {
        match self {
            SessionState::Idle { .. } => None,
            SessionState::Selected(selection)
            | SessionState::Submitting { selection, .. }
            | SessionState::Succeeded { selection, .. }
            | SessionState::Failed { selection, .. } => Some(selection),
        }
    }

    fn phase(&self) -> Phase {
        match self {
            SessionState::Idle { .. } => Phase::Idle,
            SessionState::Selected(_) => Phase::Selected,
            SessionState::Submitting { .. } => Phase::Submitting,
            SessionState::Succeeded { .. } => Phase::Succeeded,
            SessionState::Failed { .. } => Phase::Failed,
        }
    }
}

/// A started attempt: the file to analyze and the number to complete it with.
#[derive(Debug, Clone)]
pub struct Submission {
    pub attempt: u64,
    pub file: Arc<MediaFile>,
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    state: SessionState,
    last_attempt: u64,
    previews: PreviewRegistry,
}

impl Session {
    pub fn new(previews: PreviewRegistry) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle { error: None },
            last_attempt: 0,
            previews,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, SessionState::Submitting { .. })
    }

    /// Validate and select a file, replacing any previous selection.
    ///
    /// A rejected file leaves the session idle with the rejection recorded;
    /// the previous selection (and its preview) is dropped either way.
    pub fn select(&mut self, candidate: FileCandidate) -> Result<Arc<MediaFile>, SessionError> {
        if self.is_busy() {
            tracing::warn!(session = %self.id, "File selection refused while analysis is running");
            return Err(SessionError::Busy);
        }

        match validate(candidate) {
            ValidationOutcome::Rejected(err) => {
                tracing::info!(session = %self.id, kind = err.kind(), reason = %err, "File rejected");
                self.state = SessionState::Idle {
                    error: Some(err.clone()),
                };
                Err(SessionError::Rejected(err))
            }
            ValidationOutcome::Accepted(file) => {
                let file = Arc::new(file);
                let preview = self.previews.acquire(Arc::clone(&file));
                tracing::info!(
                    session = %self.id,
                    file = %file.name(),
                    size = file.size(),
                    format = file.format().extension(),
                    "File selected"
                );
                self.state = SessionState::Selected(Selection {
                    file: Arc::clone(&file),
                    preview,
                });
                Ok(file)
            }
        }
    }

    /// Enter `Submitting`. Allowed with a selection and no attempt in flight;
    /// finished attempts can be replayed.
    pub fn begin_submit(&mut self) -> Result<Submission, SessionError> {
        let state = std::mem::replace(&mut self.state, SessionState::Idle { error: None });
        match state {
            SessionState::Selected(selection)
            | SessionState::Succeeded { selection, .. }
            | SessionState::Failed { selection, .. } => {
                self.last_attempt += 1;
                let attempt = self.last_attempt;
                let file = Arc::clone(&selection.file);
                tracing::info!(session = %self.id, attempt, file = %file.name(), "Analysis started");
                self.state = SessionState::Submitting { selection, attempt };
                Ok(Submission { attempt, file })
            }
            other @ SessionState::Submitting { .. } => {
                self.state = other;
                Err(SessionError::Busy)
            }
            other @ SessionState::Idle { .. } => {
                self.state = other;
                Err(SessionError::NoFile)
            }
        }
    }

    /// Record the outcome of `attempt`. Returns `false` (and changes nothing)
    /// if that attempt is not the one in flight.
    pub fn complete(&mut self, attempt: u64, outcome: Result<String, AnalysisError>) -> bool {
        let state = std::mem::replace(&mut self.state, SessionState::Idle { error: None });
        match state {
            SessionState::Submitting {
                selection,
                attempt: current,
            } if current == attempt => {
                self.state = match outcome {
                    Ok(text) => SessionState::Succeeded {
                        selection,
                        analysis: Analysis {
                            text,
                            completed_at: Utc::now(),
                        },
                    },
                    Err(error) => SessionState::Failed { selection, error },
                };
                true
            }
            other => {
                tracing::debug!(session = %self.id, attempt, "Ignoring stale analysis outcome");
                self.state = other;
                false
            }
        }
    }

    /// Serializable view for the page.
    pub fn snapshot(&self) -> SessionSnapshot {
        let selection = self.state.selection();
        let (error, result, completed_at) = match &self.state {
            SessionState::Idle { error: Some(e) } => (Some(ErrorReport::new(e.kind(), e)), None, None),
            SessionState::Failed { error, .. } => (Some(ErrorReport::new(error.kind(), error)), None, None),
            SessionState::Succeeded { analysis, .. } => {
                (None, Some(analysis.text.clone()), Some(analysis.completed_at))
            }
            _ => (None, None, None),
        };

        SessionSnapshot {
            id: self.id,
            phase: self.state.phase(),
            busy: self.is_busy(),
            file: selection.map(|s| FileInfo {
                name: s.file.name().to_string(),
                size: s.file.size(),
                format: s.file.format(),
            }),
            preview_url: selection.map(|s| s.preview.url()),
            error,
            result,
            completed_at,
            can_submit: matches!(
                self.state,
                SessionState::Selected(_)
                    | SessionState::Succeeded { .. }
                    | SessionState::Failed { .. }
            ),
            can_select: !self.is_busy(),
        }
    }
}

/// Start an attempt, run it, and record the outcome.
///
/// The lock is only held for the two state transitions, never across the
/// encode or the network call.
pub async fn run_submission(
    session: &Mutex<Session>,
    analyzer: &dyn VideoAnalyzer,
) -> Result<bool, SessionError> {
    let submission = session.lock().begin_submit()?;
    Ok(finish_submission(session, submission, analyzer).await)
}

/// Second half of [`run_submission`] for callers that started the attempt
/// themselves.
pub async fn finish_submission(
    session: &Mutex<Session>,
    submission: Submission,
    analyzer: &dyn VideoAnalyzer,
) -> bool {
    let outcome = analysis::submit(&submission.file, analyzer).await;
    session.lock().complete(submission.attempt, outcome)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Selected,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub format: VideoFormat,
}

/// Error as shown to the user: a stable kind plus a readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
}

impl ErrorReport {
    pub fn new(kind: &str, message: impl std::fmt::Display) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub phase: Phase,
    pub busy: bool,
    pub file: Option<FileInfo>,
    pub preview_url: Option<String>,
    pub error: Option<ErrorReport>,
    pub result: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub can_submit: bool,
    pub can_select: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::MockAnalyzer;
    use crate::media::MAX_UPLOAD_BYTES;
    use bytes::Bytes;

    fn upload(name: &str, size: u64) -> FileCandidate {
        // content length is irrelevant to the policy, only `size` is checked
        FileCandidate::from_upload(Some(name.to_string()), size, Bytes::from_static(b"video"))
    }

    fn session() -> (Session, PreviewRegistry) {
        let previews = PreviewRegistry::new();
        (Session::new(previews.clone()), previews)
    }

    // ==================== select ====================

    #[test]
    fn test_new_session_is_idle() {
        let (session, _) = session();
        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Idle);
        assert!(!snap.busy);
        assert!(!snap.can_submit);
        assert!(snap.can_select);
        assert!(snap.error.is_none());
    }

    #[test]
    fn test_select_valid_file() {
        let (mut session, previews) = session();
        let file = session.select(upload("clip.mov", 10 * 1024 * 1024)).unwrap();
        assert_eq!(file.name(), "clip.mov");

        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Selected);
        assert!(snap.can_submit);
        assert_eq!(snap.file.unwrap().format, VideoFormat::Mov);
        assert!(snap.preview_url.is_some());
        assert_eq!(previews.len(), 1);
    }

    #[test]
    fn test_rejected_file_is_not_retained() {
        let (mut session, previews) = session();
        session.select(upload("clip.mp4", 1)).unwrap();

        let err = session.select(upload("notes.txt", 1)).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedFormat");

        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Idle);
        assert!(snap.file.is_none());
        assert!(snap.preview_url.is_none());
        assert_eq!(snap.error.unwrap().kind, "UnsupportedFormat");
        assert!(previews.is_empty());
    }

    #[test]
    fn test_valid_selection_clears_stale_error() {
        let (mut session, _) = session();
        session.select(upload("big.mp4", MAX_UPLOAD_BYTES + 1)).unwrap_err();
        assert_eq!(session.snapshot().error.unwrap().kind, "FileTooLarge");

        session.select(upload("small.mp4", MAX_UPLOAD_BYTES)).unwrap();
        assert!(session.snapshot().error.is_none());
    }

    #[test]
    fn test_reselect_releases_previous_preview() {
        let (mut session, previews) = session();
        session.select(upload("a.mp4", 1)).unwrap();
        let first = session.state().selection().unwrap().preview().id();

        session.select(upload("b.avi", 1)).unwrap();
        assert!(previews.get(&first).is_none());
        assert_eq!(previews.len(), 1);
    }

    #[test]
    fn test_reselect_clears_previous_result() {
        let (mut session, _) = session();
        session.select(upload("a.mp4", 1)).unwrap();
        let submission = session.begin_submit().unwrap();
        session.complete(submission.attempt, Ok("done".to_string()));

        session.select(upload("b.mp4", 1)).unwrap();
        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Selected);
        assert!(snap.result.is_none());
    }

    #[test]
    fn test_select_refused_while_busy() {
        let (mut session, _) = session();
        session.select(upload("a.mp4", 1)).unwrap();
        session.begin_submit().unwrap();

        assert_eq!(
            session.select(upload("b.mp4", 1)).unwrap_err(),
            SessionError::Busy
        );
        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Submitting);
        assert_eq!(snap.file.unwrap().name, "a.mp4");
        assert!(!snap.can_select);
    }

    // ==================== submit / complete ====================

    #[test]
    fn test_begin_submit_without_file() {
        let (mut session, _) = session();
        assert_eq!(session.begin_submit().unwrap_err(), SessionError::NoFile);
        assert_eq!(session.snapshot().phase, Phase::Idle);
    }

    #[test]
    fn test_begin_submit_twice_is_busy() {
        let (mut session, _) = session();
        session.select(upload("a.mp4", 1)).unwrap();
        let first = session.begin_submit().unwrap();
        assert_eq!(first.attempt, 1);
        assert_eq!(session.begin_submit().unwrap_err(), SessionError::Busy);
        assert!(session.is_busy());
    }

    #[test]
    fn test_complete_success_and_failure_are_exclusive() {
        let (mut session, _) = session();
        session.select(upload("a.mp4", 1)).unwrap();

        let s = session.begin_submit().unwrap();
        assert!(session.complete(s.attempt, Err(AnalysisError::EmptyResult)));
        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Failed);
        assert_eq!(snap.error.unwrap().message, "no analysis result received");
        assert!(snap.result.is_none());
        assert!(snap.can_submit);

        let s = session.begin_submit().unwrap();
        assert_eq!(s.attempt, 2);
        assert!(session.complete(s.attempt, Ok("text".to_string())));
        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Succeeded);
        assert_eq!(snap.result.as_deref(), Some("text"));
        assert!(snap.error.is_none());
        assert!(snap.completed_at.is_some());
        assert!(snap.preview_url.is_some());
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let (mut session, _) = session();
        session.select(upload("a.mp4", 1)).unwrap();
        let s = session.begin_submit().unwrap();

        assert!(!session.complete(s.attempt + 1, Ok("stale".to_string())));
        assert!(session.is_busy());

        assert!(session.complete(s.attempt, Ok("fresh".to_string())));
        assert!(!session.complete(s.attempt, Ok("again".to_string())));
        assert_eq!(session.snapshot().result.as_deref(), Some("fresh"));
    }

    #[test]
    fn test_dropping_session_releases_preview() {
        let (mut session, previews) = session();
        session.select(upload("a.mp4", 1)).unwrap();
        assert_eq!(previews.len(), 1);
        drop(session);
        assert!(previews.is_empty());
    }

    // ==================== run_submission ====================

    #[tokio::test]
    async fn test_run_submission_records_result() {
        let (mut inner, _) = session();
        inner.select(upload("clip.mov", 10 * 1024 * 1024)).unwrap();
        let session = Mutex::new(inner);

        let analyzer = MockAnalyzer::ok("Analysis...");
        assert!(run_submission(&session, &analyzer).await.unwrap());

        let snap = session.lock().snapshot();
        assert!(!snap.busy);
        assert_eq!(snap.result.as_deref(), Some("Analysis..."));
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_run_submission_records_error() {
        let (mut inner, _) = session();
        inner.select(upload("clip.mp4", 5)).unwrap();
        let session = Mutex::new(inner);

        let analyzer = MockAnalyzer::failing(AnalysisError::RequestFailed {
            status: Some(429),
            message: "quota exceeded".to_string(),
        });
        run_submission(&session, &analyzer).await.unwrap();

        let snap = session.lock().snapshot();
        assert_eq!(snap.phase, Phase::Failed);
        let error = snap.error.unwrap();
        assert_eq!(error.kind, "RequestFailed");
        assert!(error.message.contains("quota exceeded"));
        assert!(snap.result.is_none());
    }

    #[tokio::test]
    async fn test_submit_while_busy_sends_one_request() {
        let (mut inner, _) = session();
        inner.select(upload("clip.mp4", 5)).unwrap();
        let session = Arc::new(Mutex::new(inner));

        let gate = Arc::new(tokio::sync::Notify::new());
        let analyzer = Arc::new(MockAnalyzer::ok("done").gated(Arc::clone(&gate)));

        let first = {
            let session = Arc::clone(&session);
            let analyzer = Arc::clone(&analyzer);
            tokio::spawn(async move { run_submission(&session, analyzer.as_ref()).await })
        };

        while analyzer.call_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(session.lock().is_busy());

        let second = run_submission(&session, analyzer.as_ref()).await;
        assert_eq!(second.unwrap_err(), SessionError::Busy);
        assert_eq!(analyzer.call_count(), 1);

        gate.notify_one();
        assert!(first.await.unwrap().unwrap());
        assert_eq!(analyzer.call_count(), 1);
        assert_eq!(session.lock().snapshot().result.as_deref(), Some("done"));
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let (mut session, _) = session();
        session.select(upload("a.mp4", 1)).unwrap();
        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(json["phase"], "selected");
        assert_eq!(json["canSubmit"], true);
        assert_eq!(json["file"]["format"], "mp4");
        assert!(json["previewUrl"].as_str().unwrap().starts_with("/preview/"));
    }
}
