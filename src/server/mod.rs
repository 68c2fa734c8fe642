//! Web UI server
//!
//! Serves the single-page front-end and the JSON API it drives. Each browser
//! tab creates its own session; analysis attempts run on spawned tasks and
//! the page polls the session until the attempt finishes. Sessions nobody
//! has touched for `server.sessionIdleSecs` are dropped by a background
//! sweep unless an attempt is in flight.
//!
//! | Method | Path                          | Purpose                         |
//! |--------|-------------------------------|---------------------------------|
//! | GET    | `/`                           | the page                        |
//! | GET    | `/health`                     | liveness                        |
//! | POST   | `/api/sessions`               | create a session                |
//! | GET    | `/api/sessions/{id}`          | session snapshot                |
//! | DELETE | `/api/sessions/{id}`          | end a session, release preview  |
//! | PUT    | `/api/sessions/{id}/file`     | multipart upload (field `file`) |
//! | POST   | `/api/sessions/{id}/submit`   | start an analysis attempt       |
//! | GET    | `/preview/{handle}`           | stream the selected clip        |

pub mod handlers;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use uuid::Uuid;

use crate::analysis::VideoAnalyzer;
use crate::config::ServerConfig;
use crate::media::MAX_UPLOAD_BYTES;
use crate::session::{PreviewRegistry, Session};

/// Request body ceiling for uploads: the file ceiling plus room for
/// multipart framing.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES as usize + 1024 * 1024;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address '{0}'")]
    InvalidAddress(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Upper bound on the sweep period.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct SessionEntry {
    session: Arc<Mutex<Session>>,
    last_seen: Mutex<Instant>,
}

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    previews: PreviewRegistry,
    analyzer: Arc<dyn VideoAnalyzer>,
}

impl AppState {
    pub fn new(analyzer: Arc<dyn VideoAnalyzer>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            previews: PreviewRegistry::new(),
            analyzer,
        }
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Drop every session idle since before `now - idle` that has no
    /// attempt in flight. Returns how many were removed.
    pub fn sweep_idle(&self, now: Instant, idle: Duration) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let idle_for = now.saturating_duration_since(*entry.last_seen.lock());
            let keep = idle_for < idle || entry.session.lock().is_busy();
            if !keep {
                tracing::debug!(session = %id, idle_secs = idle_for.as_secs(), "Session expired");
            }
            keep
        });
        before - sessions.len()
    }

    fn create_session(&self) -> Arc<Mutex<Session>> {
        let session = Session::new(self.previews.clone());
        let id = session.id();
        let session = Arc::new(Mutex::new(session));
        let entry = SessionEntry {
            session: Arc::clone(&session),
            last_seen: Mutex::new(Instant::now()),
        };
        self.sessions.write().insert(id, entry);
        tracing::debug!(session = %id, "Session created");
        session
    }

    /// Look up a session and mark it as seen.
    fn session(&self, id: &Uuid) -> Option<Arc<Mutex<Session>>> {
        let sessions = self.sessions.read();
        let entry = sessions.get(id)?;
        *entry.last_seen.lock() = Instant::now();
        Some(Arc::clone(&entry.session))
    }

    fn remove_session(&self, id: &Uuid) -> bool {
        self.sessions.write().remove(id).is_some()
    }
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/sessions", post(handlers::create_session))
        .route(
            "/api/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route(
            "/api/sessions/{id}/file",
            put(handlers::upload_file).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/sessions/{id}/submit", post(handlers::submit))
        .route("/preview/{handle}", get(handlers::preview))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &ServerConfig, analyzer: Arc<dyn VideoAnalyzer>) -> Result<(), ServerError> {
    let raw = format!("{}:{}", config.bind, config.port);
    let addr: SocketAddr = raw
        .parse()
        .map_err(|_| ServerError::InvalidAddress(raw.clone()))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    tracing::info!(address = %addr, analyzer = analyzer.name(), "Starting web UI");

    let state = AppState::new(analyzer);
    let sweeper = tokio::spawn(sweep_sessions(state.clone(), config.session_idle()));

    let app = build_router(state);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    sweeper.abort();
    served?;

    tracing::info!("Web UI stopped");
    Ok(())
}

async fn sweep_sessions(state: AppState, idle: Duration) {
    let mut ticker = tokio::time::interval(idle.min(MAX_SWEEP_INTERVAL));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let removed = state.sweep_idle(Instant::now(), idle);
        if removed > 0 {
            tracing::info!(
                removed,
                remaining = state.session_count(),
                previews = state.previews().len(),
                "Expired idle sessions"
            );
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::MockAnalyzer;
    use crate::media::FileCandidate;
    use bytes::Bytes;

    const IDLE: Duration = Duration::from_secs(30 * 60);

    fn state() -> AppState {
        AppState::new(Arc::new(MockAnalyzer::ok("unused")))
    }

    fn select_clip(session: &Mutex<Session>, name: &str) {
        let candidate =
            FileCandidate::from_upload(Some(name.to_string()), 64 * 1024, Bytes::from_static(b"clip"));
        session.lock().select(candidate).unwrap();
    }

    #[test]
    fn test_sweep_drops_abandoned_sessions_and_previews() {
        let state = state();
        for i in 0..200 {
            let session = state.create_session();
            select_clip(&session, &format!("clip{i}.mp4"));
        }
        assert_eq!(state.session_count(), 200);
        assert_eq!(state.previews().len(), 200);

        assert_eq!(state.sweep_idle(Instant::now(), IDLE), 0);
        assert_eq!(state.session_count(), 200);

        let later = Instant::now() + IDLE + Duration::from_secs(1);
        assert_eq!(state.sweep_idle(later, IDLE), 200);
        assert_eq!(state.session_count(), 0);
        assert!(state.previews().is_empty());
    }

    #[test]
    fn test_sweep_keeps_busy_and_recently_seen_sessions() {
        let state = state();
        let busy = state.create_session();
        select_clip(&busy, "busy.mp4");
        busy.lock().begin_submit().unwrap();
        let busy_id = busy.lock().id();

        let idle = state.create_session();
        select_clip(&idle, "idle.mov");
        drop(idle);

        let start = Instant::now();
        let polled = state.create_session();
        let polled_id = polled.lock().id();
        drop(polled);

        let later = start + IDLE + Duration::from_secs(1);
        // lookups refresh last_seen; simulate a poll just before the sweep
        *state.sessions.read().get(&polled_id).unwrap().last_seen.lock() = later;

        assert_eq!(state.sweep_idle(later, IDLE), 1);
        assert!(state.session(&busy_id).is_some());
        assert!(state.session(&polled_id).is_some());
        assert_eq!(state.previews().len(), 1);
    }

    #[test]
    fn test_lookup_refreshes_last_seen() {
        let state = state();
        let id = state.create_session().lock().id();
        let created = *state.sessions.read().get(&id).unwrap().last_seen.lock();

        std::thread::sleep(Duration::from_millis(5));
        assert!(state.session(&id).is_some());
        let seen = *state.sessions.read().get(&id).unwrap().last_seen.lock();
        assert!(seen > created);
    }

    #[tokio::test]
    async fn test_background_sweep_expires_sessions() {
        let state = state();
        let session = state.create_session();
        select_clip(&session, "clip.avi");
        drop(session);

        let idle = Duration::from_millis(20);
        let sweeper = tokio::spawn(sweep_sessions(state.clone(), idle));

        for _ in 0..50 {
            if state.session_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        sweeper.abort();

        assert_eq!(state.session_count(), 0);
        assert!(state.previews().is_empty());
    }
}
