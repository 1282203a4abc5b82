//! Session pool management for reusable capture sessions
//!
//! Sessions are created on demand without an upper bound; only the idle list
//! is bounded. A session re-enters the idle list only after a successful
//! reset, so a session that failed mid-use is never handed out again.

use crate::automation::{AutomationSession, RequestFilter};
use crate::engine::EngineManager;
use crate::error::{ShowcaseError, ShowcaseResult};
use crate::metrics::Metrics;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A live automation session owned by whoever acquired it
pub struct CaptureSession {
    id: String,
    inner: Box<dyn AutomationSession>,
    created_at: Instant,
    last_used: Instant,
    capture_count: usize,
}

impl CaptureSession {
    fn new(inner: Box<dyn AutomationSession>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            inner,
            created_at: Instant::now(),
            last_used: Instant::now(),
            capture_count: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The underlying automation session.
    pub fn page(&self) -> &dyn AutomationSession {
        self.inner.as_ref()
    }

    fn mark_used(&mut self) {
        self.last_used = Instant::now();
        self.capture_count += 1;
    }

    pub fn capture_count(&self) -> usize {
        self.capture_count
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn idle_time(&self) -> Duration {
        self.last_used.elapsed()
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("capture_count", &self.capture_count)
            .field("age", &self.age())
            .finish()
    }
}

pub struct SessionPool {
    engine: Arc<EngineManager>,
    idle: Mutex<Vec<CaptureSession>>,
    max_idle: usize,
    filter: RequestFilter,
    created: AtomicUsize,
    discarded: AtomicUsize,
    metrics: Arc<Metrics>,
}

impl SessionPool {
    pub fn new(
        engine: Arc<EngineManager>,
        max_idle: usize,
        filter: RequestFilter,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            engine,
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            filter,
            created: AtomicUsize::new(0),
            discarded: AtomicUsize::new(0),
            metrics,
        }
    }

    pub fn engine(&self) -> &Arc<EngineManager> {
        &self.engine
    }

    /// Hands out an idle session, or creates a new one.
    pub async fn acquire(&self) -> ShowcaseResult<CaptureSession> {
        let pooled = self.idle.lock().await.pop();
        if let Some(mut session) = pooled {
            session.mark_used();
            debug!("Reusing pooled session {}", session.id());
            return Ok(session);
        }

        let engine = self.engine.get_engine().await?;
        let inner = engine.new_session().await.map_err(|e| match e {
            ShowcaseError::SessionCreation(_) => e,
            other => ShowcaseError::SessionCreation(other.to_string()),
        })?;

        if let Err(e) = inner.intercept_requests(self.filter.clone()).await {
            let _ = inner.close().await;
            return Err(ShowcaseError::SessionCreation(format!(
                "request filter setup failed: {e}"
            )));
        }

        let mut session = CaptureSession::new(inner);
        session.mark_used();
        self.created.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_session_created();
        debug!("Created capture session {}", session.id());
        Ok(session)
    }

    /// Returns a session after successful use.
    ///
    /// The session is reset and pooled if there is room; otherwise, or if
    /// the reset fails, it is closed.
    pub async fn release(&self, session: CaptureSession) {
        let full = self.idle.lock().await.len() >= self.max_idle;
        if full {
            self.discard(session, "idle pool full").await;
            return;
        }

        if let Err(e) = session.page().reset().await {
            warn!("Resetting session {} failed: {}", session.id(), e);
            self.discard(session, "reset failed").await;
            return;
        }

        let mut idle = self.idle.lock().await;
        if idle.len() < self.max_idle {
            debug!("Session {} returned to pool", session.id());
            idle.push(session);
            return;
        }
        drop(idle);
        self.discard(session, "idle pool full").await;
    }

    /// Closes a session without pooling it.
    pub async fn discard(&self, session: CaptureSession, reason: &str) {
        debug!("Discarding session {} ({})", session.id(), reason);
        if let Err(e) = session.page().close().await {
            warn!("Closing session {} failed: {}", session.id(), e);
        }
        self.discarded.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_session_discarded();
    }

    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }

    pub async fn get_stats(&self) -> SessionPoolStats {
        SessionPoolStats {
            idle_sessions: self.idle_count().await,
            max_idle: self.max_idle,
            sessions_created: self.created.load(Ordering::Relaxed),
            sessions_discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    /// Disposes every pooled session, then the engine itself. The engine is
    /// launched again on the next `acquire`.
    pub async fn close_engine(&self) -> ShowcaseResult<()> {
        let sessions: Vec<CaptureSession> = self.idle.lock().await.drain(..).collect();
        info!("Closing {} pooled sessions", sessions.len());
        for session in sessions {
            self.discard(session, "engine shutdown").await;
        }
        self.engine.shutdown().await
    }
}

#[derive(Debug, Clone)]
pub struct SessionPoolStats {
    pub idle_sessions: usize,
    pub max_idle: usize,
    pub sessions_created: usize,
    pub sessions_discarded: usize,
}
