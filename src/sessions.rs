use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::difficulty::config::EngineConfig;
use crate::difficulty::engine::DifficultyEngine;
use crate::lesson::LessonProgress;

pub type SharedSession = Arc<Session>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session limit of {0} reached")]
    LimitReached(usize),
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("engine setup failed: {0}")]
    Engine(String),
}

/// One learner: the difficulty engine plus lesson progress keyed by lesson id.
pub struct Session {
    engine: Mutex<DifficultyEngine>,
    progress: Mutex<HashMap<String, LessonProgress>>,
    last_touched_ms: AtomicU64,
}

impl Session {
    pub fn engine(&self) -> &Mutex<DifficultyEngine> {
        &self.engine
    }

    pub fn progress(&self) -> &Mutex<HashMap<String, LessonProgress>> {
        &self.progress
    }
}

/// Sessions keyed by a v4 UUID. Sessions idle for longer than `idle_ttl` are evicted.
pub struct SessionRegistry {
    config: EngineConfig,
    sessions: RwLock<HashMap<String, SharedSession>>,
    max_sessions: usize,
    idle_ttl: Duration,
    epoch: Instant,
}

impl SessionRegistry {
    pub fn new(
        config: EngineConfig,
        max_sessions: usize,
        idle_ttl: Duration,
    ) -> Result<Self, String> {
        config.validate()?;
        Ok(Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            idle_ttl,
            epoch: Instant::now(),
        })
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn is_idle(&self, session: &Session, now_ms: u64) -> bool {
        let touched = session.last_touched_ms.load(Ordering::Relaxed);
        let ttl_ms = u64::try_from(self.idle_ttl.as_millis()).unwrap_or(u64::MAX);
        now_ms.saturating_sub(touched) > ttl_ms
    }

    pub async fn create(&self) -> Result<(String, SharedSession), SessionError> {
        let engine =
            DifficultyEngine::new(self.config.clone()).map_err(SessionError::Engine)?;

        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            let evicted = self.evict_idle(&mut sessions);
            if evicted > 0 {
                tracing::info!(evicted, "Evicted idle sessions to make room");
            }
        }
        if sessions.len() >= self.max_sessions {
            tracing::warn!(limit = self.max_sessions, "Session limit reached");
            return Err(SessionError::LimitReached(self.max_sessions));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Session {
            engine: Mutex::new(engine),
            progress: Mutex::new(HashMap::new()),
            last_touched_ms: AtomicU64::new(self.now_ms()),
        });
        sessions.insert(id.clone(), session.clone());
        tracing::info!(session_id = %id, active = sessions.len(), "Session created");
        Ok((id, session))
    }

    /// Looks up a live session and marks it as used.
    pub async fn get(&self, id: &str) -> Result<SharedSession, SessionError> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(id)
            .filter(|s| !self.is_idle(s, self.now_ms()))
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.last_touched_ms.store(self.now_ms(), Ordering::Relaxed);
        Ok(session)
    }

    pub async fn remove(&self, id: &str) -> Result<(), SessionError> {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(_) => {
                tracing::info!(session_id = %id, "Session removed");
                Ok(())
            }
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    /// Drops every idle session and returns how many went.
    pub async fn prune_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        self.evict_idle(&mut sessions)
    }

    fn evict_idle(&self, sessions: &mut HashMap<String, SharedSession>) -> usize {
        let now = self.now_ms();
        let before = sessions.len();
        sessions.retain(|_, s| !self.is_idle(s, now));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }
}

pub async fn session_sweep_loop(
    registry: Arc<SessionRegistry>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let period = registry
        .idle_ttl()
        .min(Duration::from_secs(60))
        .max(Duration::from_secs(1));
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let evicted = registry.prune_idle().await;
                if evicted > 0 {
                    tracing::info!(evicted, "Idle sessions swept");
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }
}
