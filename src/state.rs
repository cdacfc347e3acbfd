use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::lesson::LessonCatalog;
use crate::sessions::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<SessionRegistry>,
    lessons: Arc<LessonCatalog>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        lessons: Arc<LessonCatalog>,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            sessions,
            lessons,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn lessons(&self) -> &LessonCatalog {
        &self.lessons
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::difficulty::config::EngineConfig;

    use super::*;

    fn state_with(tx: broadcast::Sender<()>) -> AppState {
        let cfg = Config::from_env();
        let sessions = Arc::new(
            SessionRegistry::new(EngineConfig::default(), 8, Duration::from_secs(60)).unwrap(),
        );
        AppState::new(sessions, Arc::new(LessonCatalog::empty()), &cfg, tx)
    }

    #[tokio::test]
    async fn shutdown_receiver_can_clone() {
        let (tx, _) = broadcast::channel(4);
        let state = state_with(tx.clone());

        let mut rx1 = state.shutdown_rx();
        let mut rx2 = state.shutdown_rx();
        tx.send(()).unwrap();
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();
    }

    #[tokio::test]
    async fn clones_share_sessions() {
        let (tx, _) = broadcast::channel(4);
        let state = state_with(tx);
        let clone = state.clone();

        state.sessions().create().await.unwrap();
        assert_eq!(clone.sessions().len().await, 1);
        assert!(clone.lessons().is_empty());
    }
}
