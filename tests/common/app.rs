use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::broadcast;

use adaptive_difficulty::config::{Config, EngineEnvConfig};
use adaptive_difficulty::difficulty::config::EngineConfig;
use adaptive_difficulty::lesson::LessonCatalog;
use adaptive_difficulty::routes::build_router;
use adaptive_difficulty::sessions::SessionRegistry;
use adaptive_difficulty::state::AppState;

pub const LESSONS_JSON: &str = r#"[
  {
    "id": "d2-s1",
    "title": "Correlation vs Causation",
    "questions": [
      {"timestamp": "0:30", "question": {"text": "Which is easy?",
        "options": ["no", "yes", "maybe", "never"], "answer": "B",
        "detailed_answer": "it is", "difficulty": "easy"}},
      {"timestamp": "0:30", "question": {"text": "Which is hard?",
        "options": ["no", "maybe", "never", "yes"], "answer": "D",
        "detailed_answer": "it is", "difficulty": "hard"}}
    ]
  }
]"#;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub shutdown_tx: broadcast::Sender<()>,
}

fn test_config(max_sessions: usize) -> Config {
    // Built directly so parallel tests never race on process env.
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        lessons_path: None,
        max_sessions,
        session_idle_secs: 1800,
        engine: EngineEnvConfig {
            config_path: None,
            rng_seed: Some(7),
            event_capacity: Some(16),
        },
    }
}

pub fn spawn_with_limit(max_sessions: usize) -> TestApp {
    let config = test_config(max_sessions);
    let lessons = LessonCatalog::from_json(LESSONS_JSON).expect("fixture lessons parse");
    let sessions = Arc::new(
        SessionRegistry::new(
            EngineConfig::from_env(&config.engine),
            config.max_sessions,
            Duration::from_secs(config.session_idle_secs),
        )
        .expect("default engine config is valid"),
    );
    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(sessions, Arc::new(lessons), &config, shutdown_tx.clone());

    TestApp {
        app: build_router(state.clone()),
        state,
        shutdown_tx,
    }
}

pub fn spawn_test_app() -> TestApp {
    spawn_with_limit(100)
}
