use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use adaptive_difficulty::config::Config;
use adaptive_difficulty::difficulty::config::EngineConfig;
use adaptive_difficulty::lesson::LessonCatalog;
use adaptive_difficulty::logging::{init_tracing, LogConfig};
use adaptive_difficulty::routes::build_router;
use adaptive_difficulty::sessions::{session_sweep_loop, SessionRegistry};
use adaptive_difficulty::state::AppState;
use axum::http::{header, HeaderValue};
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    init_tracing(&LogConfig::from(&config));
    tracing::info!("Starting adaptive-difficulty");

    let engine_config = match EngineConfig::load(&config.engine).await {
        Ok(engine_config) => engine_config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid engine configuration");
            return ExitCode::FAILURE;
        }
    };

    let lessons = match &config.lessons_path {
        Some(path) => match LessonCatalog::load(path).await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Failed to load lesson catalogue");
                return ExitCode::FAILURE;
            }
        },
        None => {
            tracing::info!("LESSONS_PATH not set, serving an empty catalogue");
            LessonCatalog::empty()
        }
    };

    let cors_layer = match build_cors_layer(&config) {
        Ok(layer) => layer,
        Err(e) => {
            tracing::error!(origin = %config.cors_origin, error = %e, "Invalid CORS_ORIGIN");
            return ExitCode::FAILURE;
        }
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let sessions = match SessionRegistry::new(
        engine_config,
        config.max_sessions,
        Duration::from_secs(config.session_idle_secs),
    ) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            tracing::error!(error = %e, "Invalid engine configuration");
            return ExitCode::FAILURE;
        }
    };
    tokio::spawn(session_sweep_loop(sessions.clone(), shutdown_tx.subscribe()));
    let state = AppState::new(sessions, Arc::new(lessons), &config, shutdown_tx.clone());

    let app = build_router(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ));

    let addr = SocketAddr::new(config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind TCP listener");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%addr, "Listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_tx));
    if let Err(e) = server.await {
        tracing::error!(error = %e, "HTTP server crashed");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}

fn build_cors_layer(config: &Config) -> Result<CorsLayer, header::InvalidHeaderValue> {
    let layer = CorsLayer::new()
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_methods(Any);

    if config.cors_origin.trim() == "*" {
        return Ok(layer.allow_origin(Any));
    }
    let origin = config.cors_origin.parse::<HeaderValue>()?;
    Ok(layer.allow_origin(origin))
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
