use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use crate::difficulty::metrics::MetricsSnapshot;
use crate::difficulty::types::{
    Difficulty, DifficultyDistribution, GameState, ProfileInsights, QuestionContext,
};
use crate::extractors::{JsonBody, PathParams};
use crate::lesson::LessonSummary;
use crate::response::{created, ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/:id", get(get_session).delete(delete_session))
        .route("/:id/next-difficulty", get(next_difficulty))
        .route("/:id/questions", post(present_question))
        .route("/:id/timer", post(start_timer))
        .route("/:id/answers", post(submit_answer))
        .route("/:id/reset", post(reset_session))
        .route("/:id/lessons/:lesson_id/summary", get(lesson_summary))
        .route("/:id/events", get(session_events))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    session_id: String,
    state: GameState,
    insights: ProfileInsights,
    strategies: Vec<MetricsSnapshot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NextDifficultyView {
    difficulty: Difficulty,
    distribution: DifficultyDistribution,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresentQuestionRequest {
    difficulty: String,
    question_text: Option<String>,
    correct_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    correct: bool,
    selected_option: Option<String>,
    lesson_id: Option<String>,
    question_index: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LessonSummaryView {
    lesson_id: String,
    #[serde(flatten)]
    summary: LessonSummary,
}

pub(crate) fn parse_difficulty(raw: &str) -> Result<Difficulty, AppError> {
    raw.parse::<Difficulty>()
        .map_err(|e| AppError::bad_request("INVALID_DIFFICULTY", &e))
}

async fn create_session(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let (session_id, session) = state.sessions().create().await?;
    let engine = session.engine().lock().await;
    Ok(created(SessionView {
        session_id,
        state: engine.state().clone(),
        insights: engine.insights(),
        strategies: engine.strategy_metrics(),
    }))
}

async fn get_session(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions().get(&id).await?;
    let engine = session.engine().lock().await;
    Ok(ok(SessionView {
        session_id: id,
        state: engine.state().clone(),
        insights: engine.insights(),
        strategies: engine.strategy_metrics(),
    }))
}

async fn delete_session(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
) -> Result<impl IntoResponse, AppError> {
    state.sessions().remove(&id).await?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}

async fn next_difficulty(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions().get(&id).await?;
    let mut engine = session.engine().lock().await;
    let distribution = engine.distribution();
    let difficulty = engine.next_difficulty();
    Ok(ok(NextDifficultyView {
        difficulty,
        distribution,
    }))
}

async fn present_question(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
    JsonBody(req): JsonBody<PresentQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let difficulty = parse_difficulty(&req.difficulty)?;
    let question = req.question_text.map(|text| QuestionContext {
        text,
        correct_answer: req.correct_answer,
    });

    let session = state.sessions().get(&id).await?;
    let mut engine = session.engine().lock().await;
    engine.present_question(difficulty, question);
    Ok(ok(engine.state().clone()))
}

async fn start_timer(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions().get(&id).await?;
    let mut engine = session.engine().lock().await;
    engine.start_question_timer();
    Ok(ok(serde_json::json!({
        "questionStartedAt": engine.profile().question_started_at,
    })))
}

async fn submit_answer(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
    JsonBody(req): JsonBody<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let lesson_ref = match (req.lesson_id, req.question_index) {
        (Some(lesson_id), Some(index)) => {
            let lesson = state.lessons().get(&lesson_id)?;
            if lesson.question(index).is_none() {
                return Err(AppError::not_found(
                    "QUESTION_NOT_FOUND",
                    &format!("lesson {lesson_id} has no question {index}"),
                ));
            }
            Some((lesson_id, index))
        }
        (None, None) => None,
        _ => {
            return Err(AppError::bad_request(
                "INVALID_LESSON_REF",
                "lessonId and questionIndex must be sent together",
            ))
        }
    };

    let session = state.sessions().get(&id).await?;
    let outcome = {
        let mut engine = session.engine().lock().await;
        if let Some(option) = req.selected_option {
            engine.select_option(option);
        }
        engine.handle_answer(req.correct)
    };
    if let Some((lesson_id, index)) = lesson_ref {
        session
            .progress()
            .lock()
            .await
            .entry(lesson_id)
            .or_default()
            .record(index, req.correct);
    }
    Ok(ok(outcome))
}

async fn lesson_summary(
    State(state): State<AppState>,
    PathParams((id, lesson_id)): PathParams<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let total = state.lessons().get(&lesson_id)?.questions.len();
    let session = state.sessions().get(&id).await?;
    let summary = session
        .progress()
        .lock()
        .await
        .get(&lesson_id)
        .map(|p| p.summary(total))
        .unwrap_or(LessonSummary {
            correct: 0,
            answered: 0,
            total,
        });
    Ok(ok(LessonSummaryView { lesson_id, summary }))
}

async fn reset_session(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions().get(&id).await?;
    let mut engine = session.engine().lock().await;
    engine.reset();
    Ok(ok(engine.state().clone()))
}

async fn session_events(
    State(state): State<AppState>,
    PathParams(id): PathParams<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let mut events = state.sessions().get(&id).await?.engine().lock().await.events();
    let mut shutdown_rx = state.shutdown_rx();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(change) => {
                        if let Ok(json) = serde_json::to_string(&change) {
                            yield Ok(Event::default().event("profile_changed").data(json));
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(session_id = %id, skipped, "SSE subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown_rx.recv() => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}
