use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::difficulty::types::Difficulty;
use crate::extractors::PathParams;
use crate::lesson::DifficultyVariant;
use crate::response::{ok, AppError};
use crate::routes::sessions::parse_difficulty;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_lessons))
        .route("/:id/questions/:index", get(get_question))
}

#[derive(Debug, Deserialize)]
struct QuestionQuery {
    difficulty: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuestionView<'a> {
    lesson_id: &'a str,
    index: usize,
    timestamp_secs: u32,
    requested: Difficulty,
    variant: &'a DifficultyVariant,
}

async fn list_lessons(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.lessons().listings())
}

async fn get_question(
    State(state): State<AppState>,
    PathParams((lesson_id, index)): PathParams<(String, usize)>,
    Query(q): Query<QuestionQuery>,
) -> Result<impl IntoResponse, AppError> {
    let requested = match q.difficulty.as_deref() {
        Some(raw) => parse_difficulty(raw)?,
        None => Difficulty::Medium,
    };

    let lesson = state.lessons().get(&lesson_id)?;
    let question = lesson.question(index).ok_or_else(|| {
        AppError::not_found(
            "QUESTION_NOT_FOUND",
            &format!("lesson {lesson_id} has no question {index}"),
        )
    })?;
    let variant = question.variant(requested).ok_or_else(|| {
        AppError::not_found(
            "QUESTION_NOT_FOUND",
            &format!("question {index} of lesson {lesson_id} has no variants"),
        )
    })?;

    // The view borrows from `state`; serialize before it goes out of scope.
    let body = serde_json::to_value(QuestionView {
        lesson_id: &lesson.id,
        index,
        timestamp_secs: question.timestamp_secs,
        requested,
        variant,
    })
    .map_err(|e| AppError::internal(&e.to_string()))?;
    Ok(ok(body))
}
