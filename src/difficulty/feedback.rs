use crate::difficulty::config::EngineConfig;
use crate::difficulty::profile::{self, push_bounded};
use crate::difficulty::types::{AnswerOutcome, GameState, HistoryRecord};

/// Folds one answer into the state: score, streaks, bounded histories and derived metrics.
/// The answer is scored against `state.current_difficulty`.
pub fn apply_answer(
    state: &mut GameState,
    correct: bool,
    response_time_ms: u64,
    config: &EngineConfig,
) -> AnswerOutcome {
    let difficulty = state.current_difficulty;
    let scoring = &config.scoring;
    let score_before = state.skill_score;

    let raw = if correct {
        score_before + scoring.correct_gain.get(difficulty)
    } else {
        score_before - scoring.wrong_penalty.get(difficulty)
    };
    state.skill_score = raw.clamp(scoring.min_skill_score, scoring.max_skill_score);
    let score_change = state.skill_score - score_before;

    let profile = &mut state.learner_profile;
    if correct {
        state.streak += 1;
        state.best_streak = state.best_streak.max(state.streak);
        profile.consecutive_correct += 1;
        profile.consecutive_wrong = 0;
    } else {
        state.streak = 0;
        profile.consecutive_wrong += 1;
        profile.consecutive_correct = 0;
    }
    state.last_difficulty = difficulty;

    let limits = &config.history;
    push_bounded(&mut profile.response_times, response_time_ms, limits.response_times);
    push_bounded(
        &mut profile.difficulty_history,
        HistoryRecord {
            difficulty,
            correct,
            response_time_ms,
            score_change,
            question_text: state.current_question.as_ref().map(|q| q.text.clone()),
            selected_option: state.selected_option.clone(),
            correct_answer: state
                .current_question
                .as_ref()
                .and_then(|q| q.correct_answer.clone()),
        },
        limits.difficulty_history,
    );
    push_bounded(
        profile.accuracy_by_difficulty.get_mut(difficulty),
        correct,
        limits.accuracy_per_difficulty,
    );

    let conf = &config.confidence;
    if let Some(velocity) = profile::learning_velocity(&profile.difficulty_history, conf.velocity_window) {
        profile.learning_velocity = velocity;
    }
    if let Some(confidence) = profile::confidence_level(&profile.difficulty_history, conf) {
        profile.confidence_level = confidence;
    }
    profile.adaptation_rate = profile::adaptation_rate(
        profile.confidence_level,
        profile.difficulty_history.len(),
        &config.adaptation,
    );

    let insights = profile.insights();
    tracing::info!(
        %difficulty,
        correct,
        response_time_ms,
        skill_score = state.skill_score,
        score_change,
        streak = state.streak,
        learning_velocity = insights.learning_velocity,
        confidence_level = insights.confidence_level,
        easy_accuracy = insights.easy_accuracy,
        medium_accuracy = insights.medium_accuracy,
        hard_accuracy = insights.hard_accuracy,
        "Learner profile updated"
    );

    AnswerOutcome {
        difficulty,
        correct,
        response_time_ms,
        score_before,
        score_after: state.skill_score,
        score_change,
        streak: state.streak,
        best_streak: state.best_streak,
    }
}
