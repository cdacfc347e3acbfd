use std::collections::VecDeque;

use crate::difficulty::config::{AdaptationConfig, ConfidenceConfig};
use crate::difficulty::types::{Difficulty, HistoryRecord, LearnerProfile, ProfileInsights};

/// Appends `value` and evicts from the front until `cap` holds.
pub fn push_bounded<T>(buf: &mut VecDeque<T>, value: T, cap: usize) {
    buf.push_back(value);
    while buf.len() > cap {
        buf.pop_front();
    }
}

/// The last `n` entries, oldest first.
pub fn tail<T>(buf: &VecDeque<T>, n: usize) -> impl Iterator<Item = &T> {
    buf.iter().skip(buf.len().saturating_sub(n))
}

/// Fraction of `true` values; 0.5 when there are none.
pub fn accuracy<'a>(results: impl IntoIterator<Item = &'a bool>) -> f64 {
    let (hits, total) = results
        .into_iter()
        .fold((0usize, 0usize), |(h, t), &c| (h + usize::from(c), t + 1));
    if total == 0 {
        return 0.5;
    }
    hits as f64 / total as f64
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance (divides by n). Sequences shorter than 2 yield 0.
pub fn population_variance(values: &[f64]) -> f64 {
    let m = match mean(values) {
        Some(m) if values.len() >= 2 => m,
        _ => return 0.0,
    };
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Mean score change over the last `window` answers, once that many exist.
pub fn learning_velocity(history: &VecDeque<HistoryRecord>, window: usize) -> Option<f64> {
    if window == 0 || history.len() < window {
        return None;
    }
    let total: i32 = tail(history, window).map(|r| r.score_change).sum();
    Some(total as f64 / window as f64)
}

/// Confidence from the stability of recent correctness and timing.
pub fn confidence_level(
    history: &VecDeque<HistoryRecord>,
    config: &ConfidenceConfig,
) -> Option<f64> {
    if history.len() < config.min_history {
        return None;
    }

    let recent: Vec<&HistoryRecord> = tail(history, config.window).collect();
    let correctness: Vec<f64> = recent
        .iter()
        .map(|r| if r.correct { 1.0 } else { 0.0 })
        .collect();
    let timings: Vec<f64> = recent.iter().map(|r| r.response_time_ms as f64).collect();

    let accuracy_confidence =
        (1.0 - population_variance(&correctness) * config.accuracy_variance_weight).max(0.0);
    let timing_confidence =
        (1.0 - population_variance(&timings) / config.timing_variance_scale).max(0.0);

    Some((accuracy_confidence + timing_confidence) / 2.0)
}

pub fn adaptation_rate(confidence: f64, history_len: usize, config: &AdaptationConfig) -> f64 {
    let progress = (history_len as f64 / config.ramp_answers as f64).min(1.0);
    config.base + confidence * progress * config.span
}

impl LearnerProfile {
    pub fn tier_accuracy(&self, difficulty: Difficulty) -> f64 {
        accuracy(self.accuracy_by_difficulty.get(difficulty))
    }

    pub fn insights(&self) -> ProfileInsights {
        ProfileInsights {
            easy_accuracy: self.tier_accuracy(Difficulty::Easy),
            medium_accuracy: self.tier_accuracy(Difficulty::Medium),
            hard_accuracy: self.tier_accuracy(Difficulty::Hard),
            learning_velocity: self.learning_velocity,
            confidence_level: self.confidence_level,
            adaptation_rate: self.adaptation_rate,
            answered: self.difficulty_history.len(),
        }
    }
}
