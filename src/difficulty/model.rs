//! Maps a skill score and a learner profile onto a distribution over tiers.
//!
//! The base table is shaped by a fixed, ordered list of pure stages. Stages compound, so the
//! order in [`PIPELINE`] is part of the model's behavior.

use serde::Serialize;

use crate::difficulty::config::SmoothingConfig;
use crate::difficulty::profile::{accuracy, tail};
use crate::difficulty::types::{Difficulty, DifficultyDistribution, LearnerProfile};

/// Read-only view of everything the stages may consult.
#[derive(Debug, Clone, Copy)]
pub struct ModelContext<'a> {
    pub profile: &'a LearnerProfile,
    pub streak: u32,
    pub last_difficulty: Difficulty,
    pub smoothing: &'a SmoothingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RecentPerformance,
    ResponseTime,
    AccuracyPatterns,
    StreakMomentum,
    LearningVelocity,
    Confidence,
    Smoothing,
}

pub const PIPELINE: [Stage; 7] = [
    Stage::RecentPerformance,
    Stage::ResponseTime,
    Stage::AccuracyPatterns,
    Stage::StreakMomentum,
    Stage::LearningVelocity,
    Stage::Confidence,
    Stage::Smoothing,
];

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::RecentPerformance => "recent_performance",
            Stage::ResponseTime => "response_time",
            Stage::AccuracyPatterns => "accuracy_patterns",
            Stage::StreakMomentum => "streak_momentum",
            Stage::LearningVelocity => "learning_velocity",
            Stage::Confidence => "confidence",
            Stage::Smoothing => "smoothing",
        }
    }

    pub fn apply(self, dist: DifficultyDistribution, ctx: &ModelContext<'_>) -> DifficultyDistribution {
        match self {
            Stage::RecentPerformance => recent_performance(dist, ctx.profile),
            Stage::ResponseTime => response_time(dist, ctx.profile),
            Stage::AccuracyPatterns => accuracy_patterns(dist, ctx.profile),
            Stage::StreakMomentum => streak_momentum(dist, ctx),
            Stage::LearningVelocity => learning_velocity(dist, ctx.profile),
            Stage::Confidence => confidence(dist, ctx.profile),
            Stage::Smoothing => smoothing(dist, ctx.profile, ctx.smoothing),
        }
    }
}

/// Base table keyed by skill-score band. Every row sums to 1 with no zero entries.
pub fn base_distribution(skill_score: i32) -> DifficultyDistribution {
    match skill_score {
        s if s <= 20 => DifficultyDistribution::new(0.85, 0.12, 0.03),
        s if s <= 35 => DifficultyDistribution::new(0.75, 0.20, 0.05),
        s if s <= 50 => DifficultyDistribution::new(0.55, 0.35, 0.10),
        s if s <= 65 => DifficultyDistribution::new(0.35, 0.45, 0.20),
        s if s <= 80 => DifficultyDistribution::new(0.20, 0.45, 0.35),
        s if s <= 90 => DifficultyDistribution::new(0.10, 0.35, 0.55),
        _ => DifficultyDistribution::new(0.05, 0.25, 0.70),
    }
}

/// Runs the full pipeline and renormalizes.
pub fn compute_distribution(skill_score: i32, ctx: &ModelContext<'_>) -> DifficultyDistribution {
    compute_with_stages(skill_score, ctx, &PIPELINE)
}

/// Runs only `stages`, in the given order, then renormalizes.
pub fn compute_with_stages(
    skill_score: i32,
    ctx: &ModelContext<'_>,
    stages: &[Stage],
) -> DifficultyDistribution {
    let base = base_distribution(skill_score);
    let raw = stages.iter().fold(base, |dist, stage| {
        let next = stage.apply(dist, ctx);
        if next != dist {
            tracing::trace!(
                stage = stage.as_str(),
                easy = next.easy,
                medium = next.medium,
                hard = next.hard,
                "Stage adjusted distribution"
            );
        }
        next
    });

    match raw.normalized() {
        Some(dist) if dist.is_finite() => {
            tracing::debug!(
                skill_score,
                easy = dist.easy,
                medium = dist.medium,
                hard = dist.hard,
                confidence = ctx.profile.confidence_level,
                learning_velocity = ctx.profile.learning_velocity,
                "Computed difficulty distribution"
            );
            dist
        }
        _ => {
            tracing::warn!(
                skill_score,
                easy = raw.easy,
                medium = raw.medium,
                hard = raw.hard,
                "Degenerate distribution after adjustment, using base table"
            );
            base
        }
    }
}

fn recent_performance(dist: DifficultyDistribution, profile: &LearnerProfile) -> DifficultyDistribution {
    let recent: Vec<bool> = tail(&profile.difficulty_history, 4)
        .map(|r| r.correct)
        .collect();
    if recent.is_empty() {
        return dist;
    }

    let acc = accuracy(&recent);
    let n = recent.len();

    if acc >= 0.75 && n >= 4 {
        let bonus = 1.0 + (acc - 0.75) * 0.8;
        tracing::debug!(accuracy = acc, "Strong recent performance, raising challenge");
        dist.scale(0.85, 0.95, bonus)
    } else if acc <= 0.25 && n >= 3 {
        tracing::debug!(accuracy = acc, "Weak recent performance, providing support");
        dist.scale(1.3, 0.9, 0.7)
    } else if acc > 0.5 && acc < 0.75 {
        dist.scale(1.0, 1.05, 1.0)
    } else {
        dist
    }
}

fn response_time(dist: DifficultyDistribution, profile: &LearnerProfile) -> DifficultyDistribution {
    let times = &profile.response_times;
    if times.len() < 2 {
        return dist;
    }

    let average = times.iter().map(|&t| t as f64).sum::<f64>() / times.len() as f64;
    let recent = tail(times, 2).map(|&t| t as f64).sum::<f64>() / 2.0;

    if recent < average * 0.6 {
        tracing::debug!(recent, average, "Answering faster than usual");
        dist.scale(0.8, 1.0, 1.2)
    } else if recent > average * 1.5 {
        tracing::debug!(recent, average, "Answering slower than usual");
        dist.scale(1.2, 1.0, 0.8)
    } else {
        dist
    }
}

fn accuracy_patterns(dist: DifficultyDistribution, profile: &LearnerProfile) -> DifficultyDistribution {
    let by_tier = &profile.accuracy_by_difficulty;
    let mut dist = dist;

    let easy_count = by_tier.easy.len();
    let easy_acc = accuracy(&by_tier.easy);
    if easy_acc >= 0.85 && easy_count >= 4 {
        let mastery = (1.0 + (easy_acc - 0.85) * 2.0).min(1.5);
        tracing::debug!(accuracy = easy_acc, samples = easy_count, "Easy mastery");
        dist = dist.scale(0.8 / mastery, 1.1, 1.0);
    }

    let medium_count = by_tier.medium.len();
    let medium_acc = accuracy(&by_tier.medium);
    if medium_count >= 3 {
        if medium_acc <= 0.25 {
            tracing::debug!(accuracy = medium_acc, samples = medium_count, "Medium struggle");
            dist = dist.scale(1.4, 0.7, 0.5);
        } else if medium_acc >= 0.8 && medium_count >= 4 {
            tracing::debug!(accuracy = medium_acc, samples = medium_count, "Medium mastery");
            dist = dist.scale(1.0, 0.9, 1.2);
        }
    }

    let hard_count = by_tier.hard.len();
    let hard_acc = accuracy(&by_tier.hard);
    if hard_count >= 3 {
        if hard_acc >= 0.75 {
            tracing::debug!(accuracy = hard_acc, samples = hard_count, "Hard mastery");
            dist = dist.scale(0.85, 1.0, 1.25);
        } else if hard_acc <= 0.2 && hard_count >= 4 {
            tracing::debug!(accuracy = hard_acc, samples = hard_count, "Hard struggle");
            dist = dist.scale(1.0, 1.2, 0.6);
        }
    }

    dist
}

fn streak_momentum(dist: DifficultyDistribution, ctx: &ModelContext<'_>) -> DifficultyDistribution {
    let mut dist = dist;
    let streak = ctx.streak;

    if streak >= 5 {
        let boost = (1.0 + (streak - 4) as f64 * 0.08).min(1.4);
        tracing::debug!(streak, boost, "Hot streak");
        dist = dist.scale(2.0 - boost, 1.0, boost);
    } else if streak >= 3 {
        dist = dist.scale(0.95, 1.0, 1.1);
    }

    let wrong = ctx.profile.consecutive_wrong;
    if wrong >= 3 {
        tracing::debug!(consecutive_wrong = wrong, "Sustained struggle");
        dist = dist.scale(1.5, 1.0, 0.4);
    } else if wrong == 2 {
        dist = dist.scale(1.2, 1.0, 0.8);
    }

    let history = &ctx.profile.difficulty_history;
    let last_failed = history.back().is_some_and(|r| !r.correct);
    if !last_failed {
        return dist;
    }

    let failure_rate = |window: usize, tier: Difficulty| -> Option<f64> {
        let attempts: Vec<bool> = tail(history, window)
            .filter(|r| r.difficulty == tier)
            .map(|r| r.correct)
            .collect();
        if attempts.len() < 2 {
            return None;
        }
        let failures = attempts.iter().filter(|&&c| !c).count();
        Some(failures as f64 / attempts.len() as f64)
    };

    match ctx.last_difficulty {
        Difficulty::Hard => {
            if let Some(rate) = failure_rate(4, Difficulty::Hard).filter(|&r| r >= 0.5) {
                tracing::debug!(failure_rate = rate, "Stepping down from hard");
                dist = dist.scale(1.0, 1.4, 0.4);
            }
        }
        Difficulty::Medium => {
            if let Some(rate) = failure_rate(3, Difficulty::Medium).filter(|&r| r >= 0.67) {
                tracing::debug!(failure_rate = rate, "Stepping down from medium");
                dist = dist.scale(1.3, 0.8, 1.0);
            }
        }
        Difficulty::Easy => {}
    }

    dist
}

fn learning_velocity(dist: DifficultyDistribution, profile: &LearnerProfile) -> DifficultyDistribution {
    let velocity = profile.learning_velocity;
    if velocity > 0.3 {
        dist.scale(0.8, 1.0, 1.2)
    } else if velocity < -0.3 {
        dist.scale(1.2, 1.0, 0.8)
    } else {
        dist
    }
}

fn confidence(dist: DifficultyDistribution, profile: &LearnerProfile) -> DifficultyDistribution {
    let confidence = profile.confidence_level;
    if confidence < 0.3 {
        dist.scale(1.1, 1.0, 0.9)
    } else if confidence > 0.8 {
        dist.scale(0.9, 1.0, 1.1)
    } else {
        dist
    }
}

fn smoothing(
    dist: DifficultyDistribution,
    profile: &LearnerProfile,
    config: &SmoothingConfig,
) -> DifficultyDistribution {
    let history = &profile.difficulty_history;
    if history.len() < config.min_history {
        return dist;
    }

    let recent: Vec<Difficulty> = tail(history, config.window).map(|r| r.difficulty).collect();
    let share = |tier: Difficulty| {
        recent.iter().filter(|&&d| d == tier).count() as f64 / recent.len() as f64
    };

    let keep = 1.0 - config.factor;
    let blend = |current: f64, tier: Difficulty| current * keep + share(tier) * config.factor;

    DifficultyDistribution {
        easy: config.easy_band.clamp(blend(dist.easy, Difficulty::Easy)),
        medium: config.medium_band.clamp(blend(dist.medium, Difficulty::Medium)),
        hard: config.hard_band.clamp(blend(dist.hard, Difficulty::Hard)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::profile::push_bounded;
    use crate::difficulty::types::HistoryRecord;

    fn record(difficulty: Difficulty, correct: bool) -> HistoryRecord {
        HistoryRecord {
            difficulty,
            correct,
            response_time_ms: 1_000,
            score_change: 0,
            question_text: None,
            selected_option: None,
            correct_answer: None,
        }
    }

    fn ctx<'a>(profile: &'a LearnerProfile, smoothing: &'a SmoothingConfig) -> ModelContext<'a> {
        ModelContext {
            profile,
            streak: 0,
            last_difficulty: Difficulty::Easy,
            smoothing,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    const MID: DifficultyDistribution = DifficultyDistribution::new(0.55, 0.35, 0.10);

    #[test]
    fn base_table_bands() {
        assert_eq!(base_distribution(0), DifficultyDistribution::new(0.85, 0.12, 0.03));
        assert_eq!(base_distribution(20), DifficultyDistribution::new(0.85, 0.12, 0.03));
        assert_eq!(base_distribution(21), DifficultyDistribution::new(0.75, 0.20, 0.05));
        assert_eq!(base_distribution(50), MID);
        assert_eq!(base_distribution(65), DifficultyDistribution::new(0.35, 0.45, 0.20));
        assert_eq!(base_distribution(80), DifficultyDistribution::new(0.20, 0.45, 0.35));
        assert_eq!(base_distribution(90), DifficultyDistribution::new(0.10, 0.35, 0.55));
        assert_eq!(base_distribution(100), DifficultyDistribution::new(0.05, 0.25, 0.70));
    }

    #[test]
    fn fresh_profile_leaves_base_untouched() {
        let profile = LearnerProfile::default();
        let smoothing = SmoothingConfig::default();
        let dist = compute_distribution(50, &ctx(&profile, &smoothing));
        assert!(approx(dist.easy, 0.55));
        assert!(approx(dist.medium, 0.35));
        assert!(approx(dist.hard, 0.10));
    }

    #[test]
    fn strong_recent_run_boosts_hard() {
        let mut profile = LearnerProfile::default();
        for _ in 0..4 {
            profile.difficulty_history.push_back(record(Difficulty::Medium, true));
        }
        let out = recent_performance(MID, &profile);
        assert!(approx(out.easy, 0.55 * 0.85));
        assert!(approx(out.medium, 0.35 * 0.95));
        assert!(approx(out.hard, 0.10 * 1.2));
    }

    #[test]
    fn weak_recent_run_needs_three_samples() {
        let mut profile = LearnerProfile::default();
        profile.difficulty_history.push_back(record(Difficulty::Medium, false));
        profile.difficulty_history.push_back(record(Difficulty::Medium, false));
        assert_eq!(recent_performance(MID, &profile), MID);

        profile.difficulty_history.push_back(record(Difficulty::Medium, false));
        let out = recent_performance(MID, &profile);
        assert!(approx(out.easy, 0.55 * 1.3));
        assert!(approx(out.hard, 0.10 * 0.7));
    }

    #[test]
    fn learning_zone_only_nudges_medium_above_half() {
        let mut profile = LearnerProfile::default();
        for correct in [true, true, false, true, false] {
            profile.difficulty_history.push_back(record(Difficulty::Medium, correct));
        }
        // last four: true, false, true, false => 0.5, neutral
        assert_eq!(recent_performance(MID, &profile), MID);

        profile.difficulty_history.push_back(record(Difficulty::Medium, true));
        // last four: false, true, false, true => 0.5 again
        assert_eq!(recent_performance(MID, &profile), MID);

        let mut profile = LearnerProfile::default();
        for correct in [true, true, false] {
            profile.difficulty_history.push_back(record(Difficulty::Medium, correct));
        }
        let out = recent_performance(MID, &profile);
        assert!(approx(out.medium, 0.35 * 1.05));
        assert!(approx(out.easy, 0.55));
    }

    #[test]
    fn fast_answers_shift_toward_hard() {
        let mut profile = LearnerProfile::default();
        for t in [5_000, 5_000, 5_000, 5_000, 1_000, 1_000] {
            profile.response_times.push_back(t);
        }
        let out = response_time(MID, &profile);
        assert!(approx(out.easy, 0.55 * 0.8));
        assert!(approx(out.hard, 0.10 * 1.2));
    }

    #[test]
    fn slow_answers_shift_toward_easy() {
        let mut profile = LearnerProfile::default();
        for t in [1_000, 1_000, 1_000, 1_000, 5_000, 5_000] {
            profile.response_times.push_back(t);
        }
        let out = response_time(MID, &profile);
        assert!(approx(out.easy, 0.55 * 1.2));
        assert!(approx(out.hard, 0.10 * 0.8));
    }

    #[test]
    fn single_response_time_is_neutral() {
        let mut profile = LearnerProfile::default();
        profile.response_times.push_back(100);
        assert_eq!(response_time(MID, &profile), MID);
    }

    #[test]
    fn easy_mastery_scales_with_accuracy() {
        let mut profile = LearnerProfile::default();
        for _ in 0..4 {
            profile.accuracy_by_difficulty.easy.push_back(true);
        }
        let out = accuracy_patterns(MID, &profile);
        let mastery = 1.0 + 0.15 * 2.0;
        assert!(approx(out.easy, 0.55 * 0.8 / mastery));
        assert!(approx(out.medium, 0.35 * 1.1));
    }

    #[test]
    fn medium_buffer_zone_is_neutral() {
        let mut profile = LearnerProfile::default();
        for c in [true, false, true, false] {
            profile.accuracy_by_difficulty.medium.push_back(c);
        }
        assert_eq!(accuracy_patterns(MID, &profile), MID);
    }

    #[test]
    fn medium_struggle_supports_learner() {
        let mut profile = LearnerProfile::default();
        for _ in 0..3 {
            profile.accuracy_by_difficulty.medium.push_back(false);
        }
        let out = accuracy_patterns(MID, &profile);
        assert!(approx(out.easy, 0.55 * 1.4));
        assert!(approx(out.medium, 0.35 * 0.7));
        assert!(approx(out.hard, 0.10 * 0.5));
    }

    #[test]
    fn hard_struggle_requires_four_samples() {
        let mut profile = LearnerProfile::default();
        for _ in 0..3 {
            profile.accuracy_by_difficulty.hard.push_back(false);
        }
        assert_eq!(accuracy_patterns(MID, &profile), MID);
        profile.accuracy_by_difficulty.hard.push_back(false);
        let out = accuracy_patterns(MID, &profile);
        assert!(approx(out.hard, 0.10 * 0.6));
        assert!(approx(out.medium, 0.35 * 1.2));
    }

    #[test]
    fn streak_boost_is_graduated_and_capped() {
        let profile = LearnerProfile::default();
        let smoothing = SmoothingConfig::default();
        let mut c = ctx(&profile, &smoothing);

        c.streak = 6;
        let out = streak_momentum(MID, &c);
        assert!(approx(out.hard, 0.10 * 1.16));
        assert!(approx(out.easy, 0.55 * 0.84));

        c.streak = 20;
        let out = streak_momentum(MID, &c);
        assert!(approx(out.hard, 0.10 * 1.4));
        assert!(approx(out.easy, 0.55 * 0.6));

        c.streak = 3;
        let out = streak_momentum(MID, &c);
        assert!(approx(out.hard, 0.10 * 1.1));
        assert!(approx(out.easy, 0.55 * 0.95));
    }

    #[test]
    fn consecutive_wrong_supports_learner() {
        let mut profile = LearnerProfile::default();
        let smoothing = SmoothingConfig::default();
        profile.consecutive_wrong = 2;
        let out = streak_momentum(MID, &ctx(&profile, &smoothing));
        assert!(approx(out.easy, 0.55 * 1.2));
        assert!(approx(out.hard, 0.10 * 0.8));

        profile.consecutive_wrong = 3;
        let out = streak_momentum(MID, &ctx(&profile, &smoothing));
        assert!(approx(out.easy, 0.55 * 1.5));
        assert!(approx(out.hard, 0.10 * 0.4));
    }

    #[test]
    fn repeated_hard_failures_step_down() {
        let mut profile = LearnerProfile::default();
        let smoothing = SmoothingConfig::default();
        profile.difficulty_history.push_back(record(Difficulty::Hard, true));
        profile.difficulty_history.push_back(record(Difficulty::Hard, false));
        let mut c = ctx(&profile, &smoothing);
        c.last_difficulty = Difficulty::Hard;
        let out = streak_momentum(MID, &c);
        assert!(approx(out.hard, 0.10 * 0.4));
        assert!(approx(out.medium, 0.35 * 1.4));
    }

    #[test]
    fn medium_step_down_threshold_is_literal() {
        let smoothing = SmoothingConfig::default();

        // 2 of 3 medium failures is 0.666.. which stays under 0.67
        let mut profile = LearnerProfile::default();
        for c in [false, true, false] {
            profile.difficulty_history.push_back(record(Difficulty::Medium, c));
        }
        let mut c = ctx(&profile, &smoothing);
        c.last_difficulty = Difficulty::Medium;
        assert_eq!(streak_momentum(MID, &c), MID);

        let mut profile = LearnerProfile::default();
        for c in [true, false, false] {
            profile.difficulty_history.push_back(record(Difficulty::Easy, c));
        }
        profile.difficulty_history[1].difficulty = Difficulty::Medium;
        profile.difficulty_history[2].difficulty = Difficulty::Medium;
        let mut c = ctx(&profile, &smoothing);
        c.last_difficulty = Difficulty::Medium;
        let out = streak_momentum(MID, &c);
        assert!(approx(out.easy, 0.55 * 1.3));
        assert!(approx(out.medium, 0.35 * 0.8));
    }

    #[test]
    fn velocity_and_confidence_thresholds() {
        let mut profile = LearnerProfile::default();
        profile.learning_velocity = 0.31;
        assert!(approx(learning_velocity(MID, &profile).hard, 0.12));
        profile.learning_velocity = -0.31;
        assert!(approx(learning_velocity(MID, &profile).easy, 0.66));
        profile.learning_velocity = 0.3;
        assert_eq!(learning_velocity(MID, &profile), MID);

        profile.confidence_level = 0.2;
        assert!(approx(confidence(MID, &profile).easy, 0.605));
        profile.confidence_level = 0.9;
        assert!(approx(confidence(MID, &profile).hard, 0.11));
        profile.confidence_level = 0.5;
        assert_eq!(confidence(MID, &profile), MID);
    }

    #[test]
    fn smoothing_blends_and_clamps() {
        let mut profile = LearnerProfile::default();
        let smoothing = SmoothingConfig::default();
        for _ in 0..5 {
            push_bounded(&mut profile.difficulty_history, record(Difficulty::Easy, true), 15);
        }
        let out = super::smoothing(MID, &profile, &smoothing);
        // easy: 0.55*0.3 + 1.0*0.7 = 0.865 -> clamped to 0.8
        assert!(approx(out.easy, 0.8));
        // medium: 0.35*0.3 = 0.105
        assert!(approx(out.medium, 0.105));
        // hard: 0.03 -> clamped up to 0.05
        assert!(approx(out.hard, 0.05));
    }

    #[test]
    fn smoothing_skipped_for_short_history() {
        let mut profile = LearnerProfile::default();
        profile.difficulty_history.push_back(record(Difficulty::Easy, true));
        profile.difficulty_history.push_back(record(Difficulty::Easy, true));
        assert_eq!(super::smoothing(MID, &profile, &SmoothingConfig::default()), MID);
    }

    #[test]
    fn pipeline_result_is_normalized() {
        let mut profile = LearnerProfile::default();
        let smoothing = SmoothingConfig::default();
        for (d, c) in [
            (Difficulty::Hard, true),
            (Difficulty::Hard, false),
            (Difficulty::Medium, true),
            (Difficulty::Easy, false),
            (Difficulty::Hard, false),
        ] {
            profile.difficulty_history.push_back(record(d, c));
            profile.accuracy_by_difficulty.get_mut(d).push_back(c);
            profile.response_times.push_back(1_500);
        }
        profile.consecutive_wrong = 1;
        let mut c = ctx(&profile, &smoothing);
        c.last_difficulty = Difficulty::Hard;
        let dist = compute_distribution(72, &c);
        assert!(approx(dist.sum(), 1.0));
        assert!(dist.iter().all(|(_, p)| p > 0.0 && p < 1.0));
    }
}
