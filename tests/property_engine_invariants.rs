use std::sync::Arc;

use chrono::Utc;
use proptest::prelude::*;

use adaptive_difficulty::difficulty::config::EngineConfig;
use adaptive_difficulty::difficulty::engine::{DifficultyEngine, ManualClock};
use adaptive_difficulty::difficulty::model::base_distribution;
use adaptive_difficulty::difficulty::strategy::sample;
use adaptive_difficulty::difficulty::types::{AnswerOutcome, Difficulty, DifficultyDistribution};

fn tier() -> impl Strategy<Value = Difficulty> {
    prop_oneof![
        Just(Difficulty::Easy),
        Just(Difficulty::Medium),
        Just(Difficulty::Hard),
    ]
}

fn run(seed: u64, answers: &[(Difficulty, bool, u16)]) -> (DifficultyEngine, Vec<AnswerOutcome>) {
    let clock = ManualClock::new(Utc::now());
    let config = EngineConfig {
        rng_seed: Some(seed),
        ..EngineConfig::default()
    };
    let mut engine =
        DifficultyEngine::with_clock(config, Arc::new(clock.clone())).expect("valid config");
    let mut outcomes = Vec::with_capacity(answers.len());
    for &(difficulty, correct, delay_ms) in answers {
        engine.present_question(difficulty, None);
        clock.advance_ms(i64::from(delay_ms));
        outcomes.push(engine.handle_answer(correct));
    }
    (engine, outcomes)
}

proptest! {
    #[test]
    fn pt_base_rows_sum_to_one(score in -50_i32..200) {
        let dist = base_distribution(score);
        prop_assert!((dist.sum() - 1.0).abs() < 1e-9);
        prop_assert!(dist.iter().all(|(_, p)| p > 0.0));
    }

    #[test]
    fn pt_distribution_is_normalized(
        seed in any::<u64>(),
        answers in prop::collection::vec((tier(), any::<bool>(), 0_u16..30_000), 0..40),
    ) {
        let (engine, _) = run(seed, &answers);
        let dist = engine.distribution();
        prop_assert!(dist.is_finite());
        prop_assert!((dist.sum() - 1.0).abs() < 1e-9);
        prop_assert!(dist.iter().all(|(_, p)| p >= 0.0));
    }

    #[test]
    fn pt_score_stays_in_bounds(
        answers in prop::collection::vec((tier(), any::<bool>(), 0_u16..5_000), 0..60),
    ) {
        let (engine, outcomes) = run(1, &answers);
        for out in &outcomes {
            prop_assert!((0..=100).contains(&out.score_before));
            prop_assert!((0..=100).contains(&out.score_after));
            prop_assert_eq!(out.score_after - out.score_before, out.score_change);
            prop_assert!(out.best_streak >= out.streak);
        }
        let state = engine.state();
        prop_assert!((0..=100).contains(&state.skill_score));
        prop_assert!(state.best_streak >= state.streak);
    }

    #[test]
    fn pt_histories_are_capped(
        answers in prop::collection::vec((tier(), any::<bool>(), 0_u16..5_000), 0..60),
    ) {
        let (engine, _) = run(2, &answers);
        let profile = engine.profile();
        let limits = &engine.config().history;
        prop_assert_eq!(
            profile.response_times.len(),
            answers.len().min(limits.response_times)
        );
        prop_assert_eq!(
            profile.difficulty_history.len(),
            answers.len().min(limits.difficulty_history)
        );
        for tier in Difficulty::ALL {
            prop_assert!(
                profile.accuracy_by_difficulty.get(tier).len() <= limits.accuracy_per_difficulty
            );
        }
    }

    #[test]
    fn pt_next_difficulty_is_a_tier(
        seed in any::<u64>(),
        answers in prop::collection::vec((tier(), any::<bool>(), 0_u16..5_000), 0..20),
    ) {
        let (mut engine, _) = run(seed, &answers);
        let picked = engine.next_difficulty();
        prop_assert!(Difficulty::ALL.contains(&picked));
    }

    #[test]
    fn pt_sample_respects_zero_mass(draw in 0.0_f64..1.0) {
        let only_medium = DifficultyDistribution::new(0.0, 1.0, 0.0);
        prop_assert_eq!(sample(&only_medium, draw.max(f64::MIN_POSITIVE)), Difficulty::Medium);
    }
}
