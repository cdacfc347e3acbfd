use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::broadcast;

use crate::difficulty::config::EngineConfig;
use crate::difficulty::feedback;
use crate::difficulty::metrics::MetricsSnapshot;
use crate::difficulty::model::{self, ModelContext};
use crate::difficulty::notify::{ChangeKind, Listener, NotificationHub, ProfileChanged};
use crate::difficulty::strategy::{self, DifficultyStrategy, StrategyChain, StrategySlot};
use crate::difficulty::types::*;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for deterministic response times.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        if let Ok(mut now) = self.now.lock() {
            *now += Duration::milliseconds(ms);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Difficulty engine for one learner session.
///
/// Owns the game state and is the only path through which it changes. Not shared across
/// sessions; callers that serve several learners keep one engine per session.
pub struct DifficultyEngine {
    config: EngineConfig,
    state: GameState,
    strategies: StrategyChain,
    hub: NotificationHub,
    rng: StdRng,
    clock: Arc<dyn Clock>,
}

impl DifficultyEngine {
    pub fn new(config: EngineConfig) -> Result<Self, String> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Fails when `config` does not pass [`EngineConfig::validate`].
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, String> {
        config.validate()?;
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let state = GameState::new(config.scoring.initial_skill_score, clock.now());
        let hub = NotificationHub::new(config.event_capacity);
        Ok(Self {
            config,
            state,
            strategies: StrategyChain::new(),
            hub,
            rng,
            clock,
        })
    }

    pub fn with_strategies(
        mut self,
        strategies: impl IntoIterator<Item = (StrategySlot, Box<dyn DifficultyStrategy>)>,
    ) -> Self {
        for (slot, strategy) in strategies {
            self.strategies.register(slot, strategy);
        }
        self
    }

    pub fn register_strategy(&mut self, slot: StrategySlot, strategy: Box<dyn DifficultyStrategy>) {
        self.strategies.register(slot, strategy);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn profile(&self) -> &LearnerProfile {
        &self.state.learner_profile
    }

    pub fn insights(&self) -> ProfileInsights {
        self.state.learner_profile.insights()
    }

    pub fn strategy_metrics(&self) -> Vec<MetricsSnapshot> {
        self.strategies.metrics()
    }

    /// The built-in distribution for the current state.
    pub fn distribution(&self) -> DifficultyDistribution {
        let ctx = ModelContext {
            profile: &self.state.learner_profile,
            streak: self.state.streak,
            last_difficulty: self.state.last_difficulty,
            smoothing: &self.config.smoothing,
        };
        model::compute_distribution(self.state.skill_score, &ctx)
    }

    /// Picks the tier for the next question. Leaves the game state untouched; only the
    /// sampling RNG advances.
    pub fn next_difficulty(&mut self) -> Difficulty {
        if let Some(chosen) = self.strategies.next_difficulty(&self.state) {
            tracing::debug!(
                strategy = %chosen.strategy,
                difficulty = %chosen.difficulty,
                "Difficulty chosen by override strategy"
            );
            return chosen.difficulty;
        }

        let dist = self.distribution();
        let difficulty = strategy::draw_difficulty(&dist, &mut self.rng);
        tracing::debug!(%difficulty, skill_score = self.state.skill_score, "Difficulty sampled");
        difficulty
    }

    pub fn start_question_timer(&mut self) {
        self.state.learner_profile.question_started_at = Some(self.clock.now());
    }

    /// Marks `difficulty` (and optionally the question text) as on screen and starts the timer.
    pub fn present_question(&mut self, difficulty: Difficulty, question: Option<QuestionContext>) {
        self.state.current_difficulty = difficulty;
        self.state.current_question = question;
        self.state.selected_option = None;
        self.start_question_timer();
    }

    pub fn select_option(&mut self, option: impl Into<String>) {
        self.state.selected_option = Some(option.into());
    }

    pub fn handle_answer(&mut self, correct: bool) -> AnswerOutcome {
        let response_time_ms = self.elapsed_since_question_start();
        let outcome =
            feedback::apply_answer(&mut self.state, correct, response_time_ms, &self.config);

        if let Some(name) = self.strategies.forward_answer(
            &self.state,
            correct,
            outcome.difficulty,
            response_time_ms,
        ) {
            tracing::debug!(strategy = %name, "Answer forwarded to override strategy");
        }

        self.hub.notify(self.change_event(ChangeKind::Answer, Some(outcome.clone())));
        outcome
    }

    /// Restores every field of the game state to its initial value. Registered strategies
    /// and subscribers are kept.
    pub fn reset(&mut self) {
        self.state = GameState::new(self.config.scoring.initial_skill_score, self.clock.now());
        tracing::info!("Learner state reset");
        self.hub.notify(self.change_event(ChangeKind::Reset, None));
    }

    pub fn subscribe(&mut self, listener: Listener) {
        self.hub.subscribe(listener);
    }

    pub fn unsubscribe(&mut self, listener: &Listener) -> usize {
        self.hub.unsubscribe(listener)
    }

    pub fn events(&self) -> broadcast::Receiver<ProfileChanged> {
        self.hub.events()
    }

    fn elapsed_since_question_start(&self) -> u64 {
        match self.state.learner_profile.question_started_at {
            Some(started) => (self.clock.now() - started).num_milliseconds().max(0) as u64,
            None => {
                tracing::warn!("Answer received without a running question timer");
                0
            }
        }
    }

    fn change_event(&self, kind: ChangeKind, answer: Option<AnswerOutcome>) -> ProfileChanged {
        ProfileChanged {
            kind,
            skill_score: self.state.skill_score,
            streak: self.state.streak,
            answered: self.state.learner_profile.difficulty_history.len(),
            answer,
            last_difficulty: self.state.last_difficulty,
        }
    }
}
