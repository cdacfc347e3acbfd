use serde::{Deserialize, Serialize};

use crate::difficulty::types::Difficulty;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryLimits {
    pub response_times: usize,
    pub difficulty_history: usize,
    pub accuracy_per_difficulty: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            response_times: 10,
            difficulty_history: 15,
            accuracy_per_difficulty: 8,
        }
    }
}

/// Points added on a correct answer and removed on a wrong one, per tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierPoints {
    pub easy: i32,
    pub medium: i32,
    pub hard: i32,
}

impl TierPoints {
    pub fn get(&self, difficulty: Difficulty) -> i32 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    pub initial_skill_score: i32,
    pub min_skill_score: i32,
    pub max_skill_score: i32,
    pub correct_gain: TierPoints,
    pub wrong_penalty: TierPoints,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            initial_skill_score: 50,
            min_skill_score: 0,
            max_skill_score: 100,
            correct_gain: TierPoints {
                easy: 2,
                medium: 5,
                hard: 8,
            },
            wrong_penalty: TierPoints {
                easy: 2,
                medium: 4,
                hard: 6,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    /// Never panics; an inverted band resolves to `max`.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SmoothingConfig {
    /// History length below which the smoothing stage is skipped.
    pub min_history: usize,
    pub window: usize,
    /// Weight given to the recent tier frequencies.
    pub factor: f64,
    pub easy_band: Band,
    pub medium_band: Band,
    pub hard_band: Band,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            min_history: 3,
            window: 5,
            factor: 0.7,
            easy_band: Band { min: 0.05, max: 0.8 },
            medium_band: Band { min: 0.1, max: 0.6 },
            hard_band: Band { min: 0.05, max: 0.7 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfidenceConfig {
    pub min_history: usize,
    pub window: usize,
    pub accuracy_variance_weight: f64,
    /// Response-time variance (ms²) that maps to zero timing confidence.
    pub timing_variance_scale: f64,
    pub velocity_window: usize,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            min_history: 3,
            window: 5,
            accuracy_variance_weight: 2.0,
            timing_variance_scale: 10_000.0,
            velocity_window: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdaptationConfig {
    pub base: f64,
    pub span: f64,
    /// Answers needed before session progress saturates at 1.
    pub ramp_answers: usize,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            base: 0.3,
            span: 0.4,
            ramp_answers: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub history: HistoryLimits,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub smoothing: SmoothingConfig,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
    #[serde(default)]
    pub adaptation: AdaptationConfig,
    /// Fixed seed for the sampling RNG. `None` seeds from entropy.
    #[serde(default)]
    pub rng_seed: Option<u64>,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history: HistoryLimits::default(),
            scoring: ScoringConfig::default(),
            smoothing: SmoothingConfig::default(),
            confidence: ConfidenceConfig::default(),
            adaptation: AdaptationConfig::default(),
            rng_seed: None,
            event_capacity: default_event_capacity(),
        }
    }
}

impl EngineConfig {
    pub fn from_env(env_config: &crate::config::EngineEnvConfig) -> Self {
        Self::default().with_env_overrides(env_config)
    }

    /// Defaults, then the JSON file at `config_path` if set, then env overrides. The result
    /// is validated.
    pub async fn load(env_config: &crate::config::EngineEnvConfig) -> Result<Self, String> {
        let base = match &env_config.config_path {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| format!("failed to read engine config {path}: {e}"))?;
                tracing::info!(path = %path, "Engine config file loaded");
                Self::from_json(&raw)?
            }
            None => Self::default(),
        };
        let config = base.with_env_overrides(env_config);
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON engine config. Missing sections and fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| format!("invalid engine config: {e}"))
    }

    /// Env values win over file values when set.
    pub fn with_env_overrides(mut self, env_config: &crate::config::EngineEnvConfig) -> Self {
        if let Some(seed) = env_config.rng_seed {
            self.rng_seed = Some(seed);
        }
        if let Some(capacity) = env_config.event_capacity {
            self.event_capacity = capacity;
        }
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.history.response_times == 0
            || self.history.difficulty_history == 0
            || self.history.accuracy_per_difficulty == 0
        {
            return Err("history limits must be > 0".to_string());
        }

        let s = &self.scoring;
        if s.min_skill_score >= s.max_skill_score {
            return Err("scoring.min_skill_score must be < scoring.max_skill_score".to_string());
        }
        if !(s.min_skill_score..=s.max_skill_score).contains(&s.initial_skill_score) {
            return Err("scoring.initial_skill_score must lie within the score bounds".to_string());
        }
        for d in Difficulty::ALL {
            if s.correct_gain.get(d) < 0 || s.wrong_penalty.get(d) < 0 {
                return Err(format!("scoring points for {d} must be >= 0"));
            }
        }

        let sm = &self.smoothing;
        if !(0.0..=1.0).contains(&sm.factor) {
            return Err("smoothing.factor must be in [0,1]".to_string());
        }
        if sm.window == 0 {
            return Err("smoothing.window must be > 0".to_string());
        }
        for (name, band) in [
            ("easy", sm.easy_band),
            ("medium", sm.medium_band),
            ("hard", sm.hard_band),
        ] {
            if band.min <= 0.0 || band.min > band.max || band.max > 1.0 {
                return Err(format!("smoothing.{name}_band must satisfy 0 < min <= max <= 1"));
            }
        }

        let c = &self.confidence;
        if c.window == 0 || c.velocity_window == 0 {
            return Err("confidence windows must be > 0".to_string());
        }
        if c.timing_variance_scale <= 0.0 {
            return Err("confidence.timing_variance_scale must be > 0".to_string());
        }
        if c.accuracy_variance_weight < 0.0 {
            return Err("confidence.accuracy_variance_weight must be >= 0".to_string());
        }

        if self.adaptation.ramp_answers == 0 {
            return Err("adaptation.ramp_answers must be > 0".to_string());
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be > 0".to_string());
        }

        Ok(())
    }
}
