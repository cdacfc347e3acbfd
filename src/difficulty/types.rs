use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Fixed order used for accumulation when sampling.
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Probability mass over the three tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyDistribution {
    pub easy: f64,
    pub medium: f64,
    pub hard: f64,
}

impl DifficultyDistribution {
    pub const fn new(easy: f64, medium: f64, hard: f64) -> Self {
        Self { easy, medium, hard }
    }

    pub fn get(&self, difficulty: Difficulty) -> f64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    /// Multiplies each channel by its factor. The result is not renormalized.
    pub fn scale(self, easy: f64, medium: f64, hard: f64) -> Self {
        Self {
            easy: self.easy * easy,
            medium: self.medium * medium,
            hard: self.hard * hard,
        }
    }

    pub fn sum(&self) -> f64 {
        self.easy + self.medium + self.hard
    }

    pub fn is_finite(&self) -> bool {
        self.easy.is_finite() && self.medium.is_finite() && self.hard.is_finite()
    }

    /// Returns `None` when the mass is zero, negative or not finite.
    pub fn normalized(self) -> Option<Self> {
        let total = self.sum();
        if !total.is_finite() || total <= 0.0 {
            return None;
        }
        Some(Self {
            easy: self.easy / total,
            medium: self.medium / total,
            hard: self.hard / total,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Difficulty, f64)> + '_ {
        Difficulty::ALL.into_iter().map(move |d| (d, self.get(d)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub difficulty: Difficulty,
    pub correct: bool,
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,
    pub score_change: i32,
    pub question_text: Option<String>,
    pub selected_option: Option<String>,
    pub correct_answer: Option<String>,
}

/// Per-tier correctness windows, each capped independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyByDifficulty {
    pub easy: VecDeque<bool>,
    pub medium: VecDeque<bool>,
    pub hard: VecDeque<bool>,
}

impl AccuracyByDifficulty {
    pub fn get(&self, difficulty: Difficulty) -> &VecDeque<bool> {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }

    pub fn get_mut(&mut self, difficulty: Difficulty) -> &mut VecDeque<bool> {
        match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Medium => &mut self.medium,
            Difficulty::Hard => &mut self.hard,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProfile {
    pub response_times: VecDeque<u64>,
    pub difficulty_history: VecDeque<HistoryRecord>,
    pub accuracy_by_difficulty: AccuracyByDifficulty,
    pub consecutive_correct: u32,
    pub consecutive_wrong: u32,
    pub preferred_difficulty: Option<Difficulty>,
    pub adaptation_rate: f64,
    pub confidence_level: f64,
    pub learning_velocity: f64,
    pub session_started_at: DateTime<Utc>,
    pub question_started_at: Option<DateTime<Utc>>,
}

impl LearnerProfile {
    pub fn new(session_started_at: DateTime<Utc>) -> Self {
        Self {
            response_times: VecDeque::new(),
            difficulty_history: VecDeque::new(),
            accuracy_by_difficulty: AccuracyByDifficulty::default(),
            consecutive_correct: 0,
            consecutive_wrong: 0,
            preferred_difficulty: None,
            adaptation_rate: 0.5,
            confidence_level: 0.5,
            learning_velocity: 0.0,
            session_started_at,
            question_started_at: None,
        }
    }

    pub fn last_record(&self) -> Option<&HistoryRecord> {
        self.difficulty_history.back()
    }
}

impl Default for LearnerProfile {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

/// The question currently on screen, copied into the history record when answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionContext {
    pub text: String,
    pub correct_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub skill_score: i32,
    pub streak: u32,
    pub best_streak: u32,
    pub last_difficulty: Difficulty,
    pub current_difficulty: Difficulty,
    pub current_question: Option<QuestionContext>,
    pub selected_option: Option<String>,
    pub learner_profile: LearnerProfile,
}

impl GameState {
    pub fn new(initial_skill_score: i32, session_started_at: DateTime<Utc>) -> Self {
        Self {
            skill_score: initial_skill_score,
            streak: 0,
            best_streak: 0,
            last_difficulty: Difficulty::Easy,
            current_difficulty: Difficulty::Medium,
            current_question: None,
            selected_option: None,
            learner_profile: LearnerProfile::new(session_started_at),
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(50, Utc::now())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub difficulty: Difficulty,
    pub correct: bool,
    pub response_time_ms: u64,
    pub score_before: i32,
    pub score_after: i32,
    pub score_change: i32,
    pub streak: u32,
    pub best_streak: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInsights {
    pub easy_accuracy: f64,
    pub medium_accuracy: f64,
    pub hard_accuracy: f64,
    pub learning_velocity: f64,
    pub confidence_level: f64,
    pub adaptation_rate: f64,
    pub answered: usize,
}
