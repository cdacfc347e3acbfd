//! Lesson catalogue loaded from a JSON question bank.
//!
//! The file is an array of lessons. Each lesson lists raw question entries in video order;
//! consecutive entries that share a timestamp are the difficulty variants of one question.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::difficulty::types::Difficulty;

#[derive(Debug, Error)]
pub enum LessonError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid answer '{answer}' for question at {timestamp}s with {options} options")]
    InvalidAnswer {
        answer: String,
        timestamp: u32,
        options: usize,
    },
    #[error("invalid difficulty '{0}'")]
    InvalidDifficulty(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Deserialize)]
struct RawLesson {
    id: String,
    title: String,
    #[serde(default, rename = "thumbnailFileName")]
    thumbnail_file_name: Option<String>,
    #[serde(default)]
    video_file: Option<String>,
    #[serde(default)]
    questions: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    question: RawQuestion,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    text: String,
    options: Vec<String>,
    answer: String,
    #[serde(default)]
    detailed_answer: String,
    difficulty: String,
}

/// One tier of a question. `options[0]` is always the correct option.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyVariant {
    pub difficulty: Difficulty,
    pub text: String,
    pub options: Vec<String>,
    pub detailed_answer: String,
    pub tags: Vec<String>,
}

impl DifficultyVariant {
    pub fn correct_option(&self) -> Option<&str> {
        self.options.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub timestamp_secs: u32,
    pub variants: Vec<DifficultyVariant>,
}

impl Question {
    fn new(timestamp_secs: u32) -> Self {
        Self {
            timestamp_secs,
            variants: Vec::new(),
        }
    }

    /// First variant with the requested tier, else the first variant.
    pub fn variant(&self, difficulty: Difficulty) -> Option<&DifficultyVariant> {
        self.variants
            .iter()
            .find(|v| v.difficulty == difficulty)
            .or_else(|| self.variants.first())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub thumbnail_file_name: Option<String>,
    pub video_file: Option<String>,
    pub questions: Vec<Question>,
}

impl Lesson {
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

/// One learner's answers within a lesson, keyed by question index. A re-answer replaces
/// the earlier result.
#[derive(Debug, Clone, Default)]
pub struct LessonProgress {
    answers: BTreeMap<usize, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummary {
    pub correct: usize,
    pub answered: usize,
    pub total: usize,
}

impl LessonProgress {
    pub fn record(&mut self, question_index: usize, correct: bool) {
        self.answers.insert(question_index, correct);
    }

    pub fn summary(&self, total: usize) -> LessonSummary {
        LessonSummary {
            correct: self.answers.values().filter(|c| **c).count(),
            answered: self.answers.len(),
            total,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonListing {
    pub id: String,
    pub title: String,
    pub thumbnail_file_name: Option<String>,
    pub video_file: Option<String>,
    pub question_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LessonCatalog {
    lessons: Vec<Lesson>,
}

impl LessonCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LessonError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let catalog = Self::from_json(&raw)?;
        tracing::info!(
            path = %path.as_ref().display(),
            lessons = catalog.len(),
            "Lesson catalogue loaded"
        );
        Ok(catalog)
    }

    pub fn from_json(raw: &str) -> Result<Self, LessonError> {
        let raw_lessons: Vec<RawLesson> = serde_json::from_str(raw)?;
        let lessons = raw_lessons
            .into_iter()
            .map(build_lesson)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { lessons })
    }

    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<&Lesson, LessonError> {
        self.lessons
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| LessonError::NotFound(format!("lesson {id}")))
    }

    pub fn listings(&self) -> Vec<LessonListing> {
        self.lessons
            .iter()
            .map(|l| LessonListing {
                id: l.id.clone(),
                title: l.title.clone(),
                thumbnail_file_name: l.thumbnail_file_name.clone(),
                video_file: l.video_file.clone(),
                question_count: l.questions.len(),
            })
            .collect()
    }
}

fn build_lesson(raw: RawLesson) -> Result<Lesson, LessonError> {
    let mut questions: Vec<Question> = Vec::new();
    let mut previous: Option<Option<String>> = None;

    for entry in raw.questions {
        let starts_new = match &previous {
            Some(prev) => *prev != entry.timestamp,
            None => true,
        };
        if starts_new {
            questions.push(Question::new(timestamp_to_seconds(entry.timestamp.as_deref())));
        }
        previous = Some(entry.timestamp.clone());

        if let Some(current) = questions.last_mut() {
            let variant = build_variant(entry, current.timestamp_secs)?;
            current.variants.push(variant);
        }
    }

    Ok(Lesson {
        id: raw.id,
        title: raw.title,
        thumbnail_file_name: raw.thumbnail_file_name,
        video_file: raw.video_file,
        questions,
    })
}

fn build_variant(entry: RawEntry, timestamp: u32) -> Result<DifficultyVariant, LessonError> {
    let RawQuestion {
        text,
        options,
        answer,
        detailed_answer,
        difficulty,
    } = entry.question;

    let difficulty: Difficulty = difficulty
        .parse()
        .map_err(|_| LessonError::InvalidDifficulty(difficulty.clone()))?;
    let correct = answer_index(&answer)
        .filter(|idx| *idx < options.len())
        .ok_or_else(|| LessonError::InvalidAnswer {
            answer: answer.clone(),
            timestamp,
            options: options.len(),
        })?;

    Ok(DifficultyVariant {
        difficulty,
        text,
        options: correct_first(options, correct),
        detailed_answer,
        tags: entry.tags,
    })
}

fn answer_index(answer: &str) -> Option<usize> {
    match answer.trim().to_ascii_uppercase().as_str() {
        "A" => Some(0),
        "B" => Some(1),
        "C" => Some(2),
        "D" => Some(3),
        _ => None,
    }
}

fn correct_first(mut options: Vec<String>, correct: usize) -> Vec<String> {
    let answer = options.remove(correct);
    options.insert(0, answer);
    options
}

/// `h:m:s` or `m:s` to seconds. Missing or malformed timestamps are 0.
pub fn timestamp_to_seconds(timestamp: Option<&str>) -> u32 {
    let Some(raw) = timestamp else {
        return 0;
    };
    let parts: Option<Vec<u32>> = raw.split(':').map(|p| p.trim().parse().ok()).collect();
    match parts.as_deref() {
        Some([h, m, s]) => h
            .saturating_mul(3600)
            .saturating_add(m.saturating_mul(60))
            .saturating_add(*s),
        Some([m, s]) => m.saturating_mul(60).saturating_add(*s),
        _ => 0,
    }
}
