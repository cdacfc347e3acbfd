//! Override strategies and the built-in weighted sampler.
//!
//! Strategies are consulted in slot order (hybrid reinforcement, pure reinforcement, enhanced
//! statistical), then registration order within a slot. Every call runs behind a failure
//! boundary: errors and panics become [`StrategyError`] values, are logged, and the chain moves on.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::difficulty::metrics::{CallStatus, MetricsSnapshot, StrategyMetrics};
use crate::difficulty::types::{Difficulty, DifficultyDistribution, GameState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    #[error("operation not supported")]
    Unsupported,
    #[error("strategy failed: {0}")]
    Failed(String),
    #[error("strategy panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategySlot {
    HybridReinforcement,
    PureReinforcement,
    EnhancedStatistical,
}

/// An externally supplied difficulty policy.
///
/// Both methods default to [`StrategyError::Unsupported`], so an implementation may provide
/// only one of them. The engine state is handed out read-only.
pub trait DifficultyStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn next_difficulty(&self, _state: &GameState) -> Result<Difficulty, StrategyError> {
        Err(StrategyError::Unsupported)
    }

    fn update_profile_after_answer(
        &self,
        _state: &GameState,
        _correct: bool,
        _difficulty: Difficulty,
        _response_time_ms: u64,
    ) -> Result<(), StrategyError> {
        Err(StrategyError::Unsupported)
    }
}

struct RegisteredStrategy {
    slot: StrategySlot,
    strategy: Box<dyn DifficultyStrategy>,
    metrics: StrategyMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyOverride {
    pub strategy: String,
    pub difficulty: Difficulty,
}

#[derive(Default)]
pub struct StrategyChain {
    entries: Vec<RegisteredStrategy>,
}

impl fmt::Debug for StrategyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.slot, e.strategy.name())))
            .finish()
    }
}

impl StrategyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, slot: StrategySlot, strategy: Box<dyn DifficultyStrategy>) {
        let at = self
            .entries
            .iter()
            .position(|e| e.slot > slot)
            .unwrap_or(self.entries.len());
        tracing::info!(strategy = strategy.name(), ?slot, position = at, "Registered override strategy");
        self.entries.insert(
            at,
            RegisteredStrategy {
                slot,
                strategy,
                metrics: StrategyMetrics::new(),
            },
        );
    }

    /// First strategy that yields a tier wins. `None` means the caller should sample.
    pub fn next_difficulty(&self, state: &GameState) -> Option<StrategyOverride> {
        self.entries.iter().find_map(|entry| {
            guarded(entry, "next_difficulty", || entry.strategy.next_difficulty(state))
                .ok()
                .map(|difficulty| StrategyOverride {
                    strategy: entry.strategy.name().to_string(),
                    difficulty,
                })
        })
    }

    /// Forwards an answer to the first strategy that handles it. A failure there is logged
    /// and not retried elsewhere. Returns the name of the strategy that was tried.
    pub fn forward_answer(
        &self,
        state: &GameState,
        correct: bool,
        difficulty: Difficulty,
        response_time_ms: u64,
    ) -> Option<String> {
        for entry in &self.entries {
            let result = guarded(entry, "update_profile_after_answer", || {
                entry
                    .strategy
                    .update_profile_after_answer(state, correct, difficulty, response_time_ms)
            });
            match result {
                Err(StrategyError::Unsupported) => continue,
                _ => return Some(entry.strategy.name().to_string()),
            }
        }
        None
    }

    pub fn metrics(&self) -> Vec<MetricsSnapshot> {
        self.entries
            .iter()
            .map(|e| e.metrics.snapshot(e.strategy.name()))
            .collect()
    }
}

fn guarded<T>(
    entry: &RegisteredStrategy,
    op: &'static str,
    call: impl FnOnce() -> Result<T, StrategyError>,
) -> Result<T, StrategyError> {
    let start = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|payload| Err(StrategyError::Panicked(panic_message(payload.as_ref()))));
    let latency_us = start.elapsed().as_micros() as u64;

    let status = match &result {
        Ok(_) => CallStatus::Ok,
        Err(StrategyError::Unsupported) => CallStatus::Unsupported,
        Err(_) => CallStatus::Failed,
    };
    entry.metrics.record(latency_us, status);

    if let Err(e) = &result {
        if status == CallStatus::Failed {
            tracing::warn!(
                strategy = entry.strategy.name(),
                op,
                error = %e,
                "Override strategy unavailable, falling through"
            );
        }
    }
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Weighted pick: accumulates easy, medium, hard and returns the first tier whose running
/// sum reaches `draw`. Falls back to easy if none does.
pub fn sample(dist: &DifficultyDistribution, draw: f64) -> Difficulty {
    let mut cumulative = 0.0;
    for (difficulty, p) in dist.iter() {
        cumulative += p;
        if draw <= cumulative {
            return difficulty;
        }
    }
    Difficulty::Easy
}

pub fn draw_difficulty<R: Rng + ?Sized>(dist: &DifficultyDistribution, rng: &mut R) -> Difficulty {
    sample(dist, rng.gen::<f64>())
}
