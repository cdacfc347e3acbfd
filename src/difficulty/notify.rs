//! Change notification for a single engine.
//!
//! Two delivery paths share one trigger:
//! - zero-argument listeners, invoked synchronously in subscription order;
//! - a broadcast channel of [`ProfileChanged`] events for consumers on other tasks.
//!
//! Re-entrancy: listeners run while the engine is exclusively borrowed by the mutating call, so
//! they cannot reach back into the same engine synchronously. A listener that needs fresh
//! engine state should signal another task (or read from [`NotificationHub::events`]) and
//! query the engine after the mutating call has returned. Such follow-up work is therefore
//! always deferred, never processed inside `notify`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::difficulty::types::{AnswerOutcome, Difficulty};

pub type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Answer,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChanged {
    pub kind: ChangeKind,
    pub skill_score: i32,
    pub streak: u32,
    pub answered: usize,
    pub answer: Option<AnswerOutcome>,
    pub last_difficulty: Difficulty,
}

pub struct NotificationHub {
    listeners: Vec<Listener>,
    events: broadcast::Sender<ProfileChanged>,
}

impl NotificationHub {
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            listeners: Vec::new(),
            events,
        }
    }

    /// Appends a listener. Subscribing the same listener twice makes it fire twice.
    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    /// Removes every entry pointing at `listener`. Returns how many were removed.
    pub fn unsubscribe(&mut self, listener: &Listener) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|l| !Arc::ptr_eq(l, listener));
        before - self.listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn events(&self) -> broadcast::Receiver<ProfileChanged> {
        self.events.subscribe()
    }

    pub fn notify(&self, event: ProfileChanged) {
        for (index, listener) in self.listeners.iter().enumerate() {
            if panic::catch_unwind(AssertUnwindSafe(|| listener())).is_err() {
                tracing::warn!(index, "Profile listener panicked");
            }
        }

        // No receivers is the normal case when nobody streams events.
        let _ = self.events.send(event);
    }
}
