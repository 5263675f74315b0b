//! Event types for loading-state transitions.
//!
//! A transition is produced each time subscribers are told the application
//! started or stopped waiting on network activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a delivered transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TransitionId(pub Uuid);

impl TransitionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransitionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two externally observable states of the aggregator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoadingState {
    #[default]
    Idle,
    Loading,
}

impl LoadingState {
    pub fn is_loading(self) -> bool {
        matches!(self, Self::Loading)
    }
}

impl From<bool> for LoadingState {
    fn from(loading: bool) -> Self {
        if loading {
            Self::Loading
        } else {
            Self::Idle
        }
    }
}

impl std::fmt::Display for LoadingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Loading => f.write_str("loading"),
        }
    }
}

/// A transition as delivered to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadingTransition {
    pub id: TransitionId,
    pub state: LoadingState,
    /// Counter value when the notification was delivered.
    pub active_operations: usize,
    pub at: DateTime<Utc>,
}

impl LoadingTransition {
    pub fn new(state: LoadingState, active_operations: usize) -> Self {
        Self {
            id: TransitionId::new(),
            state,
            active_operations,
            at: Utc::now(),
        }
    }
}
