//! Beacon Loading — one "busy" signal for many concurrent operations.
//!
//! Every outgoing request calls [`LoadingManager::start_loading`] before it is
//! sent and [`LoadingManager::stop_loading`] when it settles, whatever the
//! outcome. Subscribers hear `true` once when the first operation starts and
//! `false` once the last one has finished and the counter stayed at zero for
//! the idle debounce window, so overlapping or back-to-back requests never
//! make an indicator blink.

pub mod error;
pub mod guard;
pub mod manager;
pub mod subscription;

use std::time::Duration;

use beacon_core::LoadingSettings;

pub use error::LoadingError;
pub use guard::LoadingGuard;
pub use manager::LoadingManager;
pub use subscription::{SubscriberId, Subscription};

/// Timings used by a [`LoadingManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadingConfig {
    /// Quiet period after the counter reaches zero before "idle" is delivered.
    pub idle_debounce: Duration,
    /// Extra delay before a deferred "loading" notification is delivered.
    pub busy_delay: Duration,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            idle_debounce: Duration::from_millis(200),
            busy_delay: Duration::ZERO,
        }
    }
}

impl From<&LoadingSettings> for LoadingConfig {
    fn from(settings: &LoadingSettings) -> Self {
        Self {
            idle_debounce: settings.idle_debounce(),
            busy_delay: settings.busy_delay(),
        }
    }
}
