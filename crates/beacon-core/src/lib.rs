//! beacon-core: Shared configuration, error handling, and event types for Beacon.
//!
//! This crate provides the foundational types used across all Beacon components:
//! - Loading-state transition events delivered to subscribers
//! - Configuration management (debounce timings, API endpoint)
//! - Common error types

pub mod config;
pub mod error;
pub mod events;

pub use crate::config::{ApiSettings, BeaconConfig, LoadingSettings};
pub use error::BeaconError;
pub use events::{LoadingState, LoadingTransition, TransitionId};
