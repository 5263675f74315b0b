//! Error types for the beacon-monitor crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Invalid simulation plan: {0}")]
    InvalidPlan(String),

    #[error("Simulated operation {id} failed")]
    OperationFailed { id: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
