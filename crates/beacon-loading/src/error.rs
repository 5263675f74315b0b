//! Error types for the beacon-loading crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadingError {
    #[error("LoadingManager must be created inside a tokio runtime")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, LoadingError>;
