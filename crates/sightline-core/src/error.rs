//! Error taxonomy shared by every sightline-core service.
//!
//! Public service operations never return these directly; they are folded into
//! outcome structs with a human-readable message. Internally every fallible
//! step returns `Result<_, CoreError>` so `?` composes cleanly.

use thiserror::Error;

use crate::generation::GenerationError;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The referenced image does not exist.
    #[error("image not found: {0}")]
    NotFound(String),

    /// Reading or writing an uploaded file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The generation API or the real-time companion failed or answered with
    /// something we could not use.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The upload payload was missing or is not an image.
    #[error("invalid upload: {0}")]
    Validation(String),

    /// Propagated from the SQLite store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<GenerationError> for CoreError {
    fn from(e: GenerationError) -> Self {
        CoreError::Upstream(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        CoreError::Upstream(e.to_string())
    }
}
