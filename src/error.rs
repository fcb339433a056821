//! Error taxonomy shared by the service layer and the HTTP boundary.

use thiserror::Error;

use crate::llm::LlmError;

/// Errors surfaced by service operations.
///
/// Each variant maps to one HTTP status in `api::error`. `NotFound` is also
/// used when the entity exists but belongs to someone else.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Upstream failure: {0}")]
    Upstream(#[from] LlmError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
