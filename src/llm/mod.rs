//! Completion API adapter.
//!
//! [`Assistant`] is the seam between the services and the hosted language
//! model: one call ranks tasks, the other continues a conversation.
//! [`OpenAiAssistant`] talks to any OpenAI-compatible endpoint;
//! [`ScriptedAssistant`] answers from canned data for tests and offline runs.

mod openai;
mod scripted;
mod types;

pub use openai::{LlmConfig, OpenAiAssistant, DEFAULT_BASE_URL, DEFAULT_RANK_MODEL};
pub use scripted::ScriptedAssistant;
pub use types::parse_rankings;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ChatRole, Task};

/// A score suggested for the task at `index` of the list passed to
/// [`Assistant::rank_tasks`]. Higher is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankSuggestion {
    pub index: usize,
    pub score: f64,
}

/// One message of the conversation handed to [`Assistant::complete`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Request failed: {0}")]
    Http(String),

    #[error("Completion API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed completion reply: {0}")]
    Malformed(String),

    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("Completion API key is not configured")]
    NotConfigured,
}

#[async_trait]
pub trait Assistant: Send + Sync {
    /// Suggest scores for `tasks`. Suggestions refer to positions in the slice
    /// and are not guaranteed to be in range.
    async fn rank_tasks(&self, tasks: &[Task]) -> Result<Vec<RankSuggestion>, LlmError>;

    /// Continue a conversation and return the reply text (possibly empty).
    async fn complete(&self, model: &str, turns: &[ChatTurn]) -> Result<String, LlmError>;
}
