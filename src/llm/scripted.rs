use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Assistant, ChatTurn, LlmError, RankSuggestion};
use crate::models::Task;

/// In-process [`Assistant`] answering from canned data.
///
/// Records every call so callers can check whether, and with what, the
/// adapter was invoked.
#[derive(Debug, Default)]
pub struct ScriptedAssistant {
    rankings: Vec<RankSuggestion>,
    reply: String,
    failing: bool,
    delay: Option<Duration>,
    rank_calls: Mutex<Vec<usize>>,
    chat_calls: Mutex<Vec<(String, Vec<ChatTurn>)>>,
}

impl ScriptedAssistant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suggestions returned by every ranking call.
    pub fn with_rankings(mut self, rankings: Vec<RankSuggestion>) -> Self {
        self.rankings = rankings;
        self
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = reply.into();
        self
    }

    /// Every call fails with an upstream status error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of tasks passed to each ranking call so far.
    pub fn rank_calls(&self) -> Vec<usize> {
        self.rank_calls.lock().expect("call log poisoned").clone()
    }

    /// Model and conversation of each chat call so far.
    pub fn chat_calls(&self) -> Vec<(String, Vec<ChatTurn>)> {
        self.chat_calls.lock().expect("call log poisoned").clone()
    }

    async fn respond(&self) -> Result<(), LlmError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(LlmError::Status {
                status: 503,
                message: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Assistant for ScriptedAssistant {
    async fn rank_tasks(&self, tasks: &[Task]) -> Result<Vec<RankSuggestion>, LlmError> {
        self.rank_calls
            .lock()
            .expect("call log poisoned")
            .push(tasks.len());
        self.respond().await?;
        Ok(self.rankings.clone())
    }

    async fn complete(&self, model: &str, turns: &[ChatTurn]) -> Result<String, LlmError> {
        self.chat_calls
            .lock()
            .expect("call log poisoned")
            .push((model.to_string(), turns.to_vec()));
        self.respond().await?;
        Ok(self.reply.clone())
    }
}
