use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use super::types::*;
use super::{Assistant, ChatTurn, LlmError, RankSuggestion};
use crate::models::Task;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_RANK_MODEL: &str = "gpt-4";

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const CHAT_TEMPERATURE: f32 = 0.7;
const CHAT_MAX_TOKENS: u32 = 1000;
const RANK_TEMPERATURE: f32 = 0.3;

const RANK_SYSTEM_PROMPT: &str = "You are a productivity assistant that prioritizes to-do items. \
Reply with JSON only.";

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    /// Without a key every call fails with [`LlmError::NotConfigured`].
    pub api_key: Option<String>,
    pub rank_model: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            rank_model: DEFAULT_RANK_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl LlmConfig {
    /// Load from `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `VECTAL_RANK_MODEL`
    /// and `VECTAL_LLM_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let timeout_secs = std::env::var("VECTAL_LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            rank_model: std::env::var("VECTAL_RANK_MODEL")
                .unwrap_or_else(|_| DEFAULT_RANK_MODEL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

pub struct OpenAiAssistant {
    client: Client,
    config: LlmConfig,
}

impl OpenAiAssistant {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Http(format!("Failed to create HTTP client: {e}")))?;

        info!(
            "Completion API at {} (rank model {}, key {})",
            config.base_url,
            config.rank_model,
            if config.api_key.is_some() { "set" } else { "missing" }
        );

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest<'_>,
    ) -> Result<String, LlmError> {
        let api_key = self.config.api_key.as_ref().ok_or(LlmError::NotConfigured)?;
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ErrorResponse>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Completion API returned {}: {}", status, message);
            return Err(LlmError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| self.request_error(e))?;

        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }

    fn request_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.config.timeout)
        } else if e.is_decode() {
            LlmError::Malformed(e.to_string())
        } else {
            LlmError::Http(e.to_string())
        }
    }
}

/// Ranking prompt: one line per task, addressed by zero-based index.
pub(super) fn ranking_prompt(tasks: &[Task]) -> String {
    let mut prompt = String::from(
        "Analyze the following tasks and assign each a priority score from 0 to 100, \
         where 100 is most urgent. Consider due dates, stated priority and status.\n\n",
    );

    for (index, task) in tasks.iter().enumerate() {
        prompt.push_str(&format!(
            "{index}. {} | description: {} | priority: {} | status: {} | due: {}\n",
            task.title,
            task.description.as_deref().unwrap_or("none"),
            task.priority.as_str(),
            task.status.as_str(),
            task.due_date
                .map(|due| due.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "none".to_string()),
        ));
    }

    prompt.push_str(
        "\nReturn a JSON array of objects with fields \"index\" (the task number above) \
         and \"priority\" (the score). Example: [{\"index\": 0, \"priority\": 85}]",
    );
    prompt
}

#[async_trait]
impl Assistant for OpenAiAssistant {
    async fn rank_tasks(&self, tasks: &[Task]) -> Result<Vec<RankSuggestion>, LlmError> {
        if tasks.is_empty() {
            return Ok(vec![]);
        }

        let prompt = ranking_prompt(tasks);
        debug!("Ranking {} tasks with {}", tasks.len(), self.config.rank_model);

        let request = ChatCompletionRequest {
            model: &self.config.rank_model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: RANK_SYSTEM_PROMPT,
                },
                WireMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: Some(RANK_TEMPERATURE),
            max_tokens: None,
        };

        let reply = self.chat_completion(&request).await?;
        let suggestions = parse_rankings(&reply)?;
        debug!("Ranking reply yielded {} suggestions", suggestions.len());
        Ok(suggestions)
    }

    async fn complete(&self, model: &str, turns: &[ChatTurn]) -> Result<String, LlmError> {
        let request = ChatCompletionRequest {
            model,
            messages: turns
                .iter()
                .map(|turn| WireMessage {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
            temperature: Some(CHAT_TEMPERATURE),
            max_tokens: Some(CHAT_MAX_TOKENS),
        };

        let reply = self.chat_completion(&request).await?;
        debug!("Chat reply length {}", reply.len());
        Ok(reply)
    }
}
