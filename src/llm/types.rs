//! Wire types for the OpenAI-compatible chat completions endpoint, and the
//! tolerant reader for ranking replies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{LlmError, RankSuggestion};

/// Score used when a ranking entry names a task but carries no usable score.
const DEFAULT_SCORE: f64 = 50.0;

#[derive(Debug, Serialize)]
pub(super) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(super) struct WireMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    pub message: String,
}

/// Accepted shapes of a ranking reply.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RankReply {
    List(Vec<Value>),
    Wrapped(RankWrapper),
}

#[derive(Debug, Deserialize)]
struct RankWrapper {
    #[serde(alias = "tasks", alias = "rankings")]
    priorities: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RankEntry {
    index: Option<Value>,
    task_index: Option<Value>,
    priority: Option<Value>,
    priority_score: Option<Value>,
    score: Option<Value>,
}

impl RankEntry {
    fn normalize(self) -> Option<RankSuggestion> {
        let index = self
            .index
            .as_ref()
            .and_then(as_index)
            .or_else(|| self.task_index.as_ref().and_then(as_index))?;

        let score = [&self.priority, &self.priority_score, &self.score]
            .into_iter()
            .flatten()
            .find_map(as_score)
            .unwrap_or(DEFAULT_SCORE);

        Some(RankSuggestion { index, score })
    }
}

fn as_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .map(|i| i as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Cut the JSON payload out of a reply that may be wrapped in a markdown
/// fence or surrounded by prose.
fn extract_json(reply: &str) -> &str {
    let mut text = reply.trim();

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let body = after.find('\n').map_or(after, |nl| &after[nl + 1..]);
        text = body.rfind("```").map_or(body, |end| &body[..end]).trim();
    }

    let open = text.find(['[', '{']);
    let close = text.rfind([']', '}']);
    match (open, close) {
        (Some(open), Some(close)) if open < close => &text[open..=close],
        _ => text,
    }
}

/// Read a ranking reply into suggestions.
///
/// Accepts a bare array or an object wrapping the array under `priorities`,
/// `tasks` or `rankings`. Entries without a usable non-negative index are
/// dropped; a missing score falls back to 50.
pub fn parse_rankings(reply: &str) -> Result<Vec<RankSuggestion>, LlmError> {
    let payload = extract_json(reply);
    let parsed: RankReply = serde_json::from_str(payload)
        .map_err(|e| LlmError::Malformed(format!("ranking reply is not a ranking list: {e}")))?;

    let entries = match parsed {
        RankReply::List(entries) => entries,
        RankReply::Wrapped(wrapper) => wrapper.priorities,
    };

    Ok(entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<RankEntry>(entry).ok())
        .filter_map(RankEntry::normalize)
        .collect())
}
