//! Conversation log and assistant replies.

use std::time::Duration;

use uuid::Uuid;

use super::{required, with_timeout};
use crate::db::Database;
use crate::error::Result;
use crate::llm::{Assistant, ChatTurn};
use crate::models::{ChatExchange, ChatMessage, ChatRole, PostMessageInput};

pub const HISTORY_LIMIT: usize = 100;
pub const CONTEXT_WINDOW: usize = 10;
pub const DEFAULT_MODEL: &str = "gpt-4";

pub const SYSTEM_PROMPT: &str = "You are Vectal AI, a helpful assistant for task management \
and productivity. Help users organize their work, break down complex projects, provide \
actionable advice, and boost their productivity. Be concise, practical, and encouraging.";

pub const EMPTY_REPLY: &str = "I apologize, but I could not generate a response.";

/// Upstream model for a requested model name.
pub fn upstream_model(requested: &str) -> &'static str {
    if requested == "gpt-4" {
        "gpt-4"
    } else {
        "gpt-3.5-turbo"
    }
}

/// The most recent messages, oldest first.
pub fn list(db: &Database, owner: Uuid) -> Result<Vec<ChatMessage>> {
    Ok(db.get_recent_messages(owner, HISTORY_LIMIT)?)
}

/// Store the user's message, ask the assistant, store and return the reply.
///
/// The user's message stays stored when the assistant fails.
pub async fn post(
    db: &Database,
    assistant: &dyn Assistant,
    limit: Duration,
    owner: Uuid,
    input: PostMessageInput,
) -> Result<ChatExchange> {
    let content = required(&input.message, "message")?;
    let model = input
        .model
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let user_message = db.create_message(owner, ChatRole::User, &content, &model)?;
    tracing::info!("Stored chat message {} for user {}", user_message.id, owner);

    let mut turns = vec![ChatTurn::new(ChatRole::System, SYSTEM_PROMPT)];
    turns.extend(
        db.get_recent_messages(owner, CONTEXT_WINDOW)?
            .into_iter()
            .map(|m| ChatTurn::new(m.role, m.content)),
    );

    let reply = with_timeout(limit, assistant.complete(upstream_model(&model), &turns))
        .await
        .inspect_err(|e| tracing::error!("Chat completion failed for user {}: {}", owner, e))?;
    let reply = if reply.trim().is_empty() {
        EMPTY_REPLY.to_string()
    } else {
        reply
    };

    let ai_message = db.create_message(owner, ChatRole::Assistant, &reply, &model)?;
    tracing::info!("Stored assistant reply {} for user {}", ai_message.id, owner);

    Ok(ChatExchange {
        user_message,
        ai_message,
    })
}

/// Delete the owner's whole history. Safe to repeat.
pub fn clear(db: &Database, owner: Uuid) -> Result<usize> {
    let deleted = db.delete_messages(owner)?;
    tracing::info!("Cleared {} chat messages for user {}", deleted, owner);
    Ok(deleted)
}
