use anyhow::Result;
use chrono::Utc;
use rusqlite::Row;
use uuid::Uuid;

use super::{fmt_datetime, parse_datetime, parse_uuid, Database};
use crate::models::{ChatMessage, ChatRole};

const MESSAGE_COLUMNS: &str = "id, user_id, role, content, model, created_at";

fn message_from_row(row: &Row) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: parse_uuid(row.get(0)?),
        user_id: parse_uuid(row.get(1)?),
        role: ChatRole::from_str(&row.get::<_, String>(2)?).unwrap_or(ChatRole::User),
        content: row.get(3)?,
        model: row.get(4)?,
        created_at: parse_datetime(row.get(5)?),
    })
}

impl Database {
    // ============================================================
    // Chat operations
    // ============================================================

    pub fn create_message(
        &self,
        user_id: Uuid,
        role: ChatRole,
        content: &str,
        model: &str,
    ) -> Result<ChatMessage> {
        let conn = self.lock();
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO chat_messages (id, user_id, role, content, model, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                user_id.to_string(),
                role.as_str(),
                content,
                model,
                fmt_datetime(now),
            ),
        )?;

        Ok(ChatMessage {
            id,
            user_id,
            role,
            content: content.to_string(),
            model: model.to_string(),
            created_at: now,
        })
    }

    /// The `limit` most recent messages of the owner, oldest first.
    pub fn get_recent_messages(&self, user_id: Uuid, limit: usize) -> Result<Vec<ChatMessage>> {
        let limit = i64::try_from(limit)?;
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE user_id = ?
             ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))?;

        let mut messages = stmt
            .query_map((user_id.to_string(), limit), message_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// Every message of the owner, oldest first.
    pub fn get_messages(&self, user_id: Uuid) -> Result<Vec<ChatMessage>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE user_id = ?
             ORDER BY created_at ASC, rowid ASC"
        ))?;

        let messages = stmt
            .query_map([user_id.to_string()], message_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// Clear the owner's history. Returns the number of messages removed.
    pub fn delete_messages(&self, user_id: Uuid) -> Result<usize> {
        let conn = self.lock();
        let rows = conn.execute(
            "DELETE FROM chat_messages WHERE user_id = ?",
            [user_id.to_string()],
        )?;
        Ok(rows)
    }
}
