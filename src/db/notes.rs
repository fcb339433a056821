use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, TransactionBehavior};
use uuid::Uuid;

use super::{fmt_datetime, from_json, parse_datetime, parse_uuid, to_json, Database};
use crate::models::*;

const NOTE_COLUMNS: &str = "id, user_id, project_id, title, content, tags, linked_tasks, \
     linked_notes, is_pinned, is_archived, version, created_at, updated_at";

fn note_from_row(row: &Row) -> rusqlite::Result<Note> {
    Ok(Note {
        id: parse_uuid(row.get(0)?),
        user_id: parse_uuid(row.get(1)?),
        project_id: row.get::<_, Option<String>>(2)?.map(parse_uuid),
        title: row.get(3)?,
        content: row.get(4)?,
        tags: from_json(row.get(5)?),
        linked_tasks: from_json(row.get(6)?),
        linked_notes: from_json(row.get(7)?),
        is_pinned: row.get(8)?,
        is_archived: row.get(9)?,
        version: row.get(10)?,
        created_at: parse_datetime(row.get(11)?),
        updated_at: parse_datetime(row.get(12)?),
    })
}

fn select_note(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Note>> {
    conn.query_row(
        &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"),
        [id.to_string()],
        note_from_row,
    )
    .optional()
}

impl Database {
    // ============================================================
    // Note operations
    // ============================================================

    /// Every note of the owner, most recently updated first.
    pub fn get_notes(&self, user_id: Uuid) -> Result<Vec<Note>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id = ? ORDER BY updated_at DESC"
        ))?;

        let notes = stmt
            .query_map([user_id.to_string()], note_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    /// One page of the owner's notes matching `filter`, most recently updated first.
    ///
    /// Returns the page and the total number of matching notes.
    pub fn get_notes_page(
        &self,
        user_id: Uuid,
        filter: &NoteFilter,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Note>, usize)> {
        let mut conditions = vec!["user_id = ?".to_string()];
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(user_id.to_string())];

        conditions.push("is_archived = ?".to_string());
        params.push(Box::new(filter.archived));

        if let Some(pinned) = filter.pinned {
            conditions.push("is_pinned = ?".to_string());
            params.push(Box::new(pinned));
        }
        if let Some(project_id) = filter.project_id {
            conditions.push("project_id = ?".to_string());
            params.push(Box::new(project_id.to_string()));
        }
        if !filter.tags.is_empty() {
            let placeholders = vec!["?"; filter.tags.len()].join(", ");
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM json_each(notes.tags) WHERE json_each.value IN ({placeholders}))"
            ));
            for tag in &filter.tags {
                params.push(Box::new(tag.clone()));
            }
        }

        let limit = i64::try_from(limit)?;
        let offset = i64::try_from(offset)?;
        let where_clause = conditions.join(" AND ");
        let conn = self.lock();

        let mut params_ref: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM notes WHERE {where_clause}"),
            params_ref.as_slice(),
            |row| row.get(0),
        )?;

        params_ref.push(&limit);
        params_ref.push(&offset);

        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE {where_clause}
             ORDER BY updated_at DESC LIMIT ? OFFSET ?"
        ))?;
        let notes = stmt
            .query_map(params_ref.as_slice(), note_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((notes, total as usize))
    }

    pub fn get_note(&self, id: Uuid) -> Result<Option<Note>> {
        let conn = self.lock();
        Ok(select_note(&conn, id)?)
    }

    /// Look up a note and check ownership. A foreign note reads as missing.
    pub fn get_owned_note(&self, user_id: Uuid, id: Uuid) -> Result<Option<Note>> {
        Ok(self.get_note(id)?.filter(|note| note.user_id == user_id))
    }

    pub fn create_note(&self, user_id: Uuid, input: CreateNoteInput) -> Result<Note> {
        let conn = self.lock();
        let id = Uuid::new_v4();
        let now = Utc::now();
        let content = input.content.unwrap_or_default();
        let tags = input.tags.unwrap_or_default();
        let linked_tasks = input.linked_tasks.unwrap_or_default();
        let linked_notes = input.linked_notes.unwrap_or_default();

        conn.execute(
            "INSERT INTO notes (id, user_id, project_id, title, content, tags, linked_tasks, linked_notes,
             is_pinned, is_archived, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 0, 1, ?, ?)",
            (
                id.to_string(),
                user_id.to_string(),
                input.project_id.map(|u| u.to_string()),
                &input.title,
                &content,
                to_json(&tags)?,
                to_json(&linked_tasks)?,
                to_json(&linked_notes)?,
                fmt_datetime(now),
                fmt_datetime(now),
            ),
        )?;

        Ok(Note {
            id,
            user_id,
            project_id: input.project_id,
            title: input.title,
            content,
            tags,
            linked_tasks,
            linked_notes,
            is_pinned: false,
            is_archived: false,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update to a note owned by `user_id`.
    ///
    /// When the content changes the previous content is archived in
    /// `note_versions` and `version` is bumped. The read and both writes
    /// share one immediate transaction so concurrent edits serialize.
    pub fn update_note(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: UpdateNoteInput,
    ) -> Result<Option<Note>> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(existing) = select_note(&tx, id)?.filter(|note| note.user_id == user_id) else {
            return Ok(None);
        };

        let now = Utc::now();
        let content_changed = input
            .content
            .as_ref()
            .is_some_and(|content| *content != existing.content);

        let note = Note {
            id,
            user_id,
            project_id: input.project_id.unwrap_or(existing.project_id),
            title: input.title.unwrap_or_else(|| existing.title.clone()),
            content: input.content.unwrap_or_else(|| existing.content.clone()),
            tags: input.tags.unwrap_or_else(|| existing.tags.clone()),
            linked_tasks: input
                .linked_tasks
                .unwrap_or_else(|| existing.linked_tasks.clone()),
            linked_notes: input
                .linked_notes
                .unwrap_or_else(|| existing.linked_notes.clone()),
            is_pinned: input.is_pinned.unwrap_or(existing.is_pinned),
            is_archived: input.is_archived.unwrap_or(existing.is_archived),
            version: if content_changed {
                existing.version + 1
            } else {
                existing.version
            },
            created_at: existing.created_at,
            updated_at: now,
        };

        if content_changed {
            tx.execute(
                "INSERT INTO note_versions (note_id, version, content, updated_at) VALUES (?, ?, ?, ?)",
                (
                    id.to_string(),
                    existing.version,
                    &existing.content,
                    fmt_datetime(existing.updated_at),
                ),
            )?;
        }

        tx.execute(
            "UPDATE notes SET project_id = ?, title = ?, content = ?, tags = ?, linked_tasks = ?,
             linked_notes = ?, is_pinned = ?, is_archived = ?, version = ?, updated_at = ? WHERE id = ?",
            (
                note.project_id.map(|u| u.to_string()),
                &note.title,
                &note.content,
                to_json(&note.tags)?,
                to_json(&note.linked_tasks)?,
                to_json(&note.linked_notes)?,
                note.is_pinned,
                note.is_archived,
                note.version,
                fmt_datetime(now),
                id.to_string(),
            ),
        )?;
        tx.commit()?;

        Ok(Some(note))
    }

    pub fn delete_note(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let conn = self.lock();
        let rows = conn.execute(
            "DELETE FROM notes WHERE id = ? AND user_id = ?",
            (id.to_string(), user_id.to_string()),
        )?;
        Ok(rows > 0)
    }

    /// Archived revisions of a note, oldest first.
    pub fn get_note_versions(&self, note_id: Uuid) -> Result<Vec<NoteVersion>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT version, content, updated_at FROM note_versions
             WHERE note_id = ? ORDER BY version ASC",
        )?;

        let versions = stmt
            .query_map([note_id.to_string()], |row| {
                Ok(NoteVersion {
                    version: row.get(0)?,
                    content: row.get(1)?,
                    updated_at: parse_datetime(row.get(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    /// Resolve the links of a note to `{id, title}` pairs owned by `user_id`.
    /// Dangling or foreign ids are skipped.
    pub fn get_note_links(&self, user_id: Uuid, note: &Note) -> Result<NoteLinks> {
        let mut tasks = Vec::new();
        for id in &note.linked_tasks {
            if let Some(task) = self.get_owned_task(user_id, *id)? {
                tasks.push(LinkedEntity {
                    id: task.id,
                    title: task.title,
                });
            }
        }

        let mut notes = Vec::new();
        for id in &note.linked_notes {
            if let Some(linked) = self.get_owned_note(user_id, *id)? {
                notes.push(LinkedEntity {
                    id: linked.id,
                    title: linked.title,
                });
            }
        }

        Ok(NoteLinks { tasks, notes })
    }
}
