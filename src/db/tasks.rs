use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use super::{fmt_datetime, from_json, parse_datetime, parse_uuid, to_json, Database};
use crate::models::*;

const TASK_COLUMNS: &str = "id, user_id, project_id, title, description, status, priority, \
     ai_priority, due_date, completed_at, tags, created_at, updated_at";

fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: parse_uuid(row.get(0)?),
        user_id: parse_uuid(row.get(1)?),
        project_id: row.get::<_, Option<String>>(2)?.map(parse_uuid),
        title: row.get(3)?,
        description: row.get(4)?,
        status: TaskStatus::from_str(&row.get::<_, String>(5)?).unwrap_or(TaskStatus::Pending),
        priority: TaskPriority::from_str(&row.get::<_, String>(6)?).unwrap_or_default(),
        ai_priority: row.get(7)?,
        due_date: row.get::<_, Option<String>>(8)?.map(parse_datetime),
        completed_at: row.get::<_, Option<String>>(9)?.map(parse_datetime),
        tags: from_json(row.get(10)?),
        created_at: parse_datetime(row.get(11)?),
        updated_at: parse_datetime(row.get(12)?),
    })
}

fn select_task(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Task>> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"),
        [id.to_string()],
        task_from_row,
    )
    .optional()
}

impl Database {
    // ============================================================
    // Task operations
    // ============================================================

    /// Tasks of one owner ordered by status, AI score (unscored last), then newest first.
    pub fn get_tasks(&self, user_id: Uuid, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        let conn = self.lock();
        let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1");
        if status.is_some() {
            sql.push_str(" AND status = ?2");
        }
        sql.push_str(" ORDER BY status ASC, ai_priority DESC NULLS LAST, created_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let tasks = match status {
            Some(status) => stmt
                .query_map((user_id.to_string(), status.as_str()), task_from_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([user_id.to_string()], task_from_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(tasks)
    }

    /// Pending and in-progress tasks, newest first. This is the list handed to the ranker.
    pub fn get_open_tasks(&self, user_id: Uuid) -> Result<Vec<Task>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE user_id = ? AND status IN ('pending', 'in_progress')
             ORDER BY created_at DESC"
        ))?;

        let tasks = stmt
            .query_map([user_id.to_string()], task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Pending and in-progress tasks by AI score descending, then newest first.
    pub fn get_ranked_tasks(&self, user_id: Uuid) -> Result<Vec<Task>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE user_id = ? AND status IN ('pending', 'in_progress')
             ORDER BY ai_priority DESC NULLS LAST, created_at DESC"
        ))?;

        let tasks = stmt
            .query_map([user_id.to_string()], task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn get_tasks_by_project(&self, project_id: Uuid) -> Result<Vec<Task>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = ?
             ORDER BY status ASC, ai_priority DESC NULLS LAST, created_at DESC"
        ))?;

        let tasks = stmt
            .query_map([project_id.to_string()], task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Look up a task by id regardless of owner.
    pub fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let conn = self.lock();
        Ok(select_task(&conn, id)?)
    }

    /// Look up a task and check ownership. A foreign task reads as missing.
    pub fn get_owned_task(&self, user_id: Uuid, id: Uuid) -> Result<Option<Task>> {
        Ok(self.get_task(id)?.filter(|task| task.user_id == user_id))
    }

    pub fn create_task(&self, user_id: Uuid, input: CreateTaskInput) -> Result<Task> {
        let conn = self.lock();
        let id = Uuid::new_v4();
        let now = Utc::now();
        let priority = input.priority.unwrap_or_default();
        let tags = input.tags.unwrap_or_default();

        conn.execute(
            "INSERT INTO tasks (id, user_id, project_id, title, description, status, priority, tags, due_date, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 'pending', ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                user_id.to_string(),
                input.project_id.map(|u| u.to_string()),
                &input.title,
                &input.description,
                priority.as_str(),
                to_json(&tags)?,
                input.due_date.map(fmt_datetime),
                fmt_datetime(now),
                fmt_datetime(now),
            ),
        )?;

        Ok(Task {
            id,
            user_id,
            project_id: input.project_id,
            title: input.title,
            description: input.description,
            status: TaskStatus::Pending,
            priority,
            ai_priority: None,
            due_date: input.due_date,
            completed_at: None,
            tags,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update to a task owned by `user_id`.
    ///
    /// Returns `None` when the task is missing or owned by someone else.
    /// `ai_priority` is never touched here.
    pub fn update_task(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: UpdateTaskInput,
    ) -> Result<Option<Task>> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(mut task) = select_task(&tx, id)?.filter(|task| task.user_id == user_id) else {
            return Ok(None);
        };

        task.apply_update(input, Utc::now());

        tx.execute(
            "UPDATE tasks SET project_id = ?, title = ?, description = ?, status = ?, priority = ?,
             due_date = ?, completed_at = ?, tags = ?, updated_at = ? WHERE id = ?",
            (
                task.project_id.map(|u| u.to_string()),
                &task.title,
                &task.description,
                task.status.as_str(),
                task.priority.as_str(),
                task.due_date.map(fmt_datetime),
                task.completed_at.map(fmt_datetime),
                to_json(&task.tags)?,
                fmt_datetime(task.updated_at),
                id.to_string(),
            ),
        )?;
        tx.commit()?;

        Ok(Some(task))
    }

    pub fn delete_task(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let conn = self.lock();
        let rows = conn.execute(
            "DELETE FROM tasks WHERE id = ? AND user_id = ?",
            (id.to_string(), user_id.to_string()),
        )?;
        Ok(rows > 0)
    }

    /// Delete every completed task of the owner. Returns the number removed.
    pub fn delete_completed_tasks(&self, user_id: Uuid) -> Result<usize> {
        let conn = self.lock();
        let rows = conn.execute(
            "DELETE FROM tasks WHERE user_id = ? AND status = 'completed'",
            [user_id.to_string()],
        )?;
        Ok(rows)
    }

    /// Overwrite the AI score of one task. Only the ranking merge calls this.
    pub fn set_ai_priority(&self, id: Uuid, score: f64) -> Result<bool> {
        let conn = self.lock();
        let rows = conn.execute(
            "UPDATE tasks SET ai_priority = ? WHERE id = ?",
            (score, id.to_string()),
        )?;
        Ok(rows > 0)
    }
}
