//! Task lifecycle and the AI ranking merge.

use std::time::Duration;

use uuid::Uuid;

use super::{check_project_reference, required, with_timeout};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::llm::{Assistant, RankSuggestion};
use crate::models::*;

pub fn list(db: &Database, owner: Uuid, status: Option<TaskStatus>) -> Result<Vec<Task>> {
    Ok(db.get_tasks(owner, status)?)
}

pub fn get(db: &Database, owner: Uuid, id: Uuid) -> Result<Task> {
    db.get_owned_task(owner, id)?.ok_or(Error::NotFound("Task"))
}

pub fn create(db: &Database, owner: Uuid, mut input: CreateTaskInput) -> Result<Task> {
    input.title = required(&input.title, "title")?;
    if let Some(project_id) = input.project_id {
        check_project_reference(db, owner, project_id)?;
    }

    let task = db.create_task(owner, input)?;
    tracing::info!("Created task {} for user {}", task.id, owner);
    Ok(task)
}

pub fn update(db: &Database, owner: Uuid, id: Uuid, mut input: UpdateTaskInput) -> Result<Task> {
    if let Some(title) = &input.title {
        input.title = Some(required(title, "title")?);
    }
    if let Some(Some(project_id)) = input.project_id {
        check_project_reference(db, owner, project_id)?;
    }

    let task = db
        .update_task(owner, id, input)?
        .ok_or(Error::NotFound("Task"))?;
    tracing::info!("Updated task {} for user {}", id, owner);
    Ok(task)
}

pub fn delete(db: &Database, owner: Uuid, id: Uuid) -> Result<()> {
    if !db.delete_task(owner, id)? {
        return Err(Error::NotFound("Task"));
    }
    tracing::info!("Deleted task {} for user {}", id, owner);
    Ok(())
}

/// Remove every completed task of the owner. Safe to repeat.
pub fn delete_completed(db: &Database, owner: Uuid) -> Result<usize> {
    let deleted = db.delete_completed_tasks(owner)?;
    tracing::info!("Deleted {} completed tasks for user {}", deleted, owner);
    Ok(deleted)
}

pub fn list_for_project(db: &Database, owner: Uuid, project_id: Uuid) -> Result<Vec<Task>> {
    if db.get_project_role(owner, project_id)?.is_none() {
        return Err(Error::NotFound("Project"));
    }
    Ok(db.get_tasks_by_project(project_id)?)
}

/// Pair each in-range suggestion with the id of the task it addresses.
///
/// Out-of-range indices are dropped. When an index repeats, the later
/// suggestion wins.
pub fn apply_rankings(tasks: &[Task], suggestions: &[RankSuggestion]) -> Vec<(Uuid, f64)> {
    let mut scores: Vec<Option<f64>> = vec![None; tasks.len()];
    for suggestion in suggestions {
        match scores.get_mut(suggestion.index) {
            Some(slot) if suggestion.score.is_finite() => *slot = Some(suggestion.score),
            _ => tracing::debug!("Dropped ranking for index {}", suggestion.index),
        }
    }

    tasks
        .iter()
        .zip(scores)
        .filter_map(|(task, score)| score.map(|s| (task.id, s)))
        .collect()
}

/// Ask the assistant to score the owner's open tasks and store the scores.
///
/// Returns `None` without calling the assistant when there is nothing to
/// rank. Writes are applied one task at a time; a failure part way leaves
/// earlier scores in place and re-running converges to the same state.
pub async fn rank_by_ai(
    db: &Database,
    assistant: &dyn Assistant,
    limit: Duration,
    owner: Uuid,
) -> Result<Option<Vec<Task>>> {
    let tasks = db.get_open_tasks(owner)?;
    if tasks.is_empty() {
        tracing::debug!("No open tasks to rank for user {}", owner);
        return Ok(None);
    }

    let suggestions = with_timeout(limit, assistant.rank_tasks(&tasks))
        .await
        .inspect_err(|e| tracing::error!("Ranking failed for user {}: {}", owner, e))?;

    let updates = apply_rankings(&tasks, &suggestions);
    for (id, score) in &updates {
        db.set_ai_priority(*id, *score)?;
    }
    tracing::info!(
        "Ranked {} of {} open tasks for user {}",
        updates.len(),
        tasks.len(),
        owner
    );

    Ok(Some(db.get_ranked_tasks(owner)?))
}
