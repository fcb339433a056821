use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::patch::nullable;

/// A to-do item owned by a single user.
///
/// `ai_priority` is written only by the ranking merge
/// (`services::tasks::rank_by_ai`), never by a direct edit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Optional weak reference to a project.
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Score assigned by the ranking adapter; higher is more urgent.
    pub ai_priority: Option<f64>,
    pub due_date: Option<DateTime<Utc>>,
    /// Set exactly when `status` is `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// True when the due date has passed and the task is still open.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Completed && self.due_date.is_some_and(|due| due < now)
    }

    /// Merge a partial update into this task.
    ///
    /// A caller-supplied `completed_at` always wins. Otherwise a status change
    /// stamps `completed_at` on entering `Completed` and clears it on leaving.
    pub fn apply_update(&mut self, input: UpdateTaskInput, now: DateTime<Utc>) {
        let previous_status = self.status;

        if let Some(title) = input.title {
            self.title = title;
        }
        if let Some(description) = input.description {
            self.description = description;
        }
        if let Some(status) = input.status {
            self.status = status;
        }
        if let Some(priority) = input.priority {
            self.priority = priority;
        }
        if let Some(due_date) = input.due_date {
            self.due_date = due_date;
        }
        if let Some(tags) = input.tags {
            self.tags = tags;
        }
        if let Some(project_id) = input.project_id {
            self.project_id = project_id;
        }

        match input.completed_at {
            Some(completed_at) => self.completed_at = completed_at,
            None if self.status != previous_status => {
                self.completed_at = (self.status == TaskStatus::Completed).then_some(now);
            }
            None => {}
        }

        self.updated_at = now;
    }
}

/// Lifecycle state of a task.
///
/// The string forms sort as `completed < in_progress < pending`, which is the
/// order `GET /tasks` lists them in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Statuses eligible for AI ranking.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Input for creating a task. New tasks always start `pending` with no AI score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskInput {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    pub project_id: Option<Uuid>,
}

/// Partial update of a task. Only fields present in the request change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_id: Option<Option<Uuid>>,
}

/// Query parameters for `GET /tasks`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<TaskStatus>,
}

/// Result of `POST /tasks/prioritize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrioritizeResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
}

/// Result of a bulk delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDeleteResponse {
    pub message: String,
    pub deleted: usize,
}
