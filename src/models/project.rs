use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::patch::nullable;

/// A project grouping tasks and notes.
///
/// Projects form a tree through `parent_project_id`; cycles are rejected
/// when a parent is assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Hex color in `#RRGGBB` form.
    pub color: Option<String>,
    pub parent_project_id: Option<Uuid>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectInput {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub parent_project_id: Option<Uuid>,
}

/// Partial update of a project. Archiving has its own endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_project_id: Option<Option<Uuid>>,
}

/// Task roll-up for a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectProgress {
    pub project_id: Uuid,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub in_progress_tasks: usize,
    pub pending_tasks: usize,
    pub overdue_tasks: usize,
    /// `completed / total * 100`, rounded to two decimals; 0 when there are no tasks.
    pub progress_percentage: f64,
}

impl ProjectProgress {
    pub fn percentage(completed: usize, total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let raw = completed as f64 / total as f64 * 100.0;
        (raw * 100.0).round() / 100.0
    }
}

/// A project with its progress counters, used in list and detail responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub task_count: usize,
    pub completed_task_count: usize,
    pub progress_percentage: f64,
}

impl ProjectSummary {
    pub fn new(project: Project, progress: &ProjectProgress) -> Self {
        Self {
            project,
            task_count: progress.total_tasks,
            completed_task_count: progress.completed_tasks,
            progress_percentage: progress.progress_percentage,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub summary: ProjectSummary,
    pub collaborators: Vec<Collaborator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPage {
    pub items: Vec<ProjectSummary>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// Filters for listing projects.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub include_archived: bool,
    pub parent_project_id: Option<Uuid>,
}

/// Shared access to a project. One row per (project, user) pair.
///
/// Role and status are independent: a new collaborator is always `Pending`
/// whatever their role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: CollaboratorRole,
    pub status: CollaboratorStatus,
    pub invited_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorRole {
    Owner,
    Editor,
    #[default]
    Viewer,
}

impl CollaboratorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "editor" => Some(Self::Editor),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    /// Owners and editors may change project fields and invite others.
    pub fn can_edit(&self) -> bool {
        matches!(self, Self::Owner | Self::Editor)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorStatus {
    Pending,
    Accepted,
    Declined,
}

impl CollaboratorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }
}

/// Input for `POST /projects/{id}/share`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCollaboratorInput {
    #[serde(default)]
    pub user_email: String,
    pub role: Option<CollaboratorRole>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCollaboratorInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<CollaboratorRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CollaboratorStatus>,
}
