use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, ToSql};
use uuid::Uuid;

use super::{fmt_datetime, parse_datetime, parse_uuid, Database};
use crate::models::*;

const PROJECT_COLUMNS: &str =
    "id, user_id, name, description, color, parent_project_id, is_archived, created_at, updated_at";

const COLLABORATOR_COLUMNS: &str =
    "project_id, user_id, role, status, invited_by, created_at, updated_at";

/// Owner of the project or an accepted collaborator. Expects the user id as `?1`.
const VISIBLE_TO_USER: &str = "(projects.user_id = ?1 OR EXISTS (
    SELECT 1 FROM project_collaborators c
    WHERE c.project_id = projects.id AND c.user_id = ?1 AND c.status = 'accepted'))";

fn project_from_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: parse_uuid(row.get(0)?),
        user_id: parse_uuid(row.get(1)?),
        name: row.get(2)?,
        description: row.get(3)?,
        color: row.get(4)?,
        parent_project_id: row.get::<_, Option<String>>(5)?.map(parse_uuid),
        is_archived: row.get(6)?,
        created_at: parse_datetime(row.get(7)?),
        updated_at: parse_datetime(row.get(8)?),
    })
}

fn collaborator_from_row(row: &Row) -> rusqlite::Result<Collaborator> {
    Ok(Collaborator {
        project_id: parse_uuid(row.get(0)?),
        user_id: parse_uuid(row.get(1)?),
        role: CollaboratorRole::from_str(&row.get::<_, String>(2)?).unwrap_or_default(),
        status: CollaboratorStatus::from_str(&row.get::<_, String>(3)?)
            .unwrap_or(CollaboratorStatus::Pending),
        invited_by: row.get::<_, Option<String>>(4)?.map(parse_uuid),
        created_at: parse_datetime(row.get(5)?),
        updated_at: parse_datetime(row.get(6)?),
    })
}

impl Database {
    // ============================================================
    // Project operations
    // ============================================================

    pub fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        let conn = self.lock();
        let project = conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"),
                [id.to_string()],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    /// The role `user_id` holds on a project they can see.
    ///
    /// `None` when the project is missing, or the user is neither its owner
    /// nor an accepted collaborator.
    pub fn get_project_role(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<(Project, CollaboratorRole)>> {
        let Some(project) = self.get_project(project_id)? else {
            return Ok(None);
        };
        if project.user_id == user_id {
            return Ok(Some((project, CollaboratorRole::Owner)));
        }

        match self.get_collaborator(project_id, user_id)? {
            Some(c) if c.status == CollaboratorStatus::Accepted => Ok(Some((project, c.role))),
            _ => Ok(None),
        }
    }

    /// A page of projects visible to `user_id`, newest first, plus the total count.
    pub fn get_projects_page(
        &self,
        user_id: Uuid,
        filter: &ProjectFilter,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Project>, usize)> {
        let mut conditions = vec![VISIBLE_TO_USER.to_string()];
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(user_id.to_string())];

        if !filter.include_archived {
            conditions.push("projects.is_archived = 0".to_string());
        }
        if let Some(parent_id) = filter.parent_project_id {
            conditions.push("projects.parent_project_id = ?2".to_string());
            params.push(Box::new(parent_id.to_string()));
        }

        let limit = i64::try_from(limit)?;
        let offset = i64::try_from(offset)?;
        let where_clause = conditions.join(" AND ");
        let conn = self.lock();

        let mut params_ref: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM projects WHERE {where_clause}"),
            params_ref.as_slice(),
            |row| row.get(0),
        )?;

        // Numbered placeholders follow the ones used by the filter.
        let limit_index = params_ref.len() + 1;
        let offset_index = limit_index + 1;
        params_ref.push(&limit);
        params_ref.push(&offset);

        let mut stmt = conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE {where_clause}
             ORDER BY created_at DESC LIMIT ?{limit_index} OFFSET ?{offset_index}"
        ))?;
        let projects = stmt
            .query_map(params_ref.as_slice(), project_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((projects, total as usize))
    }

    /// Non-archived children of a project that `user_id` can see.
    pub fn get_child_projects(&self, user_id: Uuid, parent_id: Uuid) -> Result<Vec<Project>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects
             WHERE {VISIBLE_TO_USER} AND projects.parent_project_id = ?2 AND projects.is_archived = 0
             ORDER BY created_at DESC"
        ))?;

        let projects = stmt
            .query_map((user_id.to_string(), parent_id.to_string()), project_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    /// Insert a project and its creator as accepted owner.
    pub fn create_project(&self, user_id: Uuid, input: CreateProjectInput) -> Result<Project> {
        let mut conn = self.lock();
        let id = Uuid::new_v4();
        let now = Utc::now();

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO projects (id, user_id, name, description, color, parent_project_id, is_archived, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)",
            (
                id.to_string(),
                user_id.to_string(),
                &input.name,
                &input.description,
                &input.color,
                input.parent_project_id.map(|u| u.to_string()),
                fmt_datetime(now),
                fmt_datetime(now),
            ),
        )?;
        tx.execute(
            "INSERT INTO project_collaborators (project_id, user_id, role, status, invited_by, created_at, updated_at)
             VALUES (?, ?, 'owner', 'accepted', NULL, ?, ?)",
            (
                id.to_string(),
                user_id.to_string(),
                fmt_datetime(now),
                fmt_datetime(now),
            ),
        )?;
        tx.commit()?;

        Ok(Project {
            id,
            user_id,
            name: input.name,
            description: input.description,
            color: input.color,
            parent_project_id: input.parent_project_id,
            is_archived: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update_project(&self, id: Uuid, input: UpdateProjectInput) -> Result<Option<Project>> {
        let Some(existing) = self.get_project(id)? else {
            return Ok(None);
        };

        let conn = self.lock();
        let now = Utc::now();
        let name = input.name.unwrap_or(existing.name);
        let description = input.description.unwrap_or(existing.description);
        let color = input.color.unwrap_or(existing.color);
        let parent_project_id = input
            .parent_project_id
            .unwrap_or(existing.parent_project_id);

        conn.execute(
            "UPDATE projects SET name = ?, description = ?, color = ?, parent_project_id = ?, updated_at = ?
             WHERE id = ?",
            (
                &name,
                &description,
                &color,
                parent_project_id.map(|u| u.to_string()),
                fmt_datetime(now),
                id.to_string(),
            ),
        )?;

        Ok(Some(Project {
            id,
            user_id: existing.user_id,
            name,
            description,
            color,
            parent_project_id,
            is_archived: existing.is_archived,
            created_at: existing.created_at,
            updated_at: now,
        }))
    }

    pub fn set_project_archived(&self, id: Uuid, archived: bool) -> Result<Option<Project>> {
        {
            let conn = self.lock();
            let rows = conn.execute(
                "UPDATE projects SET is_archived = ?, updated_at = ? WHERE id = ?",
                (archived, fmt_datetime(Utc::now()), id.to_string()),
            )?;
            if rows == 0 {
                return Ok(None);
            }
        }
        self.get_project(id)
    }

    /// Delete a project. Child projects and collaborator rows cascade; tasks
    /// and notes keep existing with their project reference cleared.
    pub fn delete_project(&self, id: Uuid) -> Result<bool> {
        let conn = self.lock();
        let rows = conn.execute("DELETE FROM projects WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }

    /// Task roll-up over every task referencing the project, whoever owns it.
    pub fn get_project_progress(
        &self,
        project_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ProjectProgress> {
        let conn = self.lock();
        let (total, completed, in_progress, pending, overdue): (i64, i64, i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'completed'), 0),
                        COALESCE(SUM(status = 'in_progress'), 0),
                        COALESCE(SUM(status = 'pending'), 0),
                        COALESCE(SUM(due_date IS NOT NULL AND due_date < ?2 AND status != 'completed'), 0)
                 FROM tasks WHERE project_id = ?1",
                (project_id.to_string(), fmt_datetime(now)),
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )?;

        Ok(ProjectProgress {
            project_id,
            total_tasks: total as usize,
            completed_tasks: completed as usize,
            in_progress_tasks: in_progress as usize,
            pending_tasks: pending as usize,
            overdue_tasks: overdue as usize,
            progress_percentage: ProjectProgress::percentage(completed as usize, total as usize),
        })
    }

    // ============================================================
    // Collaborator operations
    // ============================================================

    pub fn get_collaborators(&self, project_id: Uuid) -> Result<Vec<Collaborator>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLLABORATOR_COLUMNS} FROM project_collaborators
             WHERE project_id = ? ORDER BY created_at ASC"
        ))?;

        let collaborators = stmt
            .query_map([project_id.to_string()], collaborator_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(collaborators)
    }

    pub fn get_collaborator(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Collaborator>> {
        let conn = self.lock();
        let collaborator = conn
            .query_row(
                &format!(
                    "SELECT {COLLABORATOR_COLUMNS} FROM project_collaborators
                     WHERE project_id = ? AND user_id = ?"
                ),
                (project_id.to_string(), user_id.to_string()),
                collaborator_from_row,
            )
            .optional()?;
        Ok(collaborator)
    }

    /// Insert a collaborator row. New rows always start `pending`.
    pub fn add_collaborator(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: CollaboratorRole,
        invited_by: Uuid,
    ) -> Result<Collaborator> {
        let conn = self.lock();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO project_collaborators (project_id, user_id, role, status, invited_by, created_at, updated_at)
             VALUES (?, ?, ?, 'pending', ?, ?, ?)",
            (
                project_id.to_string(),
                user_id.to_string(),
                role.as_str(),
                invited_by.to_string(),
                fmt_datetime(now),
                fmt_datetime(now),
            ),
        )?;

        Ok(Collaborator {
            project_id,
            user_id,
            role,
            status: CollaboratorStatus::Pending,
            invited_by: Some(invited_by),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update_collaborator(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        input: UpdateCollaboratorInput,
    ) -> Result<Option<Collaborator>> {
        let Some(existing) = self.get_collaborator(project_id, user_id)? else {
            return Ok(None);
        };

        let conn = self.lock();
        let now = Utc::now();
        let role = input.role.unwrap_or(existing.role);
        let status = input.status.unwrap_or(existing.status);

        conn.execute(
            "UPDATE project_collaborators SET role = ?, status = ?, updated_at = ?
             WHERE project_id = ? AND user_id = ?",
            (
                role.as_str(),
                status.as_str(),
                fmt_datetime(now),
                project_id.to_string(),
                user_id.to_string(),
            ),
        )?;

        Ok(Some(Collaborator {
            role,
            status,
            updated_at: now,
            ..existing
        }))
    }

    pub fn remove_collaborator(&self, project_id: Uuid, user_id: Uuid) -> Result<bool> {
        let conn = self.lock();
        let rows = conn.execute(
            "DELETE FROM project_collaborators WHERE project_id = ? AND user_id = ?",
            (project_id.to_string(), user_id.to_string()),
        )?;
        Ok(rows > 0)
    }
}
