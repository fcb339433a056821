//! Projects, their task roll-ups, and collaborator access.
//!
//! A project is visible to its owner and to accepted collaborators. Owners
//! and editors may change it; only the owner may delete it or manage roles.
//! Anything a caller cannot see is reported as not found.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use super::{required, PageWindow};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::*;

pub const MAX_NAME_CHARS: usize = 255;

/// `#RRGGBB` with hex digits of either case.
pub fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn validate_name(name: &str) -> Result<String> {
    let name = required(name, "name")?;
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(Error::validation(format!(
            "name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name)
}

fn validate_color(color: Option<&str>) -> Result<()> {
    match color {
        Some(color) if !is_hex_color(color) => {
            tracing::warn!("Rejected project color {:?}", color);
            Err(Error::validation("color must be in #RRGGBB format"))
        }
        _ => Ok(()),
    }
}

/// The project and caller's role, or not found when the caller cannot see it.
fn access(db: &Database, user: Uuid, id: Uuid) -> Result<(Project, CollaboratorRole)> {
    db.get_project_role(user, id)?.ok_or(Error::NotFound("Project"))
}

fn editable(db: &Database, user: Uuid, id: Uuid) -> Result<Project> {
    match access(db, user, id)? {
        (project, role) if role.can_edit() => Ok(project),
        _ => Err(Error::NotFound("Project")),
    }
}

fn owned(db: &Database, user: Uuid, id: Uuid) -> Result<Project> {
    match access(db, user, id)? {
        (project, CollaboratorRole::Owner) => Ok(project),
        _ => Err(Error::NotFound("Project")),
    }
}

/// Check that `parent_id` may become the parent of `project_id`: the parent
/// must be visible to the caller and must not descend from the project.
fn check_parent(
    db: &Database,
    user: Uuid,
    project_id: Option<Uuid>,
    parent_id: Uuid,
) -> Result<()> {
    if db.get_project_role(user, parent_id)?.is_none() {
        return Err(Error::validation("Parent project not found"));
    }
    let Some(project_id) = project_id else {
        return Ok(());
    };

    let mut seen = HashSet::new();
    let mut cursor = Some(parent_id);
    while let Some(current) = cursor {
        if current == project_id {
            tracing::warn!("Rejected parent {} for project {}: cycle", parent_id, project_id);
            return Err(Error::validation("A project cannot be its own ancestor"));
        }
        if !seen.insert(current) {
            break;
        }
        cursor = db.get_project(current)?.and_then(|p| p.parent_project_id);
    }
    Ok(())
}

fn summarize(db: &Database, project: Project) -> Result<ProjectSummary> {
    let progress = db.get_project_progress(project.id, Utc::now())?;
    Ok(ProjectSummary::new(project, &progress))
}

pub fn list(
    db: &Database,
    user: Uuid,
    filter: &ProjectFilter,
    window: PageWindow,
) -> Result<ProjectPage> {
    let (projects, total) = db.get_projects_page(user, filter, window.page_size, window.offset())?;
    let items = projects
        .into_iter()
        .map(|project| summarize(db, project))
        .collect::<Result<Vec<_>>>()?;

    Ok(ProjectPage {
        items,
        total,
        page: window.page,
        page_size: window.page_size,
        total_pages: window.total_pages(total),
    })
}

pub fn get(db: &Database, user: Uuid, id: Uuid) -> Result<ProjectDetail> {
    let (project, _) = access(db, user, id)?;
    let collaborators = db.get_collaborators(id)?;
    Ok(ProjectDetail {
        summary: summarize(db, project)?,
        collaborators,
    })
}

pub fn create(db: &Database, user: Uuid, mut input: CreateProjectInput) -> Result<Project> {
    input.name = validate_name(&input.name)?;
    validate_color(input.color.as_deref())?;
    if let Some(parent_id) = input.parent_project_id {
        check_parent(db, user, None, parent_id)?;
    }

    let project = db.create_project(user, input)?;
    tracing::info!("Created project {} for user {}", project.id, user);
    Ok(project)
}

pub fn update(
    db: &Database,
    user: Uuid,
    id: Uuid,
    mut input: UpdateProjectInput,
) -> Result<Project> {
    editable(db, user, id)?;

    if let Some(name) = &input.name {
        input.name = Some(validate_name(name)?);
    }
    if let Some(color) = &input.color {
        validate_color(color.as_deref())?;
    }
    if let Some(Some(parent_id)) = input.parent_project_id {
        check_parent(db, user, Some(id), parent_id)?;
    }

    let project = db
        .update_project(id, input)?
        .ok_or(Error::NotFound("Project"))?;
    tracing::info!("Updated project {} by user {}", id, user);
    Ok(project)
}

pub fn set_archived(db: &Database, user: Uuid, id: Uuid, archived: bool) -> Result<Project> {
    editable(db, user, id)?;
    let project = db
        .set_project_archived(id, archived)?
        .ok_or(Error::NotFound("Project"))?;
    tracing::info!(
        "{} project {} by user {}",
        if archived { "Archived" } else { "Unarchived" },
        id,
        user
    );
    Ok(project)
}

pub fn delete(db: &Database, user: Uuid, id: Uuid) -> Result<()> {
    owned(db, user, id)?;
    if !db.delete_project(id)? {
        return Err(Error::NotFound("Project"));
    }
    tracing::info!("Deleted project {} by user {}", id, user);
    Ok(())
}

pub fn progress(db: &Database, user: Uuid, id: Uuid) -> Result<ProjectProgress> {
    access(db, user, id)?;
    Ok(db.get_project_progress(id, Utc::now())?)
}

pub fn children(db: &Database, user: Uuid, id: Uuid) -> Result<Vec<ProjectSummary>> {
    access(db, user, id)?;
    db.get_child_projects(user, id)?
        .into_iter()
        .map(|project| summarize(db, project))
        .collect()
}

// ============================================================
// Collaborators
// ============================================================

pub fn collaborators(db: &Database, user: Uuid, id: Uuid) -> Result<Vec<Collaborator>> {
    access(db, user, id)?;
    Ok(db.get_collaborators(id)?)
}

/// Invite a user by email. The new row starts `pending` whatever its role.
pub fn add_collaborator(
    db: &Database,
    user: Uuid,
    id: Uuid,
    input: AddCollaboratorInput,
) -> Result<Collaborator> {
    editable(db, user, id)?;

    let email = required(&input.user_email, "userEmail")?.to_lowercase();
    let role = input.role.unwrap_or_default();
    if role == CollaboratorRole::Owner {
        return Err(Error::validation("A project has exactly one owner"));
    }

    let invitee = db
        .get_user_by_email(&email)?
        .ok_or_else(|| Error::validation("No user with that email"))?;
    if db.get_collaborator(id, invitee.id)?.is_some() {
        return Err(Error::validation("User is already a collaborator"));
    }

    let collaborator = db.add_collaborator(id, invitee.id, role, user)?;
    tracing::info!(
        "User {} invited {} to project {} as {}",
        user,
        invitee.id,
        id,
        role.as_str()
    );
    Ok(collaborator)
}

/// Change a collaborator's role (owner only) or status (owner or the
/// invitee themself).
///
/// An invitee with a pending row cannot see the project yet, so the access
/// check here is on the row rather than on project visibility.
pub fn update_collaborator(
    db: &Database,
    user: Uuid,
    id: Uuid,
    member: Uuid,
    input: UpdateCollaboratorInput,
) -> Result<Collaborator> {
    let project = db.get_project(id)?.ok_or(Error::NotFound("Project"))?;
    let is_owner = project.user_id == user;
    let is_self = member == user;

    let existing = db
        .get_collaborator(id, member)?
        .filter(|_| is_owner || is_self)
        .ok_or(Error::NotFound("Collaborator"))?;

    if let Some(role) = input.role {
        if !is_owner {
            return Err(Error::NotFound("Project"));
        }
        if existing.role == CollaboratorRole::Owner && role != CollaboratorRole::Owner {
            return Err(Error::validation("The project owner cannot be demoted"));
        }
        if role == CollaboratorRole::Owner && existing.role != CollaboratorRole::Owner {
            return Err(Error::validation("A project has exactly one owner"));
        }
    }
    if input.status.is_some() && existing.role == CollaboratorRole::Owner {
        return Err(Error::validation("The project owner's membership cannot change"));
    }

    let collaborator = db
        .update_collaborator(id, member, input)?
        .ok_or(Error::NotFound("Collaborator"))?;
    tracing::info!(
        "Collaborator {} on project {} is now {} / {}",
        member,
        id,
        collaborator.role.as_str(),
        collaborator.status.as_str()
    );
    Ok(collaborator)
}

pub fn remove_collaborator(db: &Database, user: Uuid, id: Uuid, member: Uuid) -> Result<()> {
    let project = owned(db, user, id)?;
    if member == project.user_id {
        return Err(Error::validation("The project owner cannot be removed"));
    }
    if !db.remove_collaborator(id, member)? {
        return Err(Error::NotFound("Collaborator"));
    }
    tracing::info!("Removed collaborator {} from project {}", member, id);
    Ok(())
}
