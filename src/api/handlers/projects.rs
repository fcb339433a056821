use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::MessageResponse;
use crate::api::{AppState, AuthUser, JsonBody, PathParam, QueryParams};
use crate::error::Result;
use crate::models::*;
use crate::services::{projects, tasks, PageWindow};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProjectsQuery {
    pub include_archived: Option<bool>,
    pub parent_project_id: Option<Uuid>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

pub async fn list_projects(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<ListProjectsQuery>,
) -> Result<Json<ProjectPage>> {
    let filter = ProjectFilter {
        include_archived: query.include_archived.unwrap_or(false),
        parent_project_id: query.parent_project_id,
    };
    let window = PageWindow::new(query.page, query.page_size)?;
    projects::list(&state.db, user.id(), &filter, window).map(Json)
}

pub async fn get_project(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<ProjectDetail>> {
    projects::get(&state.db, user.id(), id).map(Json)
}

pub async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(input): JsonBody<CreateProjectInput>,
) -> Result<Json<Project>> {
    projects::create(&state.db, user.id(), input).map(Json)
}

pub async fn update_project(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(input): JsonBody<UpdateProjectInput>,
) -> Result<Json<Project>> {
    projects::update(&state.db, user.id(), id, input).map(Json)
}

pub async fn delete_project(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<MessageResponse>> {
    projects::delete(&state.db, user.id(), id)?;
    Ok(MessageResponse::new("Project deleted"))
}

pub async fn archive_project(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Project>> {
    projects::set_archived(&state.db, user.id(), id, true).map(Json)
}

pub async fn unarchive_project(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Project>> {
    projects::set_archived(&state.db, user.id(), id, false).map(Json)
}

pub async fn project_progress(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<ProjectProgress>> {
    projects::progress(&state.db, user.id(), id).map(Json)
}

pub async fn project_children(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Vec<ProjectSummary>>> {
    projects::children(&state.db, user.id(), id).map(Json)
}

pub async fn project_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Vec<Task>>> {
    tasks::list_for_project(&state.db, user.id(), id).map(Json)
}

// ============================================================
// Collaborators
// ============================================================

pub async fn list_collaborators(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Vec<Collaborator>>> {
    projects::collaborators(&state.db, user.id(), id).map(Json)
}

pub async fn share_project(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(input): JsonBody<AddCollaboratorInput>,
) -> Result<Json<Collaborator>> {
    projects::add_collaborator(&state.db, user.id(), id, input).map(Json)
}

pub async fn update_collaborator(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam((id, member)): PathParam<(Uuid, Uuid)>,
    JsonBody(input): JsonBody<UpdateCollaboratorInput>,
) -> Result<Json<Collaborator>> {
    projects::update_collaborator(&state.db, user.id(), id, member, input).map(Json)
}

pub async fn remove_collaborator(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam((id, member)): PathParam<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>> {
    projects::remove_collaborator(&state.db, user.id(), id, member)?;
    Ok(MessageResponse::new("Collaborator removed"))
}
