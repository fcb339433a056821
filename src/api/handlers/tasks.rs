use axum::{extract::State, Json};
use uuid::Uuid;

use super::MessageResponse;
use crate::api::{AppState, AuthUser, JsonBody, PathParam, QueryParams};
use crate::error::Result;
use crate::models::*;
use crate::services::tasks;

pub async fn list_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<ListTasksQuery>,
) -> Result<Json<Vec<Task>>> {
    tasks::list(&state.db, user.id(), query.status).map(Json)
}

pub async fn get_task(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Task>> {
    tasks::get(&state.db, user.id(), id).map(Json)
}

pub async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(input): JsonBody<CreateTaskInput>,
) -> Result<Json<Task>> {
    tasks::create(&state.db, user.id(), input).map(Json)
}

pub async fn update_task(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(input): JsonBody<UpdateTaskInput>,
) -> Result<Json<Task>> {
    tasks::update(&state.db, user.id(), id, input).map(Json)
}

pub async fn delete_task(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<MessageResponse>> {
    tasks::delete(&state.db, user.id(), id)?;
    Ok(MessageResponse::new("Task deleted"))
}

pub async fn delete_completed_tasks(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<BulkDeleteResponse>> {
    let deleted = tasks::delete_completed(&state.db, user.id())?;
    Ok(Json(BulkDeleteResponse {
        message: "Completed tasks deleted".to_string(),
        deleted,
    }))
}

pub async fn prioritize_tasks(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<PrioritizeResponse>> {
    let ranked = tasks::rank_by_ai(
        &state.db,
        state.assistant.as_ref(),
        state.llm_timeout,
        user.id(),
    )
    .await?;

    Ok(Json(match ranked {
        Some(tasks) => PrioritizeResponse {
            message: "Tasks prioritized".to_string(),
            tasks: Some(tasks),
        },
        None => PrioritizeResponse {
            message: "No tasks to prioritize".to_string(),
            tasks: None,
        },
    }))
}
