use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::MessageResponse;
use crate::api::{AppState, AuthUser, JsonBody, PathParam, QueryParams};
use crate::error::Result;
use crate::models::*;
use crate::services::{notes, PageWindow};

#[derive(Debug, Default, Deserialize)]
pub struct ListNotesQuery {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePageQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    /// Comma-separated; a note matches when it has any of them.
    pub tags: Option<String>,
    pub pinned: Option<bool>,
    pub archived: Option<bool>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchNotesQuery {
    #[serde(default)]
    pub q: String,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

pub async fn list_notes(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<ListNotesQuery>,
) -> Result<Json<Vec<Note>>> {
    notes::list(&state.db, user.id(), query.q.as_deref()).map(Json)
}

pub async fn page_notes(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<NotePageQuery>,
) -> Result<Json<NotePage>> {
    let filter = NoteFilter {
        project_id: query.project_id,
        tags: query
            .tags
            .map(|tags| {
                tags.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        pinned: query.pinned,
        archived: query.archived.unwrap_or(false),
    };
    let window = PageWindow::new(query.page, query.page_size)?;
    notes::page(&state.db, user.id(), &filter, window).map(Json)
}

pub async fn search_notes(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<SearchNotesQuery>,
) -> Result<Json<NoteSearchResults>> {
    let window = PageWindow::new(query.page, query.page_size)?;
    notes::search(&state.db, user.id(), &query.q, window).map(Json)
}

pub async fn get_note(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<NoteView>> {
    notes::get(&state.db, user.id(), id)
        .map(notes::view)
        .map(Json)
}

pub async fn create_note(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(input): JsonBody<CreateNoteInput>,
) -> Result<Json<Note>> {
    notes::create(&state.db, user.id(), input).map(Json)
}

pub async fn update_note(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(input): JsonBody<UpdateNoteInput>,
) -> Result<Json<Note>> {
    notes::update(&state.db, user.id(), id, input).map(Json)
}

pub async fn delete_note(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<MessageResponse>> {
    notes::delete(&state.db, user.id(), id)?;
    Ok(MessageResponse::new("Note deleted"))
}

pub async fn note_versions(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Vec<NoteVersion>>> {
    notes::versions(&state.db, user.id(), id).map(Json)
}

pub async fn note_links(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<NoteLinks>> {
    notes::links(&state.db, user.id(), id).map(Json)
}
