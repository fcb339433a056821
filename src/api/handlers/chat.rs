use axum::{extract::State, Json};

use crate::api::{AppState, AuthUser, JsonBody};
use crate::error::Result;
use crate::models::*;
use crate::services::chat;

pub async fn list_messages(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ChatMessage>>> {
    chat::list(&state.db, user.id()).map(Json)
}

pub async fn post_message(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(input): JsonBody<PostMessageInput>,
) -> Result<Json<ChatExchange>> {
    chat::post(
        &state.db,
        state.assistant.as_ref(),
        state.llm_timeout,
        user.id(),
        input,
    )
    .await
    .map(Json)
}

pub async fn clear_messages(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<BulkDeleteResponse>> {
    let deleted = chat::clear(&state.db, user.id())?;
    Ok(Json(BulkDeleteResponse {
        message: "Chat history cleared".to_string(),
        deleted,
    }))
}
