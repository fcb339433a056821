use axum::{extract::State, Json};
use chrono::Local;

use crate::analytics::{self, Analytics};
use crate::api::{AppState, AuthUser};
use crate::error::Result;

/// Summary over the caller's data, with days in the server's local zone.
pub async fn get_analytics(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Analytics>> {
    let tasks = state.db.get_tasks(user.id(), None)?;
    let notes = state.db.get_notes(user.id())?;
    let messages = state.db.get_messages(user.id())?;

    let today = Local::now().date_naive();
    Ok(Json(analytics::summarize(&tasks, &notes, &messages, today, &Local)))
}
