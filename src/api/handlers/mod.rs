pub mod analytics;
pub mod auth;
pub mod chat;
pub mod notes;
pub mod projects;
pub mod tasks;

use axum::{response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

/// Body of responses that only confirm an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
