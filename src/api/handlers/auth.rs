use axum::{extract::State, Json};

use super::MessageResponse;
use crate::api::{AppState, AuthUser, JsonBody};
use crate::error::Result;
use crate::models::*;
use crate::services::auth;

pub async fn register(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterInput>,
) -> Result<Json<RegisterResponse>> {
    let user = auth::register(&state.db, input)?;
    Ok(Json(RegisterResponse { user: user.into() }))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LoginInput>,
) -> Result<Json<LoginResponse>> {
    auth::login(&state.db, input, state.security.session_ttl).map(Json)
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MessageResponse>> {
    auth::logout(&state.db, &user.token)?;
    Ok(MessageResponse::new("Logged out"))
}

pub async fn me(user: AuthUser) -> Json<UserSummary> {
    Json(user.user.into())
}
