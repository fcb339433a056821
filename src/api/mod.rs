//! JSON API under `/api/v1`.

mod error;
mod extract;
mod handlers;
mod middleware;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::db::Database;
use crate::llm::Assistant;

pub use error::ErrorBody;
pub use extract::{AuthUser, JsonBody, PathParam, QueryParams};
pub use handlers::MessageResponse;
pub use middleware::{RateLimiter, SecurityConfig};

/// Default bound on a single completion call.
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub assistant: Arc<dyn Assistant>,
    pub security: SecurityConfig,
    pub llm_timeout: Duration,
}

impl AppState {
    /// State with security features disabled, for local use and tests.
    pub fn new(db: Database, assistant: Arc<dyn Assistant>) -> Self {
        Self {
            db,
            assistant,
            security: SecurityConfig::disabled(),
            llm_timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::permissive();
    };

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}

pub fn create_router(state: AppState) -> Router {
    let mut public = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));
    if let Some(limiter) = state.security.rate_limiter.clone() {
        public = public.layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    let api = Router::new()
        // Session
        .route("/logout", post(handlers::auth::logout))
        .route("/me", get(handlers::auth::me))
        // Tasks
        .route(
            "/tasks",
            get(handlers::tasks::list_tasks)
                .post(handlers::tasks::create_task)
                .delete(handlers::tasks::delete_completed_tasks),
        )
        .route("/tasks/prioritize", post(handlers::tasks::prioritize_tasks))
        .route(
            "/tasks/{id}",
            get(handlers::tasks::get_task)
                .patch(handlers::tasks::update_task)
                .delete(handlers::tasks::delete_task),
        )
        // Notes
        .route(
            "/notes",
            get(handlers::notes::list_notes).post(handlers::notes::create_note),
        )
        .route("/notes/page", get(handlers::notes::page_notes))
        .route("/notes/search", get(handlers::notes::search_notes))
        .route(
            "/notes/{id}",
            get(handlers::notes::get_note)
                .patch(handlers::notes::update_note)
                .delete(handlers::notes::delete_note),
        )
        .route("/notes/{id}/versions", get(handlers::notes::note_versions))
        .route("/notes/{id}/links", get(handlers::notes::note_links))
        // Projects
        .route(
            "/projects",
            get(handlers::projects::list_projects).post(handlers::projects::create_project),
        )
        .route(
            "/projects/{id}",
            get(handlers::projects::get_project)
                .patch(handlers::projects::update_project)
                .delete(handlers::projects::delete_project),
        )
        .route("/projects/{id}/archive", post(handlers::projects::archive_project))
        .route("/projects/{id}/unarchive", post(handlers::projects::unarchive_project))
        .route("/projects/{id}/progress", get(handlers::projects::project_progress))
        .route("/projects/{id}/children", get(handlers::projects::project_children))
        .route("/projects/{id}/tasks", get(handlers::projects::project_tasks))
        .route("/projects/{id}/share", post(handlers::projects::share_project))
        .route(
            "/projects/{id}/collaborators",
            get(handlers::projects::list_collaborators),
        )
        .route(
            "/projects/{id}/collaborators/{user_id}",
            patch(handlers::projects::update_collaborator)
                .delete(handlers::projects::remove_collaborator),
        )
        // Chat
        .route(
            "/chat",
            get(handlers::chat::list_messages)
                .post(handlers::chat::post_message)
                .delete(handlers::chat::clear_messages),
        )
        // Analytics
        .route("/analytics", get(handlers::analytics::get_analytics))
        // Health
        .route("/health", get(handlers::health))
        .merge(public);

    let cors = cors_layer(state.security.cors_origins.as_deref());

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
