//! Domain models for Vectal.
//!
//! # Ownership
//!
//! Every [`Task`], [`Note`], [`ChatMessage`] and [`Project`] belongs to exactly
//! one [`User`] (its `user_id`). A project can additionally be shared through
//! [`Collaborator`] rows; tasks and notes only *reference* a project.
//!
//! # Partial updates
//!
//! `Update*Input` types use `Option<T>` for "leave unchanged when absent" and
//! `Option<Option<T>>` for nullable columns, where `Some(None)` is an explicit
//! `null` that clears the value. See [`patch::nullable`].

mod chat;
mod note;
pub mod patch;
mod project;
mod task;
mod user;

pub use chat::*;
pub use note::*;
pub use project::*;
pub use task::*;
pub use user::*;
