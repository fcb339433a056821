//! Vectal: tasks, notes, projects and an AI assistant behind a JSON API.

pub mod analytics;
pub mod api;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod services;

pub use error::{Error, Result};
