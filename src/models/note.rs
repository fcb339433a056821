use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::patch::nullable;

/// A markdown note owned by a single user.
///
/// `version` starts at 1 and increments whenever an update changes the
/// content; the replaced content is kept as a [`NoteVersion`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    /// Ordered as given by the user.
    pub tags: Vec<String>,
    pub linked_tasks: Vec<Uuid>,
    pub linked_notes: Vec<Uuid>,
    pub is_pinned: bool,
    pub is_archived: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A previous revision of a note's content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteVersion {
    pub version: i64,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteInput {
    #[serde(default)]
    pub title: String,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub project_id: Option<Uuid>,
    pub linked_tasks: Option<Vec<Uuid>>,
    pub linked_notes: Option<Vec<Uuid>>,
}

/// Partial update of a note. Only fields present in the request change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_tasks: Option<Vec<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_notes: Option<Vec<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

/// A note together with its derived preview fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteView {
    #[serde(flatten)]
    pub note: Note,
    pub preview: String,
    pub word_count: usize,
}

/// Filters for the paginated note listing.
#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    pub project_id: Option<Uuid>,
    /// Match notes carrying any of these tags.
    pub tags: Vec<String>,
    pub pinned: Option<bool>,
    pub archived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePage {
    pub items: Vec<NoteView>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSearchHit {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub preview: String,
    pub score: f64,
    pub highlights: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSearchResults {
    pub items: Vec<NoteSearchHit>,
    pub total: usize,
    pub query: String,
}

/// An `{id, title}` pair for a resolved note or task link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkedEntity {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteLinks {
    pub tasks: Vec<LinkedEntity>,
    pub notes: Vec<LinkedEntity>,
}
