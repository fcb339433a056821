//! Notes: plain listing with substring filter, paginated listing with
//! derived previews, scored search, versions and links.

use uuid::Uuid;

use super::{check_project_reference, required, PageWindow};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::*;

pub const MAX_TITLE_CHARS: usize = 500;

const PREVIEW_CHARS: usize = 200;
const CONTEXT_BEFORE: usize = 50;
const CONTEXT_AFTER: usize = 150;
const MAX_HIGHLIGHTS: usize = 3;

const TITLE_WEIGHT: f64 = 3.0;
const TAG_WEIGHT: f64 = 2.0;
const CONTENT_WEIGHT: f64 = 1.0;

fn lower_chars(s: &str) -> Vec<char> {
    s.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

/// Char position of the first case-insensitive occurrence of `needle`.
fn find_ci(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    find_ci(&lower_chars(haystack), &lower_chars(needle)).is_some()
}

/// True when `query` occurs in the title, content or any tag, ignoring case.
pub fn matches_query(note: &Note, query: &str) -> bool {
    contains_ci(&note.title, query)
        || contains_ci(&note.content, query)
        || note.tags.iter().any(|tag| contains_ci(tag, query))
}

/// Markdown punctuation removed and whitespace collapsed.
fn plain_text(content: &str) -> String {
    let stripped: String = content
        .chars()
        .filter(|c| !matches!(c, '#' | '*' | '`' | '[' | ']' | '(' | ')'))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The first 200 characters of the plain text.
pub fn preview(content: &str) -> String {
    let text = plain_text(content);
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text
    }
}

/// A window of plain text around the first hit of `query`, or the plain
/// preview when the content does not contain it.
pub fn preview_around(content: &str, query: &str) -> String {
    let text = plain_text(content);
    let chars: Vec<char> = text.chars().collect();

    let Some(pos) = find_ci(&lower_chars(&text), &lower_chars(query)) else {
        return preview(content);
    };

    let start = pos.saturating_sub(CONTEXT_BEFORE);
    let end = (pos + query.chars().count() + CONTEXT_AFTER).min(chars.len());
    let mut window: String = chars[start..end].iter().collect();
    if start > 0 {
        window.insert_str(0, "...");
    }
    if end < chars.len() {
        window.push_str("...");
    }
    window
}

fn sentences(content: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        let ends_sentence = matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|next| next.is_whitespace());
        if ends_sentence {
            while chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
            out.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    out.push(current);
    out
}

/// Up to three sentences of `content` containing `query`.
pub fn highlights(content: &str, query: &str) -> Vec<String> {
    sentences(content)
        .into_iter()
        .filter(|sentence| contains_ci(sentence, query))
        .map(|sentence| sentence.trim().to_string())
        .take(MAX_HIGHLIGHTS)
        .collect()
}

pub fn word_count(content: &str) -> usize {
    content.split_whitespace().count()
}

/// Title hits outrank tag hits, which outrank content hits.
pub fn search_score(note: &Note, query: &str) -> f64 {
    let mut score = 0.0;
    if contains_ci(&note.title, query) {
        score += TITLE_WEIGHT;
    }
    if note.tags.iter().any(|tag| contains_ci(tag, query)) {
        score += TAG_WEIGHT;
    }
    if contains_ci(&note.content, query) {
        score += CONTENT_WEIGHT;
    }
    score
}

pub fn view(note: Note) -> NoteView {
    NoteView {
        preview: preview(&note.content),
        word_count: word_count(&note.content),
        note,
    }
}

fn validate_title(title: &str) -> Result<String> {
    let title = required(title, "title")?;
    if title.chars().count() > MAX_TITLE_CHARS {
        tracing::warn!("Rejected note title over {} characters", MAX_TITLE_CHARS);
        return Err(Error::validation(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(title)
}

/// Every note of the owner, newest update first, optionally filtered by a
/// case-insensitive substring of title, content or tags.
pub fn list(db: &Database, owner: Uuid, query: Option<&str>) -> Result<Vec<Note>> {
    let notes = db.get_notes(owner)?;
    Ok(match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => notes.into_iter().filter(|n| matches_query(n, q)).collect(),
        None => notes,
    })
}

pub fn page(
    db: &Database,
    owner: Uuid,
    filter: &NoteFilter,
    window: PageWindow,
) -> Result<NotePage> {
    let (notes, total) = db.get_notes_page(owner, filter, window.page_size, window.offset())?;
    Ok(NotePage {
        items: notes.into_iter().map(view).collect(),
        total,
        page: window.page,
        page_size: window.page_size,
        total_pages: window.total_pages(total),
    })
}

pub fn search(
    db: &Database,
    owner: Uuid,
    query: &str,
    window: PageWindow,
) -> Result<NoteSearchResults> {
    let query = required(query, "query")?;

    let mut hits: Vec<NoteSearchHit> = db
        .get_notes(owner)?
        .into_iter()
        .filter(|note| matches_query(note, &query))
        .map(|note| NoteSearchHit {
            score: search_score(&note, &query),
            preview: preview_around(&note.content, &query),
            highlights: highlights(&note.content, &query),
            id: note.id,
            title: note.title,
            content: note.content,
            tags: note.tags,
            created_at: note.created_at,
            updated_at: note.updated_at,
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
    });

    let total = hits.len();
    let items = hits
        .into_iter()
        .skip(window.offset())
        .take(window.page_size)
        .collect();

    Ok(NoteSearchResults { items, total, query })
}

pub fn get(db: &Database, owner: Uuid, id: Uuid) -> Result<Note> {
    db.get_owned_note(owner, id)?.ok_or(Error::NotFound("Note"))
}

pub fn create(db: &Database, owner: Uuid, mut input: CreateNoteInput) -> Result<Note> {
    input.title = validate_title(&input.title)?;
    if let Some(project_id) = input.project_id {
        check_project_reference(db, owner, project_id)?;
    }

    let note = db.create_note(owner, input)?;
    tracing::info!("Created note {} for user {}", note.id, owner);
    Ok(note)
}

pub fn update(db: &Database, owner: Uuid, id: Uuid, mut input: UpdateNoteInput) -> Result<Note> {
    if let Some(title) = &input.title {
        input.title = Some(validate_title(title)?);
    }
    if let Some(Some(project_id)) = input.project_id {
        check_project_reference(db, owner, project_id)?;
    }

    let note = db
        .update_note(owner, id, input)?
        .ok_or(Error::NotFound("Note"))?;
    tracing::info!("Updated note {} (version {}) for user {}", id, note.version, owner);
    Ok(note)
}

pub fn delete(db: &Database, owner: Uuid, id: Uuid) -> Result<()> {
    if !db.delete_note(owner, id)? {
        return Err(Error::NotFound("Note"));
    }
    tracing::info!("Deleted note {} for user {}", id, owner);
    Ok(())
}

pub fn versions(db: &Database, owner: Uuid, id: Uuid) -> Result<Vec<NoteVersion>> {
    let note = get(db, owner, id)?;
    Ok(db.get_note_versions(note.id)?)
}

pub fn links(db: &Database, owner: Uuid, id: Uuid) -> Result<NoteLinks> {
    let note = get(db, owner, id)?;
    Ok(db.get_note_links(owner, &note)?)
}
