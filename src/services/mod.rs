//! Business rules on top of the store.
//!
//! Handlers call into these functions after authentication; each one
//! validates input, enforces ownership or collaborator access, and maps
//! "missing" and "not yours" to the same [`Error::NotFound`].

pub mod auth;
pub mod chat;
pub mod notes;
pub mod projects;
pub mod tasks;

use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::llm::LlmError;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// A resolved page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: usize,
    pub page_size: usize,
}

impl PageWindow {
    /// Page numbers start at 1; the size is clamped to `1..=100`.
    ///
    /// A page whose offset does not fit a SQLite integer is rejected.
    pub fn new(page: Option<usize>, page_size: Option<usize>) -> Result<Self> {
        let window = Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        };

        let in_range = (window.page - 1)
            .checked_mul(window.page_size)
            .is_some_and(|offset| i64::try_from(offset).is_ok());
        if !in_range {
            tracing::warn!("Rejected out-of-range page {}", window.page);
            return Err(Error::validation("page is out of range"));
        }
        Ok(window)
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.page_size)
    }
}

/// Bound a completion call by `limit`.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = std::result::Result<T, LlmError>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(Error::from),
        Err(_) => Err(Error::Upstream(LlmError::Timeout(limit))),
    }
}

/// Reject a blank required string, returning it trimmed.
pub(crate) fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        tracing::warn!("Rejected request with blank {}", field);
        return Err(Error::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// A task or note may only reference a project the caller can see.
pub(crate) fn check_project_reference(db: &Database, owner: Uuid, project_id: Uuid) -> Result<()> {
    if db.get_project_role(owner, project_id)?.is_none() {
        tracing::warn!("User {} referenced inaccessible project {}", owner, project_id);
        return Err(Error::validation("Project not found"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults_and_clamps() {
        assert_eq!(PageWindow::new(None, None).unwrap(), PageWindow { page: 1, page_size: 20 });
        assert_eq!(PageWindow::new(Some(0), Some(0)).unwrap().page_size, 1);
        assert_eq!(PageWindow::new(Some(3), Some(500)).unwrap().page_size, 100);
        assert_eq!(PageWindow::new(Some(3), Some(10)).unwrap().offset(), 20);
    }

    #[test]
    fn huge_page_is_rejected() {
        assert!(matches!(PageWindow::new(Some(usize::MAX), None), Err(Error::Validation(_))));
        assert!(matches!(
            PageWindow::new(Some(usize::MAX / 20 + 2), Some(20)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn total_pages_rounds_up() {
        let window = PageWindow::new(Some(1), Some(10)).unwrap();
        assert_eq!(window.total_pages(0), 0);
        assert_eq!(window.total_pages(10), 1);
        assert_eq!(window.total_pages(11), 2);
    }

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("  Write report ", "title").unwrap(), "Write report");
        assert!(matches!(required("   ", "title"), Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let result: Result<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::Upstream(LlmError::Timeout(_)))));
    }
}
