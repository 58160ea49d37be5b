// Listing filters and page slicing

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-supplied listing parameters. `page` is 1-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListQuery {
    pub page: usize,
    pub page_size: usize,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            search: None,
            status: None,
            owner_id: None,
        }
    }
}

impl ListQuery {
    pub fn page(page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size,
            ..Default::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_owner(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Case-insensitive substring match against any of `fields`
    pub(crate) fn matches_search(&self, fields: &[&str]) -> bool {
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                fields.iter().any(|f| f.to_lowercase().contains(&needle))
            }
        }
    }

    pub(crate) fn matches_status(&self, status: &str) -> bool {
        self.status
            .as_deref()
            .map(|wanted| wanted.eq_ignore_ascii_case(status))
            .unwrap_or(true)
    }

    pub(crate) fn matches_owner(&self, owner: Uuid) -> bool {
        self.owner_id.map(|wanted| wanted == owner).unwrap_or(true)
    }
}

/// Requested slice plus the total count of matching records
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

/// Slices an already filtered collection. Page 0 is treated as page 1 and
/// `page_size` is clamped to `1..=max_page_size`.
pub fn paginate<T>(items: Vec<T>, query: &ListQuery, max_page_size: usize) -> Page<T> {
    let page = query.page.max(1);
    let page_size = query.page_size.clamp(1, max_page_size.max(1));
    let total = items.len();
    let items = items
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    Page {
        items,
        total,
        page,
        page_size,
    }
}
