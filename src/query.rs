//! Query API with filtering, sorting and pagination over item views.

use crate::store::Store;
use crate::types::Status;
use crate::view::ItemView;
use chrono::NaiveDate;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Field to sort query results by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Created,
    Name,
    /// Items without a deadline sort last in either direction.
    Deadline,
    Status,
}

impl SortKey {
    pub fn parse(s: &str) -> Option<SortKey> {
        match s.trim().to_lowercase().as_str() {
            "created" | "created_at" => Some(SortKey::Created),
            "name" => Some(SortKey::Name),
            "deadline" => Some(SortKey::Deadline),
            "status" => Some(SortKey::Status),
            _ => None,
        }
    }
}

/// Item query: filters, ordering and a page window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemQuery {
    pub status: Option<Status>,
    pub name_contains: Option<String>,
    pub sort: SortKey,
    pub descending: bool,
    /// Page size; the store's default page size when unset.
    pub limit: Option<usize>,
    /// Zero-based page, counted in pages of `limit`.
    pub page: usize,
    /// Extra items skipped before the page starts.
    pub offset: usize,
}

impl ItemQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by status.
    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Filter by name substring (case-insensitive, surrounding whitespace ignored).
    pub fn name_contains(mut self, substring: impl Into<String>) -> Self {
        self.name_contains = Some(substring.into());
        self
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort = key;
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// Limit results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip first N results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Zero-based page number.
    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    fn matches(&self, view: &ItemView) -> bool {
        if let Some(status) = self.status
            && view.status != status
        {
            return false;
        }

        if let Some(ref needle) = self.name_contains {
            let needle = needle.trim().to_lowercase();
            if !needle.is_empty() && !view.name.to_lowercase().contains(&needle) {
                return false;
            }
        }

        true
    }

    fn compare(&self, a: &ItemView, b: &ItemView) -> Ordering {
        let directed = |ord: Ordering| if self.descending { ord.reverse() } else { ord };

        let primary = match self.sort {
            SortKey::Created => directed(a.created_at.cmp(&b.created_at)),
            SortKey::Name => directed(a.name.to_lowercase().cmp(&b.name.to_lowercase())),
            SortKey::Status => directed(a.status.cmp(&b.status)),
            SortKey::Deadline => match (a.deadline, b.deadline) {
                (Some(x), Some(y)) => directed(x.cmp(&y)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };

        primary.then_with(|| a.id.cmp(&b.id))
    }

    /// Filter, sort and page a set of views.
    pub fn apply(&self, views: Vec<ItemView>, default_limit: usize) -> Vec<ItemView> {
        let mut matched: Vec<ItemView> = views.into_iter().filter(|v| self.matches(v)).collect();
        matched.sort_by(|a, b| self.compare(a, b));

        let limit = self.limit.unwrap_or(default_limit);
        let skip = self.page.saturating_mul(limit).saturating_add(self.offset);
        matched.into_iter().skip(skip).take(limit).collect()
    }
}

/// Extension trait to add querying to Store.
pub trait StoreQueryExt {
    /// Run a query over one list's items.
    fn query_items(&self, caller: &str, list_id: &str, query: &ItemQuery, today: NaiveDate) -> Result<Vec<ItemView>>;
}

impl StoreQueryExt for Store {
    fn query_items(&self, caller: &str, list_id: &str, query: &ItemQuery, today: NaiveDate) -> Result<Vec<ItemView>> {
        let views = self.list_views(caller, list_id, today)?;
        Ok(query.apply(views, self.config().default_page_size))
    }
}
