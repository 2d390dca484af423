//! Paginated, filtered and sorted view over the active folder's documents.
//!
//! The store keeps the fetched superset in server order (newest first) and
//! reveals a growing window of it. Head refreshes merge by id without ever
//! reordering rows that are already on screen.

use crate::types::{DocumentStatus, OcrDocument};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// First fetch size; "load more" reveals this many additional rows.
pub const PAGE_SIZE: usize = 20;
/// Head-refresh batch size after uploads and deletes.
pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    FileName,
    Status,
    UploadedDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn flipped(self) -> SortOrder {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

/// Client-side quick filters. Suppressed while a detailed search is active,
/// because the detailed search already ran server-side with the same
/// semantics and filtering twice would under-count.
#[derive(Debug, Clone, Default)]
pub struct QuickFilters {
    pub keyword: Option<String>,
    pub status: Option<DocumentStatus>,
}

impl QuickFilters {
    fn matches(&self, doc: &OcrDocument) -> bool {
        if let Some(keyword) = &self.keyword {
            let needle = keyword.to_lowercase();
            let in_name = doc.file_name.to_lowercase().contains(&needle);
            let in_tags = doc.tags.iter().any(|t| t.to_lowercase().contains(&needle));
            if !in_name && !in_tags {
                return false;
            }
        }
        if let Some(status) = self.status {
            if doc.status != status {
                return false;
            }
        }
        true
    }
}

/// Server-side search criteria (date range, tag, multi-status).
#[derive(Debug, Clone, Default)]
pub struct DetailedSearch {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub tag: Option<String>,
    pub statuses: Vec<DocumentStatus>,
}

#[derive(Debug, Default)]
pub struct DocumentListStore {
    /// Fetched superset, in the order the server returned it.
    documents: Vec<OcrDocument>,
    displayed_count: usize,
    fully_loaded: bool,
    quick: QuickFilters,
    detailed: Option<DetailedSearch>,
    sort: Option<(SortField, SortOrder)>,
    generation: u64,
}

impl DocumentListStore {
    pub fn new() -> Self {
        DocumentListStore::default()
    }

    /// Start a fetch and return its generation token. Results handed back
    /// with an older token are discarded, so a slow response can never
    /// overwrite a newer one.
    pub fn begin_fetch(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Install fetch results. Returns false (and changes nothing) when the
    /// token is stale. `fully_loaded` marks the superset as complete, which
    /// is what "load more" fetches deliver.
    pub fn complete_fetch(
        &mut self,
        generation: u64,
        documents: Vec<OcrDocument>,
        fully_loaded: bool,
    ) -> bool {
        if generation != self.generation {
            log::debug!(
                "discarding stale fetch (generation {} < {})",
                generation,
                self.generation
            );
            return false;
        }
        self.displayed_count = documents.len().min(PAGE_SIZE);
        self.documents = documents;
        self.fully_loaded = fully_loaded;
        true
    }

    /// Reveal the next page window of the already-fetched superset.
    pub fn reveal_more(&mut self) {
        self.displayed_count = (self.displayed_count + PAGE_SIZE).min(self.documents.len());
    }

    pub fn is_fully_loaded(&self) -> bool {
        self.fully_loaded
    }

    pub fn has_more(&self) -> bool {
        !self.fully_loaded || self.displayed_count < self.documents.len()
    }

    pub fn displayed_count(&self) -> usize {
        self.displayed_count
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Merge a head-refresh batch by id: rows already present are updated in
    /// place (last write wins) without moving; unseen rows are inserted at
    /// the head in batch order. The window grows so no visible row drops out.
    pub fn merge_recent(&mut self, batch: Vec<OcrDocument>) {
        let mut fresh = Vec::new();
        for incoming in batch {
            match self.documents.iter_mut().find(|d| d.id == incoming.id) {
                Some(existing) => *existing = incoming,
                None => fresh.push(incoming),
            }
        }
        let added = fresh.len();
        if added > 0 {
            self.documents.splice(0..0, fresh);
            self.displayed_count = (self.displayed_count + added).min(self.documents.len());
        }
    }

    /// Drop a document (after a delete) without disturbing the rest.
    pub fn remove(&mut self, id: &str) {
        let before = self.documents.len();
        self.documents.retain(|d| d.id != id);
        if self.documents.len() < before && self.displayed_count > 0 {
            self.displayed_count -= 1;
        }
    }

    pub fn set_quick_filters(&mut self, filters: QuickFilters) {
        self.quick = filters;
    }

    pub fn set_detailed_search(&mut self, search: Option<DetailedSearch>) {
        self.detailed = search;
    }

    pub fn detailed_search(&self) -> Option<&DetailedSearch> {
        self.detailed.as_ref()
    }

    /// Select a sort field: the same field again flips the direction, a new
    /// field starts ascending.
    pub fn toggle_sort(&mut self, field: SortField) {
        self.sort = match self.sort {
            Some((current, order)) if current == field => Some((field, order.flipped())),
            _ => Some((field, SortOrder::Ascending)),
        };
    }

    pub fn sort(&self) -> Option<(SortField, SortOrder)> {
        self.sort
    }

    /// The rows currently on screen: filters (unless a detailed search owns
    /// filtering), then sort, then the visible window.
    pub fn visible(&self) -> Vec<&OcrDocument> {
        let mut rows: Vec<&OcrDocument> = if self.detailed.is_some() {
            self.documents.iter().collect()
        } else {
            self.documents.iter().filter(|d| self.quick.matches(d)).collect()
        };

        if let Some((field, order)) = self.sort {
            rows.sort_by(|a, b| {
                let ordering = match field {
                    SortField::FileName => a
                        .file_name
                        .to_lowercase()
                        .cmp(&b.file_name.to_lowercase()),
                    SortField::Status => a.status.sort_priority().cmp(&b.status.sort_priority()),
                    SortField::UploadedDate => a.uploaded_date.cmp(&b.uploaded_date),
                };
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        rows.truncate(self.displayed_count);
        rows
    }
}
