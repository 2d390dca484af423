//! In-process per-folder document cache. Mirrors the persisted cache with a
//! short TTL; structural mutations invalidate entries explicitly. The cache
//! is owned by the app state and handed around, not ambient.

use crate::types::OcrDocument;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Entries older than this are dropped on read.
pub const CACHE_TTL_SECS: i64 = 300;

/// Cache key for a folder scope (None covers the unfiltered list).
pub fn cache_key(folder_id: Option<&str>) -> String {
    folder_id.unwrap_or("all").to_string()
}

#[derive(Clone)]
struct Entry {
    documents: Vec<OcrDocument>,
    cached_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct DocumentCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        DocumentCache::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<OcrDocument>> {
        let stale = {
            let guard = self.entries.read().ok()?;
            match guard.get(key) {
                Some(entry) if (Utc::now() - entry.cached_at).num_seconds() <= CACHE_TTL_SECS => {
                    return Some(entry.documents.clone());
                }
                Some(_) => true,
                None => false,
            }
        };
        if stale {
            self.invalidate(key);
        }
        None
    }

    pub fn set(&self, key: &str, documents: Vec<OcrDocument>) {
        if let Ok(mut guard) = self.entries.write() {
            guard.insert(
                key.to_string(),
                Entry {
                    documents,
                    cached_at: Utc::now(),
                },
            );
        }
    }

    pub fn invalidate(&self, key: &str) {
        if let Ok(mut guard) = self.entries.write() {
            guard.remove(key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.entries.write() {
            guard.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentStatus;

    fn doc(id: &str) -> OcrDocument {
        OcrDocument {
            id: id.to_string(),
            file_name: format!("{}.pdf", id),
            file_type: "application/pdf".to_string(),
            file_size: 10,
            file_url: None,
            folder_id: None,
            status: DocumentStatus::Uploaded,
            tags: Vec::new(),
            uploaded_date: Utc::now(),
            ocr_result: None,
        }
    }

    #[test]
    fn cached_documents_come_back_until_invalidated() {
        let cache = DocumentCache::new();
        let key = cache_key(Some("folder-1"));
        assert!(cache.get(&key).is_none());
        cache.set(&key, vec![doc("one")]);
        let cached = cache.get(&key).unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, "one");
        cache.invalidate(&key);
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn clear_empties_every_scope() {
        let cache = DocumentCache::new();
        cache.set(&cache_key(None), vec![doc("a")]);
        cache.set(&cache_key(Some("f1")), vec![doc("b")]);
        cache.clear();
        assert!(cache.get(&cache_key(None)).is_none());
        assert!(cache.get(&cache_key(Some("f1"))).is_none());
    }

    #[test]
    fn keys_scope_by_folder() {
        assert_eq!(cache_key(None), "all");
        assert_eq!(cache_key(Some("f1")), "f1");
    }
}
