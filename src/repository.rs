//! Entity-shape boundary between the workspace and the record platform.
//! Everything above this trait deals in application entities only; the
//! Dataverse-backed implementation lives in `dataverse`, and the in-memory
//! one here backs tests and offline runs.

use crate::error::WorkspaceError;
use crate::types::{
    DocumentDraft, DocumentPatch, DocumentStatus, FolderDraft, FolderPatch, MenuSection,
    MenuSectionDraft, OcrDocument, OcrFolder,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FolderScope {
    #[default]
    All,
    /// Documents without a folder reference.
    Unfiled,
    In(String),
}

/// Server-side document query: folder scope, detailed-search criteria and a
/// result cap. Quick keyword/status filtering is a client concern.
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    pub folder: FolderScope,
    pub statuses: Vec<DocumentStatus>,
    pub tag: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub top: Option<usize>,
}

impl DocumentQuery {
    pub fn in_folder(folder_id: Option<&str>) -> Self {
        DocumentQuery {
            folder: match folder_id {
                Some(id) => FolderScope::In(id.to_string()),
                None => FolderScope::All,
            },
            ..DocumentQuery::default()
        }
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }
}

pub trait WorkspaceRepository: Send + Sync {
    fn list_menu_sections(&self) -> Result<Vec<MenuSection>, WorkspaceError>;
    fn create_menu_section(&self, draft: &MenuSectionDraft) -> Result<MenuSection, WorkspaceError>;

    fn list_folders(&self) -> Result<Vec<OcrFolder>, WorkspaceError>;
    fn create_folder(&self, draft: &FolderDraft) -> Result<OcrFolder, WorkspaceError>;
    fn update_folder(&self, id: &str, patch: &FolderPatch) -> Result<(), WorkspaceError>;
    fn delete_folder(&self, id: &str) -> Result<(), WorkspaceError>;

    fn list_documents(&self, query: &DocumentQuery) -> Result<Vec<OcrDocument>, WorkspaceError>;
    fn get_document(&self, id: &str) -> Result<Option<OcrDocument>, WorkspaceError>;
    fn create_document(&self, draft: &DocumentDraft) -> Result<OcrDocument, WorkspaceError>;
    fn update_document(&self, id: &str, patch: &DocumentPatch) -> Result<(), WorkspaceError>;
    fn delete_document(&self, id: &str) -> Result<(), WorkspaceError>;
    /// Base64 content of the platform's file column.
    fn get_document_content(&self, id: &str) -> Result<Option<String>, WorkspaceError>;
}

#[derive(Default)]
struct InMemoryState {
    sections: Vec<MenuSection>,
    folders: Vec<OcrFolder>,
    documents: Vec<OcrDocument>,
    contents: HashMap<String, String>,
}

/// Record store with server-style behavior: minted GUIDs, newest-first
/// document ordering, denormalized folder counters recomputed on read.
#[derive(Default)]
pub struct InMemoryRepository {
    state: RwLock<InMemoryState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        InMemoryRepository::default()
    }

    fn mint_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn lock_write(&self) -> Result<std::sync::RwLockWriteGuard<'_, InMemoryState>, WorkspaceError> {
        self.state
            .write()
            .map_err(|e| WorkspaceError::Storage(e.to_string()))
    }

    fn lock_read(&self) -> Result<std::sync::RwLockReadGuard<'_, InMemoryState>, WorkspaceError> {
        self.state
            .read()
            .map_err(|e| WorkspaceError::Storage(e.to_string()))
    }
}

fn matches_query(doc: &OcrDocument, query: &DocumentQuery) -> bool {
    match &query.folder {
        FolderScope::All => {}
        FolderScope::Unfiled => {
            if doc.folder_id.is_some() {
                return false;
            }
        }
        FolderScope::In(id) => {
            if doc.folder_id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
    }
    if !query.statuses.is_empty() && !query.statuses.contains(&doc.status) {
        return false;
    }
    if let Some(tag) = &query.tag {
        if !doc.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            return false;
        }
    }
    if let Some(from) = query.from {
        if doc.uploaded_date < from {
            return false;
        }
    }
    if let Some(to) = query.to {
        if doc.uploaded_date > to {
            return false;
        }
    }
    true
}

impl WorkspaceRepository for InMemoryRepository {
    fn list_menu_sections(&self) -> Result<Vec<MenuSection>, WorkspaceError> {
        let state = self.lock_read()?;
        let mut sections = state.sections.clone();
        sections.sort_by_key(|s| s.display_order);
        Ok(sections)
    }

    fn create_menu_section(&self, draft: &MenuSectionDraft) -> Result<MenuSection, WorkspaceError> {
        let section = MenuSection {
            id: Self::mint_id(),
            name: draft.name.clone(),
            display_order: draft.display_order,
            is_default: draft.is_default,
            color: draft.color.clone(),
        };
        self.lock_write()?.sections.push(section.clone());
        Ok(section)
    }

    fn list_folders(&self) -> Result<Vec<OcrFolder>, WorkspaceError> {
        let state = self.lock_read()?;
        let mut folders = state.folders.clone();
        for folder in &mut folders {
            folder.document_count = state
                .documents
                .iter()
                .filter(|d| d.folder_id.as_deref() == Some(folder.id.as_str()))
                .count() as u32;
            folder.folder_count = state
                .folders
                .iter()
                .filter(|f| f.parent_id.as_deref() == Some(folder.id.as_str()))
                .count() as u32;
        }
        folders.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(folders)
    }

    fn create_folder(&self, draft: &FolderDraft) -> Result<OcrFolder, WorkspaceError> {
        let now = Utc::now();
        let folder = OcrFolder {
            id: Self::mint_id(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            color: draft.color.clone(),
            parent_id: draft.parent_id.clone(),
            menu_section: draft.menu_section.clone(),
            path: draft.path.clone(),
            document_count: 0,
            folder_count: 0,
            created_on: now,
            modified_on: now,
        };
        self.lock_write()?.folders.push(folder.clone());
        Ok(folder)
    }

    fn update_folder(&self, id: &str, patch: &FolderPatch) -> Result<(), WorkspaceError> {
        let mut state = self.lock_write()?;
        let folder = state
            .folders
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| WorkspaceError::NotFound("Folder".to_string()))?;
        if let Some(name) = &patch.name {
            folder.name = name.clone();
        }
        if let Some(description) = &patch.description {
            folder.description = Some(description.clone());
        }
        if let Some(color) = &patch.color {
            folder.color = Some(color.clone());
        }
        if let Some(parent) = &patch.parent_id {
            folder.parent_id = parent.clone();
        }
        if let Some(section) = &patch.menu_section {
            folder.menu_section = section.clone();
        }
        if let Some(path) = &patch.path {
            folder.path = path.clone();
        }
        folder.modified_on = Utc::now();
        Ok(())
    }

    fn delete_folder(&self, id: &str) -> Result<(), WorkspaceError> {
        let mut state = self.lock_write()?;
        let before = state.folders.len();
        state.folders.retain(|f| f.id != id);
        if state.folders.len() == before {
            return Err(WorkspaceError::NotFound("Folder".to_string()));
        }
        Ok(())
    }

    fn list_documents(&self, query: &DocumentQuery) -> Result<Vec<OcrDocument>, WorkspaceError> {
        let state = self.lock_read()?;
        let mut documents: Vec<OcrDocument> = state
            .documents
            .iter()
            .filter(|d| matches_query(d, query))
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.uploaded_date.cmp(&a.uploaded_date));
        if let Some(top) = query.top {
            documents.truncate(top);
        }
        Ok(documents)
    }

    fn get_document(&self, id: &str) -> Result<Option<OcrDocument>, WorkspaceError> {
        let state = self.lock_read()?;
        Ok(state.documents.iter().find(|d| d.id == id).cloned())
    }

    fn create_document(&self, draft: &DocumentDraft) -> Result<OcrDocument, WorkspaceError> {
        let document = OcrDocument {
            id: Self::mint_id(),
            file_name: draft.file_name.clone(),
            file_type: draft.file_type.clone(),
            file_size: draft.file_size,
            file_url: draft.file_url.clone(),
            folder_id: draft.folder_id.clone(),
            status: draft.status,
            tags: draft.tags.clone(),
            uploaded_date: Utc::now(),
            ocr_result: None,
        };
        let mut state = self.lock_write()?;
        if let Some(content) = &draft.content_base64 {
            state.contents.insert(document.id.clone(), content.clone());
        }
        state.documents.push(document.clone());
        Ok(document)
    }

    fn update_document(&self, id: &str, patch: &DocumentPatch) -> Result<(), WorkspaceError> {
        let mut state = self.lock_write()?;
        let document = state
            .documents
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| WorkspaceError::NotFound("Document".to_string()))?;
        if let Some(file_name) = &patch.file_name {
            document.file_name = file_name.clone();
        }
        if let Some(folder) = &patch.folder_id {
            document.folder_id = folder.clone();
        }
        if let Some(tags) = &patch.tags {
            document.tags = tags.clone();
        }
        if let Some(status) = patch.status {
            document.status = status;
        }
        if let Some(url) = &patch.file_url {
            document.file_url = Some(url.clone());
        }
        if let Some(result) = &patch.ocr_result {
            document.ocr_result = result.clone();
        }
        Ok(())
    }

    fn delete_document(&self, id: &str) -> Result<(), WorkspaceError> {
        let mut state = self.lock_write()?;
        let before = state.documents.len();
        state.documents.retain(|d| d.id != id);
        if state.documents.len() == before {
            return Err(WorkspaceError::NotFound("Document".to_string()));
        }
        state.contents.remove(id);
        Ok(())
    }

    fn get_document_content(&self, id: &str) -> Result<Option<String>, WorkspaceError> {
        let state = self.lock_read()?;
        Ok(state.contents.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, folder: Option<&str>) -> DocumentDraft {
        DocumentDraft {
            file_name: name.to_string(),
            file_type: "image/png".to_string(),
            file_size: 64,
            folder_id: folder.map(String::from),
            tags: vec!["scan".to_string()],
            content_base64: Some("aGVsbG8=".to_string()),
            file_url: None,
            status: DocumentStatus::Uploaded,
        }
    }

    #[test]
    fn documents_list_newest_first_with_top() {
        let repo = InMemoryRepository::new();
        let first = repo.create_document(&draft("first.png", None)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = repo.create_document(&draft("second.png", None)).unwrap();
        let all = repo.list_documents(&DocumentQuery::default()).unwrap();
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
        let top = repo
            .list_documents(&DocumentQuery::default().with_top(1))
            .unwrap();
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn folder_scope_filters_documents() {
        let repo = InMemoryRepository::new();
        repo.create_document(&draft("unfiled.png", None)).unwrap();
        repo.create_document(&draft("filed.png", Some("f-1"))).unwrap();
        let unfiled = repo
            .list_documents(&DocumentQuery {
                folder: FolderScope::Unfiled,
                ..DocumentQuery::default()
            })
            .unwrap();
        assert_eq!(unfiled.len(), 1);
        assert_eq!(unfiled[0].file_name, "unfiled.png");
        let filed = repo
            .list_documents(&DocumentQuery::in_folder(Some("f-1")))
            .unwrap();
        assert_eq!(filed.len(), 1);
        assert_eq!(filed[0].file_name, "filed.png");
    }

    #[test]
    fn folder_counters_are_recomputed_on_read() {
        let repo = InMemoryRepository::new();
        let root = repo
            .create_folder(&FolderDraft {
                name: "Root".to_string(),
                description: None,
                color: None,
                parent_id: None,
                menu_section: None,
                path: "Root".to_string(),
            })
            .unwrap();
        repo.create_folder(&FolderDraft {
            name: "Child".to_string(),
            description: None,
            color: None,
            parent_id: Some(root.id.clone()),
            menu_section: None,
            path: "Root/Child".to_string(),
        })
        .unwrap();
        repo.create_document(&draft("doc.png", Some(&root.id))).unwrap();
        let folders = repo.list_folders().unwrap();
        let root_row = folders.iter().find(|f| f.id == root.id).unwrap();
        assert_eq!(root_row.folder_count, 1);
        assert_eq!(root_row.document_count, 1);
    }

    #[test]
    fn content_is_stored_and_removed_with_the_document() {
        let repo = InMemoryRepository::new();
        let doc = repo.create_document(&draft("scan.png", None)).unwrap();
        assert_eq!(
            repo.get_document_content(&doc.id).unwrap(),
            Some("aGVsbG8=".to_string())
        );
        repo.delete_document(&doc.id).unwrap();
        assert_eq!(repo.get_document_content(&doc.id).unwrap(), None);
        assert!(repo.delete_document(&doc.id).is_err());
    }
}
