//! UI action points. Every command validates first, talks to the façade,
//! keeps the persisted workspace state in sync, and flattens errors to
//! strings the UI can toast or alert.

use crate::cache::document_cache::{cache_key, DocumentCache};
use crate::db::Db;
use crate::document_list::{
    DetailedSearch, DocumentListStore, QuickFilters, SortField, PAGE_SIZE, RECENT_LIMIT,
};
use crate::folder_tree::{self, FolderTreeNode};
use crate::ocr::{OcrClient, ResultEditor};
use crate::repository::DocumentQuery;
use crate::services::document_service::{DocumentService, DocumentUpload};
use crate::types::{
    DocumentPatch, DocumentStatus, FolderDraft, FolderPatch, MenuSection, MenuSectionDraft,
    OcrDocument, OcrFolder, OcrResult,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;

pub struct AppState {
    pub service: DocumentService,
    pub db: Mutex<Option<Db>>,
    pub list: Mutex<DocumentListStore>,
    pub cache: DocumentCache,
    pub ui: Mutex<UiState>,
}

/// Session UI state, hydrated from the persisted store on startup and
/// written through on every mutation.
#[derive(Debug, Default, Clone)]
pub struct UiState {
    pub expanded: HashSet<String>,
    pub selected_folder: Option<String>,
}

impl AppState {
    pub fn new(service: DocumentService, db: Db) -> Result<Self, String> {
        let ui = UiState {
            expanded: db.expanded_folders()?,
            selected_folder: db.selected_folder()?,
        };
        Ok(AppState {
            service,
            db: Mutex::new(Some(db)),
            list: Mutex::new(DocumentListStore::new()),
            cache: DocumentCache::new(),
            ui: Mutex::new(ui),
        })
    }
}

fn with_db<T>(state: &AppState, f: impl FnOnce(&Db) -> Result<T, String>) -> Result<T, String> {
    let db = state.db.lock().map_err(|e| e.to_string())?;
    let db = db.as_ref().ok_or("Database not initialized")?;
    f(db)
}

#[derive(Deserialize)]
pub struct CreateFolderPayload {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub parent_id: Option<String>,
    pub menu_section: Option<String>,
}

#[derive(Deserialize)]
pub struct MoveFolderPayload {
    pub id: String,
    pub new_parent_id: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateMenuSectionPayload {
    pub name: String,
    pub display_order: i32,
    pub is_default: bool,
    pub color: Option<String>,
}

#[derive(Deserialize)]
pub struct UploadDocumentPayload {
    pub file_name: String,
    pub file_type: String,
    pub content_base64: String,
    pub folder_id: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct DetailedSearchPayload {
    pub folder_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub tag: Option<String>,
    pub statuses: Vec<String>,
}

#[derive(Deserialize)]
pub struct RunOcrPayload {
    pub document_id: String,
    pub document_type: String,
    pub provider_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct FieldEdit {
    pub field_id: String,
    pub value: String,
}

#[derive(Deserialize)]
pub struct SaveFieldEditsPayload {
    pub document_id: String,
    pub edits: Vec<FieldEdit>,
}

/// What a cascading folder delete would remove; shown in the confirmation
/// dialog before anything happens.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeScope {
    pub folder_id: String,
    pub descendant_names: Vec<String>,
    pub document_count: usize,
}

pub fn get_ocr_status() -> String {
    OcrClient::status().to_string()
}

pub fn get_platform_status() -> String {
    let _ = dotenvy::dotenv();
    match (
        std::env::var("DATAVERSE_URL"),
        std::env::var("DATAVERSE_TOKEN"),
    ) {
        (Ok(u), Ok(t)) if !u.trim().is_empty() && !t.trim().is_empty() => "configured".to_string(),
        _ => "not_configured".to_string(),
    }
}

// ---- Menu sections ----

pub fn list_menu_sections(state: &AppState) -> Vec<MenuSection> {
    state.service.menu_sections()
}

pub fn create_menu_section(
    state: &AppState,
    payload: CreateMenuSectionPayload,
) -> Result<MenuSection, String> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err("Section name is required.".to_string());
    }
    let existing = state.service.menu_sections();
    if existing.iter().any(|s| s.name.eq_ignore_ascii_case(name)) {
        return Err(format!("A section named '{}' already exists.", name));
    }
    state
        .service
        .create_menu_section(&MenuSectionDraft {
            name: name.to_string(),
            display_order: payload.display_order,
            is_default: payload.is_default,
            color: payload.color,
        })
        .map_err(|e| e.to_string())
}

// ---- Folders ----

/// The folder tree for one menu section, rebuilt from the flat list.
pub fn folder_tree_for_section(state: &AppState, section_id: &str) -> Vec<FolderTreeNode> {
    let folders = state.service.folders();
    let sectioned: Vec<OcrFolder> = folder_tree::section_folders(&folders, section_id)
        .into_iter()
        .cloned()
        .collect();
    folder_tree::build_folder_tree(&sectioned, None)
}

pub fn create_folder(state: &AppState, payload: CreateFolderPayload) -> Result<OcrFolder, String> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err("Folder name is required.".to_string());
    }
    let folders = state.service.folders();
    folder_tree::validate_new_parent(&folders, payload.parent_id.as_deref())
        .map_err(|e| e.to_string())?;
    if folder_tree::name_in_use(
        &folders,
        payload.parent_id.as_deref(),
        payload.menu_section.as_deref(),
        name,
        None,
    ) {
        return Err(format!("A folder named '{}' already exists here.", name));
    }
    let parent_path = payload
        .parent_id
        .as_deref()
        .and_then(|pid| folders.iter().find(|f| f.id == pid))
        .map(|f| f.path.clone());
    let draft = FolderDraft {
        name: name.to_string(),
        description: payload.description,
        color: payload.color,
        parent_id: payload.parent_id,
        menu_section: payload.menu_section,
        path: folder_tree::folder_path(parent_path.as_deref(), name),
    };
    state.service.create_folder(&draft).map_err(|e| e.to_string())
}

pub fn rename_folder(state: &AppState, id: &str, new_name: &str) -> Result<(), String> {
    let name = new_name.trim();
    if name.is_empty() {
        return Err("Folder name is required.".to_string());
    }
    let folders = state.service.folders();
    let folder = folders
        .iter()
        .find(|f| f.id == id)
        .ok_or("Folder not found.")?;
    if folder_tree::name_in_use(
        &folders,
        folder.parent_id.as_deref(),
        folder.menu_section.as_deref(),
        name,
        Some(id),
    ) {
        return Err(format!("A folder named '{}' already exists here.", name));
    }
    let parent_path = folder
        .parent_id
        .as_deref()
        .and_then(|pid| folders.iter().find(|f| f.id == pid))
        .map(|f| f.path.clone());
    let updates = folder_tree::recomputed_paths(&folders, id, Some(name), parent_path.as_deref());
    for (folder_id, path) in updates {
        let mut patch = FolderPatch {
            path: Some(path),
            ..FolderPatch::default()
        };
        if folder_id == id {
            patch.name = Some(name.to_string());
        }
        state
            .service
            .update_folder(&folder_id, &patch)
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

pub fn recolor_folder(state: &AppState, id: &str, color: &str) -> Result<(), String> {
    state
        .service
        .update_folder(
            id,
            &FolderPatch {
                color: Some(color.to_string()),
                ..FolderPatch::default()
            },
        )
        .map_err(|e| e.to_string())
}

/// Move a folder under a new parent (None for the top level). Validates the
/// target, then rewrites the subtree's materialized paths depth-first.
pub fn move_folder(state: &AppState, payload: MoveFolderPayload) -> Result<(), String> {
    let folders = state.service.folders();
    folder_tree::validate_move(&folders, &payload.id, payload.new_parent_id.as_deref())
        .map_err(|e| e.to_string())?;
    let folder = folders
        .iter()
        .find(|f| f.id == payload.id)
        .ok_or("Folder not found.")?;
    if folder_tree::name_in_use(
        &folders,
        payload.new_parent_id.as_deref(),
        folder.menu_section.as_deref(),
        &folder.name,
        Some(&payload.id),
    ) {
        return Err(format!(
            "A folder named '{}' already exists in the target folder.",
            folder.name
        ));
    }
    let parent_path = payload
        .new_parent_id
        .as_deref()
        .and_then(|pid| folders.iter().find(|f| f.id == pid))
        .map(|f| f.path.clone());
    let updates =
        folder_tree::recomputed_paths(&folders, &payload.id, None, parent_path.as_deref());
    for (folder_id, path) in updates {
        let mut patch = FolderPatch {
            path: Some(path),
            ..FolderPatch::default()
        };
        if folder_id == payload.id {
            patch.parent_id = Some(payload.new_parent_id.clone());
        }
        state
            .service
            .update_folder(&folder_id, &patch)
            .map_err(|e| e.to_string())?;
    }
    invalidate_document_caches(state);
    Ok(())
}

/// Everything a cascading delete of `id` would touch.
pub fn folder_cascade_scope(state: &AppState, id: &str) -> Result<CascadeScope, String> {
    let folders = state.service.folders();
    let descendants = folder_tree::descendant_ids(&folders, id);
    let descendant_names = descendants
        .iter()
        .filter_map(|did| folders.iter().find(|f| &f.id == did))
        .map(|f| f.path.clone())
        .collect();
    let mut document_count = 0;
    for folder_id in std::iter::once(id.to_string()).chain(descendants.iter().cloned()) {
        document_count += state
            .service
            .documents(&DocumentQuery::in_folder(Some(&folder_id)))
            .len();
    }
    Ok(CascadeScope {
        folder_id: id.to_string(),
        descendant_names,
        document_count,
    })
}

/// Delete a folder. A folder with sub-folders requires `confirm_cascade`;
/// deletion runs children-before-parent so no child ever points at a
/// removed parent. Documents survive — their folder reference is cleared.
pub fn delete_folder(state: &AppState, id: &str, confirm_cascade: bool) -> Result<(), String> {
    let folders = state.service.folders();
    if !folders.iter().any(|f| f.id == id) {
        return Err("Folder not found.".to_string());
    }
    let descendants = folder_tree::descendant_ids(&folders, id);
    if !descendants.is_empty() && !confirm_cascade {
        let scope = folder_cascade_scope(state, id)?;
        return Err(format!(
            "Folder contains {} sub-folder(s): {}. Confirm to delete them all.",
            scope.descendant_names.len(),
            scope.descendant_names.join(", ")
        ));
    }

    let order = folder_tree::deletion_order(&folders, id);
    // Detach documents first so none of them is left pointing at a folder
    // that is about to disappear.
    for folder_id in &order {
        for doc in state
            .service
            .documents(&DocumentQuery::in_folder(Some(folder_id)))
        {
            state
                .service
                .update_document(
                    &doc.id,
                    &DocumentPatch {
                        folder_id: Some(None),
                        ..DocumentPatch::default()
                    },
                )
                .map_err(|e| e.to_string())?;
        }
    }
    for folder_id in &order {
        state
            .service
            .delete_folder(folder_id)
            .map_err(|e| e.to_string())?;
    }

    // Drop deleted folders from the persisted UI state.
    {
        let mut ui = state.ui.lock().map_err(|e| e.to_string())?;
        for folder_id in &order {
            ui.expanded.remove(folder_id);
        }
        if ui
            .selected_folder
            .as_ref()
            .map(|sel| order.contains(sel))
            .unwrap_or(false)
        {
            ui.selected_folder = None;
        }
        let expanded = ui.expanded.clone();
        let selected = ui.selected_folder.clone();
        drop(ui);
        with_db(state, |db| {
            db.set_expanded_folders(&expanded)?;
            db.set_selected_folder(selected.as_deref())
        })?;
    }

    notify_documents_updated(state);
    Ok(())
}

// ---- Documents ----

pub fn upload_document(
    state: &AppState,
    payload: UploadDocumentPayload,
) -> Result<OcrDocument, String> {
    let bytes = BASE64
        .decode(payload.content_base64.trim())
        .map_err(|e| format!("Invalid base64: {}", e))?;
    let document = state
        .service
        .upload_document(DocumentUpload {
            file_name: payload.file_name,
            file_type: payload.file_type,
            bytes,
            folder_id: payload.folder_id,
            tags: payload.tags,
        })
        .map_err(|e| e.to_string())?;
    notify_documents_updated(state);
    Ok(document)
}

/// First page for a folder: in-process cache, then the persisted cache,
/// then the platform.
pub fn list_documents(
    state: &AppState,
    folder_id: Option<&str>,
) -> Result<Vec<OcrDocument>, String> {
    let key = cache_key(folder_id);
    let mut list = state.list.lock().map_err(|e| e.to_string())?;
    let generation = list.begin_fetch();

    if let Some(cached) = state.cache.get(&key) {
        list.complete_fetch(generation, cached, false);
        return Ok(visible_rows(&list));
    }
    if let Ok(Some(payload)) = with_db(state, |db| db.cached_documents(&key)) {
        if let Ok(documents) = serde_json::from_str::<Vec<OcrDocument>>(&payload) {
            state.cache.set(&key, documents.clone());
            list.complete_fetch(generation, documents, false);
            return Ok(visible_rows(&list));
        }
    }

    let documents = state
        .service
        .documents(&DocumentQuery::in_folder(folder_id).with_top(PAGE_SIZE));
    state.cache.set(&key, documents.clone());
    if let Ok(payload) = serde_json::to_string(&documents) {
        let _ = with_db(state, |db| db.upsert_document_cache(&key, &payload));
    }
    list.complete_fetch(generation, documents, false);
    Ok(visible_rows(&list))
}

/// "Load more": materialize the full set once, then widen the window.
pub fn load_more_documents(
    state: &AppState,
    folder_id: Option<&str>,
) -> Result<Vec<OcrDocument>, String> {
    let mut list = state.list.lock().map_err(|e| e.to_string())?;
    if !list.is_fully_loaded() {
        let generation = list.begin_fetch();
        let documents = state.service.documents(&DocumentQuery::in_folder(folder_id));
        if !list.complete_fetch(generation, documents, true) {
            return Ok(visible_rows(&list));
        }
    }
    list.reveal_more();
    Ok(visible_rows(&list))
}

pub fn refresh_recent_documents(state: &AppState) -> Result<(), String> {
    let recent = state.service.recent_documents(RECENT_LIMIT);
    let mut list = state.list.lock().map_err(|e| e.to_string())?;
    list.merge_recent(recent);
    Ok(())
}

pub fn apply_detailed_search(
    state: &AppState,
    payload: DetailedSearchPayload,
) -> Result<Vec<OcrDocument>, String> {
    let mut statuses = Vec::new();
    for raw in &payload.statuses {
        statuses.push(
            DocumentStatus::parse(raw).ok_or_else(|| format!("Unknown status: {}", raw))?,
        );
    }
    let query = DocumentQuery {
        folder: match payload.folder_id.as_deref() {
            Some(id) => crate::repository::FolderScope::In(id.to_string()),
            None => crate::repository::FolderScope::All,
        },
        statuses: statuses.clone(),
        tag: payload.tag.clone(),
        from: payload.from,
        to: payload.to,
        top: None,
    };
    let documents = state.service.documents(&query);
    let mut list = state.list.lock().map_err(|e| e.to_string())?;
    let generation = list.begin_fetch();
    list.complete_fetch(generation, documents, true);
    list.set_detailed_search(Some(DetailedSearch {
        from: payload.from,
        to: payload.to,
        tag: payload.tag,
        statuses,
    }));
    Ok(visible_rows(&list))
}

pub fn clear_detailed_search(state: &AppState) -> Result<(), String> {
    let mut list = state.list.lock().map_err(|e| e.to_string())?;
    list.set_detailed_search(None);
    Ok(())
}

pub fn set_quick_filters(
    state: &AppState,
    keyword: Option<String>,
    status: Option<String>,
) -> Result<(), String> {
    let status = match status.as_deref() {
        Some(raw) => Some(DocumentStatus::parse(raw).ok_or_else(|| format!("Unknown status: {}", raw))?),
        None => None,
    };
    let mut list = state.list.lock().map_err(|e| e.to_string())?;
    list.set_quick_filters(QuickFilters {
        keyword: keyword.filter(|k| !k.trim().is_empty()),
        status,
    });
    Ok(())
}

pub fn toggle_sort(state: &AppState, field: SortField) -> Result<Vec<OcrDocument>, String> {
    let mut list = state.list.lock().map_err(|e| e.to_string())?;
    list.toggle_sort(field);
    Ok(visible_rows(&list))
}

pub fn visible_documents(state: &AppState) -> Result<Vec<OcrDocument>, String> {
    let list = state.list.lock().map_err(|e| e.to_string())?;
    Ok(visible_rows(&list))
}

fn visible_rows(list: &DocumentListStore) -> Vec<OcrDocument> {
    list.visible().into_iter().cloned().collect()
}

pub fn get_document(state: &AppState, id: &str) -> Option<OcrDocument> {
    state.service.document(id)
}

pub fn rename_document(state: &AppState, id: &str, file_name: &str) -> Result<(), String> {
    if file_name.trim().is_empty() {
        return Err("File name is required.".to_string());
    }
    state
        .service
        .update_document(
            id,
            &DocumentPatch {
                file_name: Some(file_name.trim().to_string()),
                ..DocumentPatch::default()
            },
        )
        .map_err(|e| e.to_string())?;
    notify_documents_updated(state);
    Ok(())
}

pub fn retag_document(state: &AppState, id: &str, tags: Vec<String>) -> Result<(), String> {
    state
        .service
        .update_document(
            id,
            &DocumentPatch {
                tags: Some(tags),
                ..DocumentPatch::default()
            },
        )
        .map_err(|e| e.to_string())?;
    notify_documents_updated(state);
    Ok(())
}

pub fn move_document(
    state: &AppState,
    id: &str,
    folder_id: Option<String>,
) -> Result<(), String> {
    if let Some(folder_id) = folder_id.as_deref() {
        let folders = state.service.folders();
        if !folders.iter().any(|f| f.id == folder_id) {
            return Err("Target folder not found.".to_string());
        }
    }
    state
        .service
        .update_document(
            id,
            &DocumentPatch {
                folder_id: Some(folder_id),
                ..DocumentPatch::default()
            },
        )
        .map_err(|e| e.to_string())?;
    notify_documents_updated(state);
    Ok(())
}

pub fn delete_document(state: &AppState, id: &str) -> Result<(), String> {
    state.service.delete_document(id).map_err(|e| e.to_string())?;
    if let Ok(mut list) = state.list.lock() {
        list.remove(id);
    }
    notify_documents_updated(state);
    Ok(())
}

// ---- OCR ----

/// Run recognition for a document: uploaded → processing → completed, or
/// error when the API call fails.
pub fn run_document_ocr(state: &AppState, payload: RunOcrPayload) -> Result<OcrResult, String> {
    let document = state
        .service
        .document(&payload.document_id)
        .ok_or("Document not found.")?;
    let content = match state
        .service
        .repository()
        .get_document_content(&payload.document_id)
        .map_err(|e| e.to_string())?
    {
        Some(content) => content,
        None => document
            .file_url
            .clone()
            .ok_or("Document has no file content to recognize.")?,
    };

    set_document_status(state, &payload.document_id, DocumentStatus::Processing)?;

    let client = OcrClient::from_env().map_err(|e| e.to_string())?;
    match client.recognize(&content, &payload.document_type, payload.provider_id) {
        Ok(recognition) => {
            let result = recognition.into_result(&payload.document_id);
            state
                .service
                .update_document(
                    &payload.document_id,
                    &DocumentPatch {
                        status: Some(DocumentStatus::Completed),
                        ocr_result: Some(Some(result.clone())),
                        ..DocumentPatch::default()
                    },
                )
                .map_err(|e| e.to_string())?;
            notify_documents_updated(state);
            Ok(result)
        }
        Err(e) => {
            if let Err(update_err) =
                set_document_status(state, &payload.document_id, DocumentStatus::Error)
            {
                log::warn!("could not record error status: {}", update_err);
            }
            notify_documents_updated(state);
            Err(e.to_string())
        }
    }
}

fn set_document_status(state: &AppState, id: &str, status: DocumentStatus) -> Result<(), String> {
    state
        .service
        .update_document(
            id,
            &DocumentPatch {
                status: Some(status),
                ..DocumentPatch::default()
            },
        )
        .map_err(|e| e.to_string())
}

/// Apply field edits collected in the editor and persist the result.
pub fn save_field_edits(
    state: &AppState,
    payload: SaveFieldEditsPayload,
) -> Result<OcrResult, String> {
    let document = state
        .service
        .document(&payload.document_id)
        .ok_or("Document not found.")?;
    let result = document
        .ocr_result
        .ok_or("Document has no OCR result to edit.")?;
    let mut editor = ResultEditor::new(result);
    for edit in &payload.edits {
        if !editor.edit_field(&edit.field_id, &edit.value) {
            return Err(format!("Unknown field: {}", edit.field_id));
        }
    }
    let result = editor.into_result();
    state
        .service
        .update_document(
            &payload.document_id,
            &DocumentPatch {
                ocr_result: Some(Some(result.clone())),
                ..DocumentPatch::default()
            },
        )
        .map_err(|e| e.to_string())?;
    notify_documents_updated(state);
    Ok(result)
}

// ---- Persisted UI state ----

pub fn selected_folder(state: &AppState) -> Result<Option<String>, String> {
    Ok(state.ui.lock().map_err(|e| e.to_string())?.selected_folder.clone())
}

pub fn select_folder(state: &AppState, folder_id: Option<String>) -> Result<(), String> {
    {
        let mut ui = state.ui.lock().map_err(|e| e.to_string())?;
        ui.selected_folder = folder_id.clone();
    }
    with_db(state, |db| db.set_selected_folder(folder_id.as_deref()))
}

pub fn expanded_folders(state: &AppState) -> Result<Vec<String>, String> {
    let ui = state.ui.lock().map_err(|e| e.to_string())?;
    let mut ids: Vec<String> = ui.expanded.iter().cloned().collect();
    ids.sort();
    Ok(ids)
}

/// Flip a folder's expansion state; returns the new state.
pub fn toggle_folder_expanded(state: &AppState, folder_id: &str) -> Result<bool, String> {
    let (expanded_now, snapshot) = {
        let mut ui = state.ui.lock().map_err(|e| e.to_string())?;
        let expanded_now = if ui.expanded.remove(folder_id) {
            false
        } else {
            ui.expanded.insert(folder_id.to_string());
            true
        };
        (expanded_now, ui.expanded.clone())
    };
    with_db(state, |db| db.set_expanded_folders(&snapshot))?;
    Ok(expanded_now)
}

/// Explicit user action: wipe the persisted workspace state and caches.
pub fn reset_workspace_state(state: &AppState) -> Result<(), String> {
    {
        let mut ui = state.ui.lock().map_err(|e| e.to_string())?;
        *ui = UiState::default();
    }
    state.cache.clear();
    with_db(state, |db| db.reset_ui_state())
}

// ---- Change notification ----

fn invalidate_document_caches(state: &AppState) {
    state.cache.clear();
    if let Err(e) = with_db(state, |db| db.clear_document_cache().map(|_| ())) {
        log::warn!("could not clear persisted document cache: {}", e);
    }
}

/// Fired after uploads, deletes and edits: caches are stale, and the list
/// head is refreshed with the newest documents.
pub fn notify_documents_updated(state: &AppState) {
    invalidate_document_caches(state);
    if let Err(e) = refresh_recent_documents(state) {
        log::warn!("recent-documents refresh failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryRepository, WorkspaceRepository};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ocr-workspace-cmd-{}-{}", tag, std::process::id()))
    }

    fn app(tag: &str) -> AppState {
        let dir = temp_dir(tag);
        let _ = std::fs::remove_dir_all(&dir);
        let repo = Arc::new(InMemoryRepository::new());
        let service = DocumentService::new(repo, dir.join("previews"));
        let db = Db::new(dir.join("workspace.db")).unwrap();
        AppState::new(service, db).unwrap()
    }

    fn make_folder(state: &AppState, name: &str, parent: Option<&str>) -> OcrFolder {
        create_folder(
            state,
            CreateFolderPayload {
                name: name.to_string(),
                description: None,
                color: None,
                parent_id: parent.map(String::from),
                menu_section: None,
            },
        )
        .unwrap()
    }

    fn upload(state: &AppState, name: &str, folder: Option<&str>) -> OcrDocument {
        upload_document(
            state,
            UploadDocumentPayload {
                file_name: name.to_string(),
                file_type: "image/png".to_string(),
                content_base64: BASE64.encode(b"fake image bytes"),
                folder_id: folder.map(String::from),
                tags: Vec::new(),
            },
        )
        .unwrap()
    }

    #[test]
    fn duplicate_folder_names_are_rejected_per_location() {
        let state = app("dup");
        make_folder(&state, "Invoices", None);
        let err = create_folder(
            &state,
            CreateFolderPayload {
                name: " invoices ".to_string(),
                description: None,
                color: None,
                parent_id: None,
                menu_section: None,
            },
        )
        .unwrap_err();
        assert!(err.contains("already exists"));
    }

    #[test]
    fn sub_folder_of_a_sub_folder_is_refused() {
        let state = app("depth");
        let root = make_folder(&state, "Root", None);
        let child = make_folder(&state, "Child", Some(&root.id));
        assert_eq!(child.path, "Root/Child");
        let err = create_folder(
            &state,
            CreateFolderPayload {
                name: "Grandchild".to_string(),
                description: None,
                color: None,
                parent_id: Some(child.id),
                menu_section: None,
            },
        )
        .unwrap_err();
        assert!(err.contains("one level"));
    }

    #[test]
    fn move_rewrites_subtree_paths() {
        let state = app("move");
        let a = make_folder(&state, "A", None);
        let b = make_folder(&state, "B", Some(&a.id));
        let c = make_folder(&state, "C", None);
        move_folder(
            &state,
            MoveFolderPayload {
                id: b.id.clone(),
                new_parent_id: Some(c.id.clone()),
            },
        )
        .unwrap();
        let folders = state.service.folders();
        let moved = folders.iter().find(|f| f.id == b.id).unwrap();
        assert_eq!(moved.parent_id.as_deref(), Some(c.id.as_str()));
        assert_eq!(moved.path, "C/B");
    }

    #[test]
    fn move_into_own_subtree_changes_nothing() {
        let state = app("cycle");
        let a = make_folder(&state, "A", None);
        let b = make_folder(&state, "B", Some(&a.id));
        assert!(move_folder(
            &state,
            MoveFolderPayload {
                id: a.id.clone(),
                new_parent_id: Some(b.id.clone()),
            },
        )
        .is_err());
        let folders = state.service.folders();
        let unchanged = folders.iter().find(|f| f.id == a.id).unwrap();
        assert_eq!(unchanged.parent_id, None);
        assert_eq!(unchanged.path, "A");
    }

    #[test]
    fn cascade_delete_requires_confirmation_and_keeps_documents() {
        let state = app("cascade");
        let root = make_folder(&state, "Root", None);
        let child = make_folder(&state, "Child", Some(&root.id));
        let doc = upload(&state, "kept.png", Some(&child.id));

        let err = delete_folder(&state, &root.id, false).unwrap_err();
        assert!(err.contains("Confirm"));
        assert_eq!(state.service.folders().len(), 2);

        delete_folder(&state, &root.id, true).unwrap();
        assert!(state.service.folders().is_empty());
        let survivor = state.service.document(&doc.id).unwrap();
        assert_eq!(survivor.folder_id, None);
    }

    #[test]
    fn delete_clears_selection_and_expansion_of_removed_folders() {
        let state = app("selection");
        let root = make_folder(&state, "Root", None);
        let child = make_folder(&state, "Child", Some(&root.id));
        select_folder(&state, Some(child.id.clone())).unwrap();
        toggle_folder_expanded(&state, &root.id).unwrap();

        delete_folder(&state, &root.id, true).unwrap();
        assert_eq!(selected_folder(&state).unwrap(), None);
        assert!(expanded_folders(&state).unwrap().is_empty());
    }

    #[test]
    fn upload_then_list_and_load_more() {
        let state = app("paging");
        for i in 0..25 {
            upload(&state, &format!("doc-{:02}.png", i), None);
        }
        let first_page = list_documents(&state, None).unwrap();
        assert_eq!(first_page.len(), PAGE_SIZE);
        let widened = load_more_documents(&state, None).unwrap();
        assert_eq!(widened.len(), 25);
    }

    #[test]
    fn upload_merges_into_the_visible_head() {
        let state = app("merge");
        upload(&state, "old.png", None);
        list_documents(&state, None).unwrap();
        upload(&state, "new.png", None);
        let visible = visible_documents(&state).unwrap();
        assert_eq!(visible[0].file_name, "new.png");
    }

    #[test]
    fn detailed_search_suppresses_quick_filters() {
        let state = app("search");
        let doc = upload(&state, "report.png", None);
        retag_document(&state, &doc.id, vec!["2025".to_string()]).unwrap();
        upload(&state, "notes.png", None);

        set_quick_filters(&state, Some("report".to_string()), None).unwrap();
        let results = apply_detailed_search(
            &state,
            DetailedSearchPayload {
                folder_id: None,
                from: None,
                to: None,
                tag: Some("2025".to_string()),
                statuses: Vec::new(),
            },
        )
        .unwrap();
        // Only the tagged row comes back from the server; the quick keyword
        // filter must not shrink it further.
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_name, "report.png");

        clear_detailed_search(&state).unwrap();
        let quick = visible_documents(&state).unwrap();
        assert_eq!(quick.len(), 1);
        assert_eq!(quick[0].file_name, "report.png");
    }

    #[test]
    fn save_field_edits_persists_through_the_facade() {
        let state = app("edits");
        let doc = upload(&state, "invoice.png", None);
        let result = OcrResult {
            document_id: doc.id.clone(),
            overall_confidence: 0.9,
            fields: vec![crate::types::OcrField {
                id: "field-1".to_string(),
                label: "Total".to_string(),
                value: "100".to_string(),
                confidence: 0.9,
                bounding_box: crate::types::BoundingBox {
                    x: 0.0,
                    y: 0.0,
                    width: 10.0,
                    height: 10.0,
                },
                is_edited: false,
                kind: None,
            }],
            processed_at: Utc::now(),
            status: DocumentStatus::Completed,
        };
        state
            .service
            .repository()
            .update_document(
                &doc.id,
                &DocumentPatch {
                    ocr_result: Some(Some(result)),
                    status: Some(DocumentStatus::Completed),
                    ..DocumentPatch::default()
                },
            )
            .unwrap();

        let saved = save_field_edits(
            &state,
            SaveFieldEditsPayload {
                document_id: doc.id.clone(),
                edits: vec![FieldEdit {
                    field_id: "field-1".to_string(),
                    value: "120".to_string(),
                }],
            },
        )
        .unwrap();
        assert_eq!(saved.fields[0].value, "120");
        assert!(saved.fields[0].is_edited);

        let stored = state.service.document(&doc.id).unwrap();
        assert_eq!(stored.ocr_result.unwrap().fields[0].value, "120");
    }

    #[test]
    fn selection_survives_a_restart() {
        let dir = temp_dir("restart");
        let _ = std::fs::remove_dir_all(&dir);
        let repo: Arc<InMemoryRepository> = Arc::new(InMemoryRepository::new());
        {
            let service = DocumentService::new(repo.clone(), dir.join("previews"));
            let db = Db::new(dir.join("workspace.db")).unwrap();
            let state = AppState::new(service, db).unwrap();
            select_folder(&state, Some("folder-9".to_string())).unwrap();
            toggle_folder_expanded(&state, "folder-9").unwrap();
        }
        let service = DocumentService::new(repo, dir.join("previews"));
        let db = Db::new(dir.join("workspace.db")).unwrap();
        let state = AppState::new(service, db).unwrap();
        assert_eq!(
            selected_folder(&state).unwrap(),
            Some("folder-9".to_string())
        );
        assert_eq!(expanded_folders(&state).unwrap(), vec!["folder-9"]);
    }
}
