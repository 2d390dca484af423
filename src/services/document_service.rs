//! Application façade over the record repository. Reads degrade to empty
//! collections so list screens render "no data" instead of crashing; writes
//! surface translated errors for toast display. File content moves through
//! Base64 and is materialized as scoped preview handles.

use crate::error::WorkspaceError;
use crate::repository::{DocumentQuery, WorkspaceRepository};
use crate::types::{
    DocumentDraft, DocumentPatch, DocumentStatus, FolderDraft, FolderPatch, MenuSection,
    MenuSectionDraft, OcrDocument, OcrFolder,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Default accepted upload types.
pub const ACCEPTED_FILE_TYPES: &[&str] = &["image/jpeg", "image/png", "application/pdf"];
/// Upload size cap.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const BLOB_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub file_type: String,
    pub bytes: Vec<u8>,
    pub folder_id: Option<String>,
    pub tags: Vec<String>,
}

/// Local preview of a document's file content. The backing file is removed
/// when the handle drops, on every exit path; hold the handle for as long as
/// the preview is on screen.
#[derive(Debug)]
pub struct Preview {
    path: PathBuf,
    mime: String,
}

impl Preview {
    fn materialize(dir: &Path, bytes: &[u8], mime: &str) -> Result<Self, WorkspaceError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| WorkspaceError::Storage(format!("Could not create preview dir: {}", e)))?;
        let path = dir.join(format!("{}.{}", uuid::Uuid::new_v4(), mime_extension(mime)));
        std::fs::write(&path, bytes)
            .map_err(|e| WorkspaceError::Storage(format!("Could not write preview: {}", e)))?;
        Ok(Preview {
            path,
            mime: mime.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Release the backing file now instead of at drop time.
    pub fn revoke(self) {
        drop(self);
    }
}

impl Drop for Preview {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to remove preview {}: {}", self.path.display(), e);
            }
        }
    }
}

fn mime_extension(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

fn data_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^data:(?P<mime>[^;,]+)?(?P<b64>;base64)?,(?P<data>.*)$").expect("valid regex")
    })
}

/// Split a `data:` URL into its MIME type and Base64 payload.
pub fn parse_data_url(url: &str) -> Option<(String, String)> {
    let caps = data_url_regex().captures(url)?;
    caps.name("b64")?;
    let mime = caps
        .name("mime")
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Some((mime, caps.name("data").map(|d| d.as_str().to_string())?))
}

/// Decode a Base64 file column and assemble the blob 8 KiB at a time.
pub fn decode_file_content(content_base64: &str) -> Result<Vec<u8>, WorkspaceError> {
    let decoded = BASE64
        .decode(content_base64.trim())
        .map_err(|e| WorkspaceError::validation(format!("Invalid base64: {}", e)))?;
    let mut blob = Vec::with_capacity(decoded.len());
    for chunk in decoded.chunks(BLOB_CHUNK) {
        blob.extend_from_slice(chunk);
    }
    Ok(blob)
}

/// Reject an upload before any network call: unsupported MIME type or an
/// oversized payload never reaches the platform.
pub fn validate_upload(upload: &DocumentUpload) -> Result<(), WorkspaceError> {
    if upload.file_name.trim().is_empty() {
        return Err(WorkspaceError::validation("File name is required."));
    }
    if !ACCEPTED_FILE_TYPES.contains(&upload.file_type.as_str()) {
        return Err(WorkspaceError::validation(format!(
            "Unsupported file type: {}. Accepted: {}.",
            upload.file_type,
            ACCEPTED_FILE_TYPES.join(", ")
        )));
    }
    if upload.bytes.len() as u64 > MAX_UPLOAD_BYTES {
        return Err(WorkspaceError::validation(format!(
            "File too large (max {}MB).",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct DocumentService {
    repo: Arc<dyn WorkspaceRepository>,
    previews_dir: PathBuf,
}

impl DocumentService {
    pub fn new(repo: Arc<dyn WorkspaceRepository>, previews_dir: PathBuf) -> Self {
        DocumentService { repo, previews_dir }
    }

    pub fn repository(&self) -> &Arc<dyn WorkspaceRepository> {
        &self.repo
    }

    // Reads: log and degrade to empty.

    pub fn folders(&self) -> Vec<OcrFolder> {
        match self.repo.list_folders() {
            Ok(folders) => folders,
            Err(e) => {
                log::warn!("list_folders failed: {}", e);
                Vec::new()
            }
        }
    }

    pub fn menu_sections(&self) -> Vec<MenuSection> {
        match self.repo.list_menu_sections() {
            Ok(sections) => sections,
            Err(e) => {
                log::warn!("list_menu_sections failed: {}", e);
                Vec::new()
            }
        }
    }

    pub fn documents(&self, query: &DocumentQuery) -> Vec<OcrDocument> {
        match self.repo.list_documents(query) {
            Ok(documents) => documents,
            Err(e) => {
                log::warn!("list_documents failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Newest documents for the head-refresh merge.
    pub fn recent_documents(&self, top: usize) -> Vec<OcrDocument> {
        self.documents(&DocumentQuery::default().with_top(top))
    }

    pub fn document(&self, id: &str) -> Option<OcrDocument> {
        match self.repo.get_document(id) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("get_document {} failed: {}", id, e);
                None
            }
        }
    }

    // Writes: propagate translated errors.

    pub fn create_menu_section(&self, draft: &MenuSectionDraft) -> Result<MenuSection, WorkspaceError> {
        self.repo.create_menu_section(draft)
    }

    pub fn create_folder(&self, draft: &FolderDraft) -> Result<OcrFolder, WorkspaceError> {
        self.repo.create_folder(draft)
    }

    pub fn update_folder(&self, id: &str, patch: &FolderPatch) -> Result<(), WorkspaceError> {
        self.repo.update_folder(id, patch)
    }

    pub fn delete_folder(&self, id: &str) -> Result<(), WorkspaceError> {
        self.repo.delete_folder(id)
    }

    pub fn upload_document(&self, upload: DocumentUpload) -> Result<OcrDocument, WorkspaceError> {
        validate_upload(&upload)?;
        let draft = DocumentDraft {
            file_name: upload.file_name,
            file_type: upload.file_type,
            file_size: upload.bytes.len() as u64,
            folder_id: upload.folder_id,
            tags: upload.tags,
            content_base64: Some(BASE64.encode(&upload.bytes)),
            file_url: None,
            status: DocumentStatus::Uploaded,
        };
        self.repo.create_document(&draft)
    }

    pub fn update_document(&self, id: &str, patch: &DocumentPatch) -> Result<(), WorkspaceError> {
        self.repo.update_document(id, patch)
    }

    pub fn delete_document(&self, id: &str) -> Result<(), WorkspaceError> {
        self.repo.delete_document(id)
    }

    /// Materialize a document's file content as a scoped preview handle.
    /// Falls back to the stored data URL when the platform has no file
    /// column value for the record.
    pub fn document_preview(&self, id: &str) -> Result<Option<Preview>, WorkspaceError> {
        let document = self
            .repo
            .get_document(id)?
            .ok_or_else(|| WorkspaceError::NotFound("Document".to_string()))?;
        let (mime, content) = match self.repo.get_document_content(id)? {
            Some(content) => (document.file_type.clone(), content),
            None => match document.file_url.as_deref().and_then(parse_data_url) {
                Some(parsed) => parsed,
                None => return Ok(None),
            },
        };
        let bytes = decode_file_content(&content)?;
        Preview::materialize(&self.previews_dir, &bytes, &mime).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use crate::types::{FolderDraft, OcrDocument};

    struct FailingRepository;

    impl WorkspaceRepository for FailingRepository {
        fn list_menu_sections(&self) -> Result<Vec<MenuSection>, WorkspaceError> {
            Err(WorkspaceError::Connection)
        }
        fn create_menu_section(&self, _: &MenuSectionDraft) -> Result<MenuSection, WorkspaceError> {
            Err(WorkspaceError::Connection)
        }
        fn list_folders(&self) -> Result<Vec<OcrFolder>, WorkspaceError> {
            Err(WorkspaceError::Connection)
        }
        fn create_folder(&self, _: &FolderDraft) -> Result<OcrFolder, WorkspaceError> {
            Err(WorkspaceError::Connection)
        }
        fn update_folder(&self, _: &str, _: &FolderPatch) -> Result<(), WorkspaceError> {
            Err(WorkspaceError::Connection)
        }
        fn delete_folder(&self, _: &str) -> Result<(), WorkspaceError> {
            Err(WorkspaceError::Connection)
        }
        fn list_documents(&self, _: &DocumentQuery) -> Result<Vec<OcrDocument>, WorkspaceError> {
            Err(WorkspaceError::Connection)
        }
        fn get_document(&self, _: &str) -> Result<Option<OcrDocument>, WorkspaceError> {
            Err(WorkspaceError::Connection)
        }
        fn create_document(&self, _: &DocumentDraft) -> Result<OcrDocument, WorkspaceError> {
            Err(WorkspaceError::Connection)
        }
        fn update_document(&self, _: &str, _: &DocumentPatch) -> Result<(), WorkspaceError> {
            Err(WorkspaceError::Connection)
        }
        fn delete_document(&self, _: &str) -> Result<(), WorkspaceError> {
            Err(WorkspaceError::Connection)
        }
        fn get_document_content(&self, _: &str) -> Result<Option<String>, WorkspaceError> {
            Err(WorkspaceError::Connection)
        }
    }

    fn service(repo: Arc<dyn WorkspaceRepository>) -> DocumentService {
        DocumentService::new(repo, std::env::temp_dir().join("ocr-workspace-previews-test"))
    }

    fn upload(file_type: &str) -> DocumentUpload {
        DocumentUpload {
            file_name: "scan.bin".to_string(),
            file_type: file_type.to_string(),
            bytes: vec![1, 2, 3, 4],
            folder_id: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn reads_swallow_failures_into_empty_collections() {
        let service = service(Arc::new(FailingRepository));
        assert!(service.folders().is_empty());
        assert!(service.menu_sections().is_empty());
        assert!(service.documents(&DocumentQuery::default()).is_empty());
        assert!(service.document("d-1").is_none());
    }

    #[test]
    fn writes_surface_failures() {
        let service = service(Arc::new(FailingRepository));
        let draft = FolderDraft {
            name: "X".to_string(),
            description: None,
            color: None,
            parent_id: None,
            menu_section: None,
            path: "X".to_string(),
        };
        assert!(service.create_folder(&draft).is_err());
        assert!(service.delete_document("d-1").is_err());
    }

    #[test]
    fn zip_upload_is_rejected_before_any_record_is_created() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = service(repo.clone());
        let err = service.upload_document(upload("application/zip")).unwrap_err();
        assert!(err.to_string().contains("Unsupported file type"));
        assert!(repo.list_documents(&DocumentQuery::default()).unwrap().is_empty());
    }

    #[test]
    fn oversized_upload_is_rejected() {
        let mut big = upload("image/png");
        big.bytes = vec![0; (MAX_UPLOAD_BYTES + 1) as usize];
        assert!(validate_upload(&big).is_err());
    }

    #[test]
    fn accepted_upload_round_trips_content() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = service(repo.clone());
        let doc = service.upload_document(upload("image/png")).unwrap();
        assert_eq!(doc.status, DocumentStatus::Uploaded);
        let stored = repo.get_document_content(&doc.id).unwrap().unwrap();
        assert_eq!(decode_file_content(&stored).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn preview_backing_file_is_removed_on_drop() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = service(repo);
        let doc = service.upload_document(upload("image/png")).unwrap();
        let preview = service.document_preview(&doc.id).unwrap().unwrap();
        let path = preview.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(preview.mime(), "image/png");
        drop(preview);
        assert!(!path.exists());
    }

    #[test]
    fn data_url_parsing() {
        let (mime, data) = parse_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(data, "aGVsbG8=");
        assert!(parse_data_url("https://example.com/x.png").is_none());
        assert!(parse_data_url("data:text/plain,plain-text").is_none());
    }

    #[test]
    fn chunked_decode_matches_input() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(20_000).collect();
        let encoded = BASE64.encode(&bytes);
        assert_eq!(decode_file_content(&encoded).unwrap(), bytes);
        assert!(decode_file_content("not-base64!!!").is_err());
    }
}
