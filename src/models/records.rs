//! Wire shapes of the low-code platform's generated tables and the mapping
//! to application entities. Lookups come back as `_column_value` properties
//! and are written as `Column@odata.bind` paths; the status choice column is
//! an integer; tags travel as one comma-joined string.

use crate::types::{
    DocumentDraft, DocumentPatch, DocumentStatus, FolderDraft, FolderPatch, MenuSection,
    MenuSectionDraft, OcrDocument, OcrFolder, OcrResult,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

pub const FOLDER_ENTITY_SET: &str = "mdw_ocrfolders";
pub const SECTION_ENTITY_SET: &str = "mdw_menusections";
pub const DOCUMENT_ENTITY_SET: &str = "mdw_ocrdocuments";

pub const FOLDER_SELECT: &[&str] = &[
    "mdw_ocrfolderid",
    "mdw_name",
    "mdw_description",
    "mdw_color",
    "_mdw_parentfolder_value",
    "_mdw_menusection_value",
    "mdw_path",
    "mdw_documentcount",
    "mdw_foldercount",
    "createdon",
    "modifiedon",
];

pub const SECTION_SELECT: &[&str] = &[
    "mdw_menusectionid",
    "mdw_name",
    "mdw_displayorder",
    "mdw_isdefault",
    "mdw_color",
];

/// Default document projection; the file column is fetched separately.
pub const DOCUMENT_SELECT: &[&str] = &[
    "mdw_ocrdocumentid",
    "mdw_name",
    "mdw_filetype",
    "mdw_filesize",
    "mdw_fileurl",
    "_mdw_folder_value",
    "mdw_status",
    "mdw_tags",
    "mdw_ocrjson",
    "createdon",
];

/// Lookup bind path: `/entityset(id)`.
pub fn bind_path(entity_set: &str, id: &str) -> String {
    format!("/{}({})", entity_set, id)
}

pub fn join_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FolderRecord {
    #[serde(rename = "mdw_ocrfolderid")]
    pub id: String,
    #[serde(rename = "mdw_name")]
    pub name: String,
    #[serde(rename = "mdw_description", default)]
    pub description: Option<String>,
    #[serde(rename = "mdw_color", default)]
    pub color: Option<String>,
    #[serde(rename = "_mdw_parentfolder_value", default)]
    pub parent_id: Option<String>,
    #[serde(rename = "_mdw_menusection_value", default)]
    pub menu_section: Option<String>,
    #[serde(rename = "mdw_path", default)]
    pub path: Option<String>,
    #[serde(rename = "mdw_documentcount", default)]
    pub document_count: Option<u32>,
    #[serde(rename = "mdw_foldercount", default)]
    pub folder_count: Option<u32>,
    #[serde(rename = "createdon")]
    pub created_on: DateTime<Utc>,
    #[serde(rename = "modifiedon")]
    pub modified_on: DateTime<Utc>,
}

impl FolderRecord {
    pub fn into_folder(self) -> OcrFolder {
        let path = self.path.unwrap_or_else(|| self.name.clone());
        OcrFolder {
            id: self.id,
            name: self.name,
            description: self.description,
            color: self.color,
            parent_id: self.parent_id,
            menu_section: self.menu_section,
            path,
            document_count: self.document_count.unwrap_or(0),
            folder_count: self.folder_count.unwrap_or(0),
            created_on: self.created_on,
            modified_on: self.modified_on,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MenuSectionRecord {
    #[serde(rename = "mdw_menusectionid")]
    pub id: String,
    #[serde(rename = "mdw_name")]
    pub name: String,
    #[serde(rename = "mdw_displayorder", default)]
    pub display_order: Option<i32>,
    #[serde(rename = "mdw_isdefault", default)]
    pub is_default: Option<bool>,
    #[serde(rename = "mdw_color", default)]
    pub color: Option<String>,
}

impl MenuSectionRecord {
    pub fn into_section(self) -> MenuSection {
        MenuSection {
            id: self.id,
            name: self.name,
            display_order: self.display_order.unwrap_or(0),
            is_default: self.is_default.unwrap_or(false),
            color: self.color,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentRecord {
    #[serde(rename = "mdw_ocrdocumentid")]
    pub id: String,
    #[serde(rename = "mdw_name")]
    pub file_name: String,
    #[serde(rename = "mdw_filetype", default)]
    pub file_type: Option<String>,
    #[serde(rename = "mdw_filesize", default)]
    pub file_size: Option<u64>,
    #[serde(rename = "mdw_fileurl", default)]
    pub file_url: Option<String>,
    #[serde(rename = "_mdw_folder_value", default)]
    pub folder_id: Option<String>,
    #[serde(rename = "mdw_status", default)]
    pub status: Option<i64>,
    #[serde(rename = "mdw_tags", default)]
    pub tags: Option<String>,
    #[serde(rename = "mdw_ocrjson", default)]
    pub ocr_json: Option<String>,
    #[serde(rename = "createdon")]
    pub created_on: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn into_document(self) -> OcrDocument {
        let status = self
            .status
            .and_then(DocumentStatus::from_code)
            .unwrap_or(DocumentStatus::Uploaded);
        let ocr_result: Option<OcrResult> = self.ocr_json.as_deref().and_then(|raw| {
            serde_json::from_str(raw)
                .map_err(|e| log::warn!("dropping unreadable OCR payload: {}", e))
                .ok()
        });
        OcrDocument {
            id: self.id,
            file_name: self.file_name,
            file_type: self.file_type.unwrap_or_default(),
            file_size: self.file_size.unwrap_or(0),
            file_url: self.file_url,
            folder_id: self.folder_id,
            status,
            tags: self.tags.as_deref().map(split_tags).unwrap_or_default(),
            uploaded_date: self.created_on,
            ocr_result,
        }
    }
}

pub fn folder_create_payload(draft: &FolderDraft) -> Value {
    let mut record = Map::new();
    record.insert("mdw_name".into(), json!(draft.name));
    record.insert("mdw_path".into(), json!(draft.path));
    if let Some(description) = &draft.description {
        record.insert("mdw_description".into(), json!(description));
    }
    if let Some(color) = &draft.color {
        record.insert("mdw_color".into(), json!(color));
    }
    if let Some(parent_id) = &draft.parent_id {
        record.insert(
            "mdw_ParentFolder@odata.bind".into(),
            json!(bind_path(FOLDER_ENTITY_SET, parent_id)),
        );
    }
    if let Some(section_id) = &draft.menu_section {
        record.insert(
            "mdw_MenuSection@odata.bind".into(),
            json!(bind_path(SECTION_ENTITY_SET, section_id)),
        );
    }
    Value::Object(record)
}

pub fn folder_update_payload(patch: &FolderPatch) -> Value {
    let mut record = Map::new();
    if let Some(name) = &patch.name {
        record.insert("mdw_name".into(), json!(name));
    }
    if let Some(description) = &patch.description {
        record.insert("mdw_description".into(), json!(description));
    }
    if let Some(color) = &patch.color {
        record.insert("mdw_color".into(), json!(color));
    }
    if let Some(path) = &patch.path {
        record.insert("mdw_path".into(), json!(path));
    }
    if let Some(parent) = &patch.parent_id {
        let bound = match parent {
            Some(id) => json!(bind_path(FOLDER_ENTITY_SET, id)),
            None => Value::Null,
        };
        record.insert("mdw_ParentFolder@odata.bind".into(), bound);
    }
    if let Some(section) = &patch.menu_section {
        let bound = match section {
            Some(id) => json!(bind_path(SECTION_ENTITY_SET, id)),
            None => Value::Null,
        };
        record.insert("mdw_MenuSection@odata.bind".into(), bound);
    }
    Value::Object(record)
}

pub fn section_create_payload(draft: &MenuSectionDraft) -> Value {
    let mut record = Map::new();
    record.insert("mdw_name".into(), json!(draft.name));
    record.insert("mdw_displayorder".into(), json!(draft.display_order));
    record.insert("mdw_isdefault".into(), json!(draft.is_default));
    if let Some(color) = &draft.color {
        record.insert("mdw_color".into(), json!(color));
    }
    Value::Object(record)
}

pub fn document_create_payload(draft: &DocumentDraft) -> Value {
    let mut record = Map::new();
    record.insert("mdw_name".into(), json!(draft.file_name));
    record.insert("mdw_filetype".into(), json!(draft.file_type));
    record.insert("mdw_filesize".into(), json!(draft.file_size));
    record.insert("mdw_status".into(), json!(draft.status.code()));
    if !draft.tags.is_empty() {
        record.insert("mdw_tags".into(), json!(join_tags(&draft.tags)));
    }
    if let Some(content) = &draft.content_base64 {
        record.insert("mdw_filecontent".into(), json!(content));
    }
    if let Some(url) = &draft.file_url {
        record.insert("mdw_fileurl".into(), json!(url));
    }
    if let Some(folder_id) = &draft.folder_id {
        record.insert(
            "mdw_Folder@odata.bind".into(),
            json!(bind_path(FOLDER_ENTITY_SET, folder_id)),
        );
    }
    Value::Object(record)
}

pub fn document_update_payload(patch: &DocumentPatch) -> Value {
    let mut record = Map::new();
    if let Some(file_name) = &patch.file_name {
        record.insert("mdw_name".into(), json!(file_name));
    }
    if let Some(status) = patch.status {
        record.insert("mdw_status".into(), json!(status.code()));
    }
    if let Some(tags) = &patch.tags {
        record.insert("mdw_tags".into(), json!(join_tags(tags)));
    }
    if let Some(url) = &patch.file_url {
        record.insert("mdw_fileurl".into(), json!(url));
    }
    if let Some(folder) = &patch.folder_id {
        let bound = match folder {
            Some(id) => json!(bind_path(FOLDER_ENTITY_SET, id)),
            None => Value::Null,
        };
        record.insert("mdw_Folder@odata.bind".into(), bound);
    }
    if let Some(result) = &patch.ocr_result {
        let serialized = match result {
            Some(result) => json!(serde_json::to_string(result).unwrap_or_default()),
            None => Value::Null,
        };
        record.insert("mdw_ocrjson".into(), serialized);
    }
    Value::Object(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_join_and_split() {
        let tags = vec!["invoice".to_string(), " urgent ".to_string(), "".to_string()];
        let joined = join_tags(&tags);
        assert_eq!(joined, "invoice,urgent");
        assert_eq!(split_tags(&joined), vec!["invoice", "urgent"]);
        assert!(split_tags("").is_empty());
    }

    #[test]
    fn folder_record_maps_lookups_and_defaults() {
        let raw = json!({
            "mdw_ocrfolderid": "f-1",
            "mdw_name": "Invoices",
            "_mdw_parentfolder_value": "f-0",
            "_mdw_menusection_value": "s-1",
            "createdon": "2025-06-01T10:00:00Z",
            "modifiedon": "2025-06-02T10:00:00Z"
        });
        let record: FolderRecord = serde_json::from_value(raw).unwrap();
        let folder = record.into_folder();
        assert_eq!(folder.parent_id.as_deref(), Some("f-0"));
        assert_eq!(folder.menu_section.as_deref(), Some("s-1"));
        // Missing path falls back to the name, missing counters to zero.
        assert_eq!(folder.path, "Invoices");
        assert_eq!(folder.document_count, 0);
    }

    #[test]
    fn document_record_translates_status_and_tags() {
        let raw = json!({
            "mdw_ocrdocumentid": "d-1",
            "mdw_name": "scan.pdf",
            "mdw_filetype": "application/pdf",
            "mdw_filesize": 2048,
            "_mdw_folder_value": "f-1",
            "mdw_status": 4,
            "mdw_tags": "a, b",
            "createdon": "2025-06-01T10:00:00Z"
        });
        let record: DocumentRecord = serde_json::from_value(raw).unwrap();
        let doc = record.into_document();
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert_eq!(doc.tags, vec!["a", "b"]);
        assert_eq!(doc.folder_id.as_deref(), Some("f-1"));
    }

    #[test]
    fn create_payload_uses_bind_syntax_for_lookups() {
        let draft = FolderDraft {
            name: "2025".to_string(),
            description: None,
            color: Some("#ff8800".to_string()),
            parent_id: Some("f-1".to_string()),
            menu_section: Some("s-1".to_string()),
            path: "Invoices/2025".to_string(),
        };
        let payload = folder_create_payload(&draft);
        assert_eq!(
            payload["mdw_ParentFolder@odata.bind"],
            json!("/mdw_ocrfolders(f-1)")
        );
        assert_eq!(
            payload["mdw_MenuSection@odata.bind"],
            json!("/mdw_menusections(s-1)")
        );
        assert_eq!(payload["mdw_path"], json!("Invoices/2025"));
        assert!(payload.get("mdw_description").is_none());
    }

    #[test]
    fn update_payload_clears_lookup_with_null() {
        let patch = FolderPatch {
            parent_id: Some(None),
            ..FolderPatch::default()
        };
        let payload = folder_update_payload(&patch);
        assert_eq!(payload["mdw_ParentFolder@odata.bind"], Value::Null);
        assert_eq!(payload.as_object().unwrap().len(), 1);
    }
}
