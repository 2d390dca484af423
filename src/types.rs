use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel menu section that collects folders and documents without an
/// explicit section assignment.
pub const ALL_DOCS_SECTION: &str = "all-docs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Pending,
    Processing,
    Completed,
    Error,
}

impl DocumentStatus {
    /// Integer code the platform stores in the status choice column.
    pub fn code(self) -> i64 {
        match self {
            DocumentStatus::Uploaded => 1,
            DocumentStatus::Pending => 2,
            DocumentStatus::Processing => 3,
            DocumentStatus::Completed => 4,
            DocumentStatus::Error => 5,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(DocumentStatus::Uploaded),
            2 => Some(DocumentStatus::Pending),
            3 => Some(DocumentStatus::Processing),
            4 => Some(DocumentStatus::Completed),
            5 => Some(DocumentStatus::Error),
            _ => None,
        }
    }

    /// Fixed display ordering: completed < processing < pending < uploaded,
    /// with error rows last.
    pub fn sort_priority(self) -> u8 {
        match self {
            DocumentStatus::Completed => 0,
            DocumentStatus::Processing => 1,
            DocumentStatus::Pending => 2,
            DocumentStatus::Uploaded => 3,
            DocumentStatus::Error => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "uploaded" => Some(DocumentStatus::Uploaded),
            "pending" => Some(DocumentStatus::Pending),
            "processing" => Some(DocumentStatus::Processing),
            "completed" => Some(DocumentStatus::Completed),
            "error" => Some(DocumentStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrFolder {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub parent_id: Option<String>,
    /// Menu section id; None falls into the [`ALL_DOCS_SECTION`] bucket.
    pub menu_section: Option<String>,
    /// Materialized location, `parent-name/name` (roots: the bare name).
    pub path: String,
    pub document_count: u32,
    pub folder_count: u32,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuSection {
    pub id: String,
    pub name: String,
    pub display_order: i32,
    /// At most one section should be the default; kept by convention, the
    /// platform does not validate it.
    pub is_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrDocument {
    pub id: String,
    pub file_name: String,
    /// MIME type of the uploaded file.
    pub file_type: String,
    pub file_size: u64,
    /// Data URL or remote URL; local previews are handled separately as
    /// scoped handles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub folder_id: Option<String>,
    pub status: DocumentStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub uploaded_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_result: Option<OcrResult>,
}

/// Rectangle in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Scale natural-pixel coordinates to overlay coordinates for an image
    /// rendered at `displayed` size.
    pub fn scaled(&self, natural: (f64, f64), displayed: (f64, f64)) -> BoundingBox {
        let (natural_w, natural_h) = natural;
        let (displayed_w, displayed_h) = displayed;
        if natural_w <= 0.0 || natural_h <= 0.0 {
            return *self;
        }
        let sx = displayed_w / natural_w;
        let sy = displayed_h / natural_h;
        BoundingBox {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Date,
    Email,
    Phone,
    Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrField {
    pub id: String,
    pub label: String,
    pub value: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FieldKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    pub document_id: String,
    pub overall_confidence: f64,
    pub fields: Vec<OcrField>,
    pub processed_at: DateTime<Utc>,
    pub status: DocumentStatus,
}

/// Fields for a new folder. The caller supplies the materialized path so
/// the invariant `path == parent.path + "/" + name` holds from creation.
#[derive(Debug, Clone)]
pub struct FolderDraft {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub parent_id: Option<String>,
    pub menu_section: Option<String>,
    pub path: String,
}

/// Partial folder update; `None` leaves a field untouched. Lookup fields use
/// a nested Option so `Some(None)` clears the relationship.
#[derive(Debug, Clone, Default)]
pub struct FolderPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub parent_id: Option<Option<String>>,
    pub menu_section: Option<Option<String>>,
    pub path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MenuSectionDraft {
    pub name: String,
    pub display_order: i32,
    pub is_default: bool,
    pub color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentDraft {
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub folder_id: Option<String>,
    pub tags: Vec<String>,
    /// Base64 file content uploaded into the platform's file column.
    pub content_base64: Option<String>,
    pub file_url: Option<String>,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub file_name: Option<String>,
    pub folder_id: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<DocumentStatus>,
    pub file_url: Option<String>,
    pub ocr_result: Option<Option<OcrResult>>,
}
