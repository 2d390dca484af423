//! Blocking client for the low-code platform's record API, plus the
//! repository implementation built on it. Query options follow the OData
//! subset the platform exposes: `$filter`, `$orderby`, `$select`, `$top`.

use crate::error::WorkspaceError;
use crate::models::records::{
    self, DocumentRecord, FolderRecord, MenuSectionRecord, DOCUMENT_ENTITY_SET, DOCUMENT_SELECT,
    FOLDER_ENTITY_SET, FOLDER_SELECT, SECTION_ENTITY_SET, SECTION_SELECT,
};
use crate::repository::{DocumentQuery, FolderScope, WorkspaceRepository};
use crate::types::{
    DocumentDraft, DocumentPatch, FolderDraft, FolderPatch, MenuSection, MenuSectionDraft,
    OcrDocument, OcrFolder,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const API_PATH: &str = "api/data/v9.2";

fn load_env() {
    let _ = dotenvy::dotenv();
}

#[derive(Debug, Default, Clone)]
pub struct QueryOptions {
    pub filter: Option<String>,
    pub order_by: Option<String>,
    pub select: Option<Vec<&'static str>>,
    pub top: Option<usize>,
}

impl QueryOptions {
    pub fn query_string(&self) -> String {
        let mut parts = Vec::new();
        if let Some(select) = &self.select {
            parts.push(format!("$select={}", select.join(",")));
        }
        if let Some(filter) = &self.filter {
            parts.push(format!("$filter={}", filter));
        }
        if let Some(order_by) = &self.order_by {
            parts.push(format!("$orderby={}", order_by));
        }
        if let Some(top) = self.top {
            parts.push(format!("$top={}", top));
        }
        parts.join("&")
    }
}

#[derive(serde::Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

pub struct DataverseClient {
    base_url: String,
    token: String,
    client: reqwest::blocking::Client,
}

impl DataverseClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, WorkspaceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| WorkspaceError::Platform {
                status: 0,
                message: e.to_string(),
            })?;
        Ok(DataverseClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    pub fn from_env() -> Result<Self, WorkspaceError> {
        load_env();
        let base_url =
            std::env::var("DATAVERSE_URL").map_err(|_| WorkspaceError::MissingConfig("DATAVERSE_URL"))?;
        let token =
            std::env::var("DATAVERSE_TOKEN").map_err(|_| WorkspaceError::MissingConfig("DATAVERSE_TOKEN"))?;
        DataverseClient::new(base_url, token)
    }

    fn collection_url(&self, entity_set: &str, query: &QueryOptions) -> String {
        let qs = query.query_string();
        if qs.is_empty() {
            format!("{}/{}/{}", self.base_url, API_PATH, entity_set)
        } else {
            format!("{}/{}/{}?{}", self.base_url, API_PATH, entity_set, qs)
        }
    }

    fn record_url(&self, entity_set: &str, id: &str) -> String {
        format!("{}/{}/{}({})", self.base_url, API_PATH, entity_set, id)
    }

    fn check(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, WorkspaceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(String::from)
            })
            .unwrap_or(body);
        Err(WorkspaceError::Platform {
            status: status.as_u16(),
            message: if message.is_empty() {
                "Invalid token or endpoint?".to_string()
            } else {
                message
            },
        })
    }

    pub fn retrieve_multiple<T: DeserializeOwned>(
        &self,
        entity_set: &str,
        query: &QueryOptions,
    ) -> Result<Vec<T>, WorkspaceError> {
        let response = self
            .client
            .get(self.collection_url(entity_set, query))
            .bearer_auth(&self.token)
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
            .send()
            .map_err(|e| WorkspaceError::from_transport(&e))?;
        let response = Self::check(response)?;
        let list: ListResponse<T> = response.json().map_err(|e| WorkspaceError::Platform {
            status: 0,
            message: format!("Invalid JSON: {}", e),
        })?;
        Ok(list.value)
    }

    pub fn retrieve<T: DeserializeOwned>(
        &self,
        entity_set: &str,
        id: &str,
        select: &[&str],
    ) -> Result<T, WorkspaceError> {
        let url = format!("{}?$select={}", self.record_url(entity_set, id), select.join(","));
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| WorkspaceError::from_transport(&e))?;
        let response = Self::check(response)?;
        response.json().map_err(|e| WorkspaceError::Platform {
            status: 0,
            message: format!("Invalid JSON: {}", e),
        })
    }

    /// Create a record; the server-assigned id is parsed out of the
    /// `OData-EntityId` header (`.../entityset(id)`).
    pub fn create(&self, entity_set: &str, payload: &Value) -> Result<String, WorkspaceError> {
        let response = self
            .client
            .post(self.collection_url(entity_set, &QueryOptions::default()))
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .map_err(|e| WorkspaceError::from_transport(&e))?;
        let response = Self::check(response)?;
        let entity_id = response
            .headers()
            .get("OData-EntityId")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| WorkspaceError::Platform {
                status: 0,
                message: "No OData-EntityId in response".to_string(),
            })?;
        let id = entity_id
            .rsplit_once('(')
            .and_then(|(_, tail)| tail.strip_suffix(')'))
            .ok_or_else(|| WorkspaceError::Platform {
                status: 0,
                message: format!("Unexpected OData-EntityId: {}", entity_id),
            })?;
        Ok(id.to_string())
    }

    pub fn update(&self, entity_set: &str, id: &str, payload: &Value) -> Result<(), WorkspaceError> {
        let response = self
            .client
            .patch(self.record_url(entity_set, id))
            .bearer_auth(&self.token)
            .header("If-Match", "*")
            .json(payload)
            .send()
            .map_err(|e| WorkspaceError::from_transport(&e))?;
        Self::check(response).map(|_| ())
    }

    pub fn delete(&self, entity_set: &str, id: &str) -> Result<(), WorkspaceError> {
        let response = self
            .client
            .delete(self.record_url(entity_set, id))
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| WorkspaceError::from_transport(&e))?;
        Self::check(response).map(|_| ())
    }
}

/// `$filter` expression for a document query (the server-side half of
/// search; keyword/status quick filters stay client-side).
fn document_filter(query: &DocumentQuery) -> Option<String> {
    let mut clauses = Vec::new();
    match &query.folder {
        FolderScope::All => {}
        FolderScope::Unfiled => clauses.push("_mdw_folder_value eq null".to_string()),
        FolderScope::In(id) => clauses.push(format!("_mdw_folder_value eq {}", id)),
    }
    if let Some(from) = query.from {
        clauses.push(format!("createdon ge {}", from.to_rfc3339()));
    }
    if let Some(to) = query.to {
        clauses.push(format!("createdon le {}", to.to_rfc3339()));
    }
    if let Some(tag) = &query.tag {
        clauses.push(format!("contains(mdw_tags,'{}')", tag.replace('\'', "''")));
    }
    if !query.statuses.is_empty() {
        let alternatives: Vec<String> = query
            .statuses
            .iter()
            .map(|s| format!("mdw_status eq {}", s.code()))
            .collect();
        clauses.push(format!("({})", alternatives.join(" or ")));
    }
    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" and "))
    }
}

pub struct DataverseRepository {
    client: DataverseClient,
}

impl DataverseRepository {
    pub fn new(client: DataverseClient) -> Self {
        DataverseRepository { client }
    }
}

impl WorkspaceRepository for DataverseRepository {
    fn list_menu_sections(&self) -> Result<Vec<MenuSection>, WorkspaceError> {
        let query = QueryOptions {
            select: Some(SECTION_SELECT.to_vec()),
            order_by: Some("mdw_displayorder asc".to_string()),
            ..QueryOptions::default()
        };
        let records: Vec<MenuSectionRecord> =
            self.client.retrieve_multiple(SECTION_ENTITY_SET, &query)?;
        Ok(records.into_iter().map(MenuSectionRecord::into_section).collect())
    }

    fn create_menu_section(&self, draft: &MenuSectionDraft) -> Result<MenuSection, WorkspaceError> {
        let id = self
            .client
            .create(SECTION_ENTITY_SET, &records::section_create_payload(draft))?;
        Ok(MenuSection {
            id,
            name: draft.name.clone(),
            display_order: draft.display_order,
            is_default: draft.is_default,
            color: draft.color.clone(),
        })
    }

    fn list_folders(&self) -> Result<Vec<OcrFolder>, WorkspaceError> {
        let query = QueryOptions {
            select: Some(FOLDER_SELECT.to_vec()),
            order_by: Some("mdw_name asc".to_string()),
            ..QueryOptions::default()
        };
        let records: Vec<FolderRecord> = self.client.retrieve_multiple(FOLDER_ENTITY_SET, &query)?;
        Ok(records.into_iter().map(FolderRecord::into_folder).collect())
    }

    fn create_folder(&self, draft: &FolderDraft) -> Result<OcrFolder, WorkspaceError> {
        let id = self
            .client
            .create(FOLDER_ENTITY_SET, &records::folder_create_payload(draft))?;
        let record: FolderRecord = self.client.retrieve(FOLDER_ENTITY_SET, &id, FOLDER_SELECT)?;
        Ok(record.into_folder())
    }

    fn update_folder(&self, id: &str, patch: &FolderPatch) -> Result<(), WorkspaceError> {
        self.client
            .update(FOLDER_ENTITY_SET, id, &records::folder_update_payload(patch))
    }

    fn delete_folder(&self, id: &str) -> Result<(), WorkspaceError> {
        self.client.delete(FOLDER_ENTITY_SET, id)
    }

    fn list_documents(&self, query: &DocumentQuery) -> Result<Vec<OcrDocument>, WorkspaceError> {
        let options = QueryOptions {
            select: Some(DOCUMENT_SELECT.to_vec()),
            filter: document_filter(query),
            order_by: Some("createdon desc".to_string()),
            top: query.top,
        };
        let records: Vec<DocumentRecord> =
            self.client.retrieve_multiple(DOCUMENT_ENTITY_SET, &options)?;
        Ok(records.into_iter().map(DocumentRecord::into_document).collect())
    }

    fn get_document(&self, id: &str) -> Result<Option<OcrDocument>, WorkspaceError> {
        match self
            .client
            .retrieve::<DocumentRecord>(DOCUMENT_ENTITY_SET, id, DOCUMENT_SELECT)
        {
            Ok(record) => Ok(Some(record.into_document())),
            Err(WorkspaceError::Platform { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn create_document(&self, draft: &DocumentDraft) -> Result<OcrDocument, WorkspaceError> {
        let id = self
            .client
            .create(DOCUMENT_ENTITY_SET, &records::document_create_payload(draft))?;
        let record: DocumentRecord =
            self.client.retrieve(DOCUMENT_ENTITY_SET, &id, DOCUMENT_SELECT)?;
        Ok(record.into_document())
    }

    fn update_document(&self, id: &str, patch: &DocumentPatch) -> Result<(), WorkspaceError> {
        self.client
            .update(DOCUMENT_ENTITY_SET, id, &records::document_update_payload(patch))
    }

    fn delete_document(&self, id: &str) -> Result<(), WorkspaceError> {
        self.client.delete(DOCUMENT_ENTITY_SET, id)
    }

    fn get_document_content(&self, id: &str) -> Result<Option<String>, WorkspaceError> {
        #[derive(serde::Deserialize)]
        struct ContentRecord {
            #[serde(rename = "mdw_filecontent", default)]
            content: Option<String>,
        }
        let record: ContentRecord =
            self.client
                .retrieve(DOCUMENT_ENTITY_SET, id, &["mdw_filecontent"])?;
        Ok(record.content)
    }
}
