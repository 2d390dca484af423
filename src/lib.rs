pub mod backend;
pub mod cache;
pub mod commands;
pub mod dataverse;
pub mod db;
pub mod document_list;
pub mod error;
pub mod folder_tree;
pub mod models;
pub mod ocr;
pub mod repository;
pub mod services;
pub mod types;

use commands::AppState;
use dataverse::{DataverseClient, DataverseRepository};
use repository::{InMemoryRepository, WorkspaceRepository};
use services::document_service::DocumentService;
use std::path::PathBuf;
use std::sync::Arc;

/// Per-user data directory (`.env`, workspace database, preview files).
pub fn app_data_dir() -> Result<PathBuf, String> {
    dirs::data_dir()
        .map(|dir| dir.join("ocr-workspace"))
        .ok_or_else(|| "Could not resolve a data directory".to_string())
}

/// Assemble the workspace: honor a `.env` placed in the data dir, open the
/// persisted state database, and connect to the record platform — or fall
/// back to the in-memory store when the platform is not configured, so the
/// app still opens offline.
pub fn open_workspace() -> Result<AppState, String> {
    let data_dir = app_data_dir()?;
    let env_path = data_dir.join(".env");
    if env_path.exists() {
        let _ = dotenvy::from_path(&env_path);
    }

    let repo: Arc<dyn WorkspaceRepository> = match DataverseClient::from_env() {
        Ok(client) => Arc::new(DataverseRepository::new(client)),
        Err(e) => {
            log::warn!("record platform not configured ({}), using in-memory store", e);
            Arc::new(InMemoryRepository::new())
        }
    };
    let service = DocumentService::new(repo, data_dir.join("previews"));
    let db = db::Db::new(data_dir.join("workspace.db"))?;
    AppState::new(service, db)
}
