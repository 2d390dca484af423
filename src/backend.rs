//! Thin JSON client for the separate project/client REST backend. Same
//! failure split as the record façade: list reads degrade to empty, writes
//! surface translated errors.

use crate::error::WorkspaceError;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

fn load_env() {
    let _ = dotenvy::dotenv();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub client: Option<i64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub progress: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientAccount {
    #[serde(default)]
    pub id: Option<i64>,
    pub company_name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

pub struct BackendApi {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl BackendApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, WorkspaceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WorkspaceError::Platform {
                status: 0,
                message: e.to_string(),
            })?;
        Ok(BackendApi {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    pub fn from_env() -> Result<Self, WorkspaceError> {
        load_env();
        let base_url =
            std::env::var("CORE_API_URL").map_err(|_| WorkspaceError::MissingConfig("CORE_API_URL"))?;
        let token = std::env::var("CORE_API_TOKEN").ok().filter(|t| !t.trim().is_empty());
        BackendApi::new(base_url, token)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::blocking::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    fn send<T: DeserializeOwned>(
        builder: reqwest::blocking::RequestBuilder,
    ) -> Result<T, WorkspaceError> {
        let response = builder.send().map_err(|e| WorkspaceError::from_transport(&e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
                .unwrap_or(body);
            return Err(WorkspaceError::Platform {
                status: status.as_u16(),
                message,
            });
        }
        response.json().map_err(|e| WorkspaceError::Platform {
            status: 0,
            message: format!("Invalid JSON: {}", e),
        })
    }

    fn list<T: DeserializeOwned>(&self, path: &str) -> Vec<T> {
        match Self::send::<Vec<T>>(self.request(reqwest::Method::GET, path)) {
            Ok(items) => items,
            Err(e) => {
                log::warn!("GET {} failed: {}", path, e);
                Vec::new()
            }
        }
    }

    pub fn projects(&self) -> Vec<Project> {
        self.list("/api/projects/")
    }

    pub fn project(&self, id: i64) -> Result<Project, WorkspaceError> {
        Self::send(self.request(reqwest::Method::GET, &format!("/api/projects/{}/", id)))
    }

    pub fn create_project(&self, project: &Project) -> Result<Project, WorkspaceError> {
        Self::send(self.request(reqwest::Method::POST, "/api/projects/").json(project))
    }

    pub fn update_project(&self, id: i64, project: &Project) -> Result<Project, WorkspaceError> {
        Self::send(
            self.request(reqwest::Method::PATCH, &format!("/api/projects/{}/", id))
                .json(project),
        )
    }

    pub fn delete_project(&self, id: i64) -> Result<(), WorkspaceError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/api/projects/{}/", id))
            .send()
            .map_err(|e| WorkspaceError::from_transport(&e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(WorkspaceError::Platform {
                status: response.status().as_u16(),
                message: response.text().unwrap_or_default(),
            })
        }
    }

    pub fn clients(&self) -> Vec<ClientAccount> {
        self.list("/api/clients/")
    }

    pub fn client_account(&self, id: i64) -> Result<ClientAccount, WorkspaceError> {
        Self::send(self.request(reqwest::Method::GET, &format!("/api/clients/{}/", id)))
    }

    pub fn create_client(&self, account: &ClientAccount) -> Result<ClientAccount, WorkspaceError> {
        Self::send(self.request(reqwest::Method::POST, "/api/clients/").json(account))
    }
}
