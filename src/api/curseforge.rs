use super::http::{join_url, json_client, read_data};
use super::pacer::Pacer;
use super::records::{FileRecord, ProjectRecord};
use crate::Result;
use core::time::Duration;
use ohno::IntoAppError;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use std::sync::Arc;

const LOG_TARGET: &str = "curseforge";

/// Production endpoint of the `CurseForge` Core API.
pub const DEFAULT_BASE_URL: &str = "https://api.curseforge.com";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectsRequest<'a> {
    mod_ids: &'a [u64],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FilesRequest<'a> {
    file_ids: &'a [u64],
}

/// Client for the marketplace metadata API.
#[derive(Debug, Clone)]
pub struct CurseForgeClient {
    client: reqwest::Client,
    base_url: String,
    pacer: Arc<Pacer>,
}

impl CurseForgeClient {
    pub fn new(api_key: &str, base_url: impl Into<String>, timeout: Duration, pacer: Arc<Pacer>) -> Result<Self> {
        let mut key = HeaderValue::from_str(api_key).into_app_err("the API key contains characters not allowed in a header")?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-api-key", key);

        Ok(Self {
            client: json_client(timeout, headers)?,
            base_url: base_url.into(),
            pacer,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_project(&self, project_id: u64) -> Result<ProjectRecord> {
        self.get(&format!("/v1/mods/{project_id}"), &format!("project {project_id} lookup"))
            .await
    }

    /// Fetch several projects in one request. Unknown ids are silently absent from the result.
    pub async fn get_projects(&self, project_ids: &[u64]) -> Result<Vec<ProjectRecord>> {
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.post(
            "/v1/mods",
            &ProjectsRequest { mod_ids: project_ids },
            &format!("batch lookup of {} projects", project_ids.len()),
        )
        .await
    }

    /// List the files of a project. Only the first page the API returns is consulted.
    pub async fn get_project_files(&self, project_id: u64) -> Result<Vec<FileRecord>> {
        self.get(&format!("/v1/mods/{project_id}/files"), &format!("file listing of project {project_id}"))
            .await
    }

    pub async fn get_file(&self, project_id: u64, file_id: u64) -> Result<FileRecord> {
        self.get(
            &format!("/v1/mods/{project_id}/files/{file_id}"),
            &format!("file {project_id}/{file_id} lookup"),
        )
        .await
    }

    /// Fetch several files in one request. Unknown ids are silently absent from the result.
    pub async fn get_files(&self, file_ids: &[u64]) -> Result<Vec<FileRecord>> {
        if file_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.post(
            "/v1/mods/files",
            &FilesRequest { file_ids },
            &format!("batch lookup of {} files", file_ids.len()),
        )
        .await
    }

    async fn get<T>(&self, path: &str, what: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = join_url(&self.base_url, path)?;
        self.pacer.wait().await;

        log::debug!(target: LOG_TARGET, "GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .into_app_err_with(|| format!("{what} could not be sent"))?;

        read_data(response, what).await
    }

    async fn post<T, B>(&self, path: &str, body: &B, what: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize + Sync,
    {
        let url = join_url(&self.base_url, path)?;
        self.pacer.wait().await;

        log::debug!(target: LOG_TARGET, "POST {url}");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .into_app_err_with(|| format!("{what} could not be sent"))?;

        read_data(response, what).await
    }
}
