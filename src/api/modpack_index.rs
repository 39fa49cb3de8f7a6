use super::http::{join_url, json_client, read_data};
use super::pacer::Pacer;
use crate::Result;
use core::time::Duration;
use ohno::IntoAppError;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::sync::Arc;

const LOG_TARGET: &str = "  mpindex";

/// Production endpoint of the Modpack Index API.
pub const DEFAULT_BASE_URL: &str = "https://www.modpackindex.com/api";

/// Largest page the index serves. Only the first page is ever consulted.
const PAGE_LIMIT: &str = "100";

/// Entries not mirrored from the marketplace carry no `curse_info`.
#[derive(Debug, Deserialize)]
struct IndexEntry {
    id: u64,
    #[serde(default)]
    curse_info: Option<CurseInfo>,
}

impl IndexEntry {
    fn curse_id(&self) -> Option<u64> {
        self.curse_info.as_ref().map(|info| info.curse_id)
    }
}

#[derive(Debug, Deserialize)]
struct CurseInfo {
    curse_id: u64,
}

/// Finds the modpacks that bundle a given mod.
///
/// The index is keyed by its own ids, so the marketplace id is first mapped onto an index
/// entry by searching for the project's display name.
#[derive(Debug, Clone)]
pub struct ModpackIndexClient {
    client: reqwest::Client,
    base_url: String,
    pacer: Arc<Pacer>,
}

impl ModpackIndexClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, pacer: Arc<Pacer>) -> Result<Self> {
        Ok(Self {
            client: json_client(timeout, HeaderMap::new())?,
            base_url: base_url.into(),
            pacer,
        })
    }

    /// Marketplace ids of the projects believed to depend on `project_id`.
    ///
    /// Lookup failures are logged and reported as "no dependents".
    pub async fn discover_dependents(&self, project_id: u64, project_name: &str) -> Vec<u64> {
        match self.try_discover_dependents(project_id, project_name).await {
            Ok(Some(ids)) => ids,
            Ok(None) => {
                log::info!(target: LOG_TARGET, "Project <{project_name}> ({project_id}) is not listed in the modpack index");
                Vec::new()
            }
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not discover dependents of <{project_name}> ({project_id}): {e:#}");
                Vec::new()
            }
        }
    }

    async fn try_discover_dependents(&self, project_id: u64, project_name: &str) -> Result<Option<Vec<u64>>> {
        let Some(index_id) = self.find_index_id(project_id, project_name).await? else {
            return Ok(None);
        };

        let modpacks: Vec<IndexEntry> = self
            .get(
                &format!("/v1/mod/{index_id}/modpacks"),
                &[("limit", PAGE_LIMIT), ("page", "1")],
                "modpack listing",
            )
            .await?;

        Ok(Some(modpacks.iter().filter_map(IndexEntry::curse_id).collect()))
    }

    async fn find_index_id(&self, project_id: u64, project_name: &str) -> Result<Option<u64>> {
        let candidates: Vec<IndexEntry> = self
            .get("/v1/mods", &[("name", project_name), ("limit", PAGE_LIMIT), ("page", "1")], "mod search")
            .await?;

        Ok(candidates
            .into_iter()
            .find(|entry| entry.curse_id() == Some(project_id))
            .map(|entry| entry.id))
    }

    async fn get<T>(&self, path: &str, query: &[(&str, &str)], what: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = join_url(&self.base_url, path)?;
        self.pacer.wait().await;

        log::debug!(target: LOG_TARGET, "GET {url}");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .into_app_err_with(|| format!("{what} could not be sent"))?;

        read_data(response, what).await
    }
}
