//! Wire records returned by the marketplace API.

use crate::deps::FileIdentifier;
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use strum::Display;
use url::Url;

/// The `{"data": ...}` wrapper every marketplace response is delivered in.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

/// One project (mod, modpack, resource pack, ...) listed on the marketplace.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: u64,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub logo: Option<Logo>,
    #[serde(default)]
    pub latest_files_indexes: Vec<LatestFileIndex>,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_count")]
    pub download_count: u64,
    #[serde(default)]
    pub links: Links,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Author {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Logo {
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestFileIndex {
    pub game_version: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Links {
    #[serde(default)]
    pub website_url: Option<String>,
}

impl ProjectRecord {
    /// The project type encoded in the website URL, e.g. `mc-mods` for
    /// `https://www.curseforge.com/minecraft/mc-mods/jei`.
    #[must_use]
    pub fn project_type(&self) -> Option<String> {
        let url = Url::parse(self.links.website_url.as_deref()?).ok()?;
        let segments: Vec<_> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        let index = segments.len().checked_sub(2)?;
        segments.get(index).map(|s| (*s).to_string())
    }

    #[must_use]
    pub fn logo_url(&self) -> Option<&str> {
        self.logo.as_ref()?.thumbnail_url.as_deref()
    }

    /// Game versions of the latest files, in the order the marketplace lists them.
    #[must_use]
    pub fn game_versions(&self) -> Vec<&str> {
        self.latest_files_indexes.iter().map(|lfi| lfi.game_version.as_str()).collect()
    }
}

/// Release channel of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ReleaseType {
    Unknown,
    Release,
    Beta,
    Alpha,
}

impl ReleaseType {
    /// Map the marketplace's numeric release code; anything outside `1..=3` is `Unknown`.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Release,
            2 => Self::Beta,
            3 => Self::Alpha,
            _ => Self::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for ReleaseType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self::from_code(i64::deserialize(deserializer)?))
    }
}

/// One downloadable file of a project.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    #[serde(rename = "modId")]
    pub project_id: u64,
    pub id: u64,
    pub display_name: String,
    pub file_name: String,
    pub release_type: ReleaseType,
    #[serde(default)]
    pub game_versions: Vec<String>,
    pub file_date: DateTime<Utc>,
    pub file_length: u64,
    #[serde(deserialize_with = "deserialize_count")]
    pub download_count: u64,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl FileRecord {
    #[must_use]
    pub const fn identifier(&self) -> FileIdentifier {
        FileIdentifier::new(self.project_id, self.id)
    }
}

/// Download counts arrive as JSON numbers that may carry a fractional part.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "value is checked to be finite and non-negative; truncation is intended"
)]
fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 0.0 {
        return Err(D::Error::custom(format!("invalid download count {value}")));
    }

    Ok(value as u64)
}
