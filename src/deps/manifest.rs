//! Reads the dependency list a modpack archive declares in its manifest.

use super::FileIdentifier;
use core::fmt::{Display, Formatter, Result as FmtResult};
use ohno::AppError;
use serde::Deserialize;
use std::io::{Cursor, Read};
use zip::ZipArchive;
use zip::result::ZipError;

/// Path of the manifest inside a modpack archive.
pub const MANIFEST_PATH: &str = "manifest.json";

/// Why an archive's dependency list could not be extracted.
#[derive(Debug)]
pub enum ManifestError {
    /// The archive has no manifest at its root.
    Missing,

    /// The manifest exists but is not a valid dependency document.
    Malformed(AppError),

    /// The bytes are not a readable archive.
    UnreadableArchive(AppError),
}

impl Display for ManifestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Missing => write!(f, "archive has no {MANIFEST_PATH}"),
            Self::Malformed(e) => write!(f, "malformed {MANIFEST_PATH}: {e}"),
            Self::UnreadableArchive(e) => write!(f, "unreadable archive: {e}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    files: Option<Vec<ManifestFile>>,
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(rename = "projectID")]
    project_id: u64,
    #[serde(rename = "fileID")]
    file_id: u64,
}

/// Extract the declared dependencies of an archive.
///
/// Entries are returned verbatim and in manifest order, duplicates included. A manifest
/// without a `files` list declares no dependencies.
pub fn parse(archive_bytes: &[u8]) -> Result<Vec<FileIdentifier>, ManifestError> {
    let mut archive =
        ZipArchive::new(Cursor::new(archive_bytes)).map_err(|e| ManifestError::UnreadableArchive(AppError::new(e)))?;

    let mut entry = match archive.by_name(MANIFEST_PATH) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Err(ManifestError::Missing),
        Err(e) => return Err(ManifestError::UnreadableArchive(AppError::new(e))),
    };

    let mut text = Vec::new();
    let _ = entry
        .read_to_end(&mut text)
        .map_err(|e| ManifestError::UnreadableArchive(AppError::new(e)))?;

    parse_manifest(&text)
}

/// Extract the declared dependencies from the manifest document itself.
pub fn parse_manifest(manifest: &[u8]) -> Result<Vec<FileIdentifier>, ManifestError> {
    let manifest: Manifest = serde_json::from_slice(manifest).map_err(|e| ManifestError::Malformed(AppError::new(e)))?;

    Ok(manifest
        .files
        .unwrap_or_default()
        .into_iter()
        .map(|f| FileIdentifier::new(f.project_id, f.file_id))
        .collect())
}
