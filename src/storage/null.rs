use super::SaveHandler;
use crate::Result;
use crate::api::{Author, FileRecord, ProjectRecord};
use crate::deps::FileIdentifier;
use chrono::{DateTime, Utc};

const LOG_TARGET: &str = "   storage";

/// A handler that stores nothing, for dry runs.
///
/// Nothing is ever stored, so every project is reported as outdated.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSaveHandler;

impl SaveHandler for NullSaveHandler {
    fn is_saved_project_outdated(&self, _project_id: u64, _date_modified: DateTime<Utc>, _download_count: u64) -> Result<bool> {
        Ok(true)
    }

    fn save_project_info(&mut self, project: &ProjectRecord) -> Result<()> {
        log::debug!(target: LOG_TARGET, "Dry run: project {} ('{}')", project.id, project.name);
        Ok(())
    }

    fn save_project_authors(&mut self, _project_id: u64, _authors: &[Author]) -> Result<()> {
        Ok(())
    }

    fn save_project_download_count(&mut self, project_id: u64, download_count: u64) -> Result<()> {
        log::debug!(target: LOG_TARGET, "Dry run: project {project_id} has {download_count} downloads");
        Ok(())
    }

    fn save_file_info(&mut self, _file: &FileRecord) -> Result<()> {
        Ok(())
    }

    fn save_file_download_count(&mut self, _file: FileIdentifier, _download_count: u64) -> Result<()> {
        Ok(())
    }

    fn save_file_dependency(&mut self, subject_file: FileIdentifier, dependency_file: FileIdentifier) -> Result<()> {
        log::debug!(target: LOG_TARGET, "Dry run: {subject_file} depends on {dependency_file}");
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }
}
