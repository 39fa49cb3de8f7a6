use crate::Result;
use crate::api::{Author, FileRecord, ProjectRecord};
use crate::deps::FileIdentifier;
use chrono::{DateTime, Utc};

/// Destination for collected statistics.
///
/// The collector drives a handler strictly as a sink, in the order project info, authors and
/// download counts, then files, then dependency edges. A run is bracketed by
/// [`begin`](Self::begin) and either [`commit`](Self::commit) or [`rollback`](Self::rollback),
/// so a handler can discard everything a failed run wrote.
pub trait SaveHandler {
    /// Whether what is stored for `project_id` no longer reflects the marketplace.
    ///
    /// `true` when nothing is stored, when the project was modified after the stored copy, or
    /// when the latest stored download count differs from `download_count`.
    fn is_saved_project_outdated(&self, project_id: u64, date_modified: DateTime<Utc>, download_count: u64) -> Result<bool>;

    fn save_project_info(&mut self, project: &ProjectRecord) -> Result<()>;

    fn save_project_authors(&mut self, project_id: u64, authors: &[Author]) -> Result<()>;

    fn save_project_download_count(&mut self, project_id: u64, download_count: u64) -> Result<()>;

    fn save_file_info(&mut self, file: &FileRecord) -> Result<()>;

    fn save_file_download_count(&mut self, file: FileIdentifier, download_count: u64) -> Result<()>;

    fn save_file_dependency(&mut self, subject_file: FileIdentifier, dependency_file: FileIdentifier) -> Result<()>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}
