use super::fetcher::{BoundedFetcher, FetchError};
use super::scratch::ScratchFile;
use super::store::DependencyStore;
use super::{FileIdentifier, SkipReason, manifest};
use crate::Result;
use crate::api::{CurseForgeClient, FileRecord, ModpackIndexClient, ProjectRecord};
use ohno::EnrichableExt;
use std::path::PathBuf;
use std::time::Instant;

const LOG_TARGET: &str = "  resolver";

/// Outcome of resolving one file: either its dependencies are now stored, or it was skipped.
pub type Resolution = core::result::Result<(), SkipReason>;

/// Tunables for a [`DependencyResolver`].
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Where files are downloaded while their manifest is read.
    pub scratch_dir: PathBuf,

    /// Files larger than this many bytes are not downloaded.
    pub max_file_length: u64,

    /// Skip projects and files nobody has ever downloaded.
    pub skip_zero_downloads: bool,
}

/// Dependents of a project, limited to those with at least one resolved file.
#[derive(Debug, Clone, Default)]
pub struct ProjectDependents {
    pub dependents: Vec<ProjectRecord>,
    pub files: Vec<FileIdentifier>,
}

/// Result of a pass over the skip ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub attempted: usize,
    pub resolved: usize,
}

/// Works out which files of which projects bundle a given project.
///
/// Dependents are discovered through the modpack index, their files are listed through the
/// marketplace API, and each file's archive is downloaded once to read its manifest. Results are
/// cached in the [`DependencyStore`] so a file is only downloaded again if its earlier resolution
/// did not complete.
#[derive(Debug)]
pub struct DependencyResolver {
    curseforge: CurseForgeClient,
    modpack_index: ModpackIndexClient,
    fetcher: BoundedFetcher,
    store: DependencyStore,
    options: ResolverOptions,
}

impl DependencyResolver {
    #[must_use]
    pub const fn new(
        curseforge: CurseForgeClient,
        modpack_index: ModpackIndexClient,
        fetcher: BoundedFetcher,
        store: DependencyStore,
        options: ResolverOptions,
    ) -> Self {
        Self {
            curseforge,
            modpack_index,
            fetcher,
            store,
            options,
        }
    }

    #[must_use]
    pub const fn curseforge(&self) -> &CurseForgeClient {
        &self.curseforge
    }

    #[must_use]
    pub const fn store(&self) -> &DependencyStore {
        &self.store
    }

    #[must_use]
    pub const fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Find the projects whose files bundle `project_id`, along with those files.
    ///
    /// Failing to fetch the dependents' metadata fails the whole call. Failures for a single
    /// dependent or file are logged and do not affect the others.
    pub async fn get_project_dependents(&self, project_id: u64, project_name: &str) -> Result<ProjectDependents> {
        let start = Instant::now();

        let dependent_ids = self.modpack_index.discover_dependents(project_id, project_name).await;
        if dependent_ids.is_empty() {
            log::warn!(target: LOG_TARGET, "No dependents found for project {project_id} ('{project_name}')");
            return Ok(ProjectDependents::default());
        }

        log::info!(target: LOG_TARGET, "Found {} dependents of project {project_id} ('{project_name}')", dependent_ids.len());

        let records = self
            .curseforge
            .get_projects(&dependent_ids)
            .await
            .map_err(|e| e.enrich(format!("could not fetch the dependents of project {project_id}")))?;

        let mut result = ProjectDependents::default();
        for dependent in records {
            if self.options.skip_zero_downloads && dependent.download_count == 0 {
                log::info!(target: LOG_TARGET, "Skipping dependent {} ('{}'): it has never been downloaded", dependent.id, dependent.name);
                continue;
            }

            let files = match self.curseforge.get_project_files(dependent.id).await {
                Ok(files) => files,
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not list the files of dependent {} ('{}'): {e}", dependent.id, dependent.name);
                    continue;
                }
            };

            let before = result.files.len();
            for file in &files {
                if self.process_file(file).await? {
                    result.files.push(file.identifier());
                }
            }

            let resolved = result.files.len() - before;
            log::debug!(target: LOG_TARGET, "Dependent {}: resolved {resolved} of {} files", dependent.id, files.len());

            if resolved > 0 {
                result.dependents.push(dependent);
            }
        }

        log::info!(
            target: LOG_TARGET,
            "Resolved {} files from {} dependents of project {project_id} in {:.2}s",
            result.files.len(),
            result.dependents.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(result)
    }

    /// Bring one file to a resolved state if possible, returning whether it got there.
    async fn process_file(&self, file: &FileRecord) -> Result<bool> {
        let subject_file = file.identifier();

        if self.store.has_resolved_edges(subject_file)? {
            log::trace!(target: LOG_TARGET, "Dependencies of {subject_file} are already known");
            return Ok(true);
        }

        let Some(url) = file.download_url.as_deref().filter(|url| !url.is_empty()) else {
            log::info!(target: LOG_TARGET, "File {subject_file} ('{}') has no download URL", file.file_name);
            return Ok(false);
        };

        if self.options.skip_zero_downloads && file.download_count == 0 {
            self.store.mark_skipped(subject_file, SkipReason::ZeroDownloads, url)?;
            return Ok(false);
        }

        match self
            .resolve_file(subject_file, &file.file_name, url, Some(file.file_length), self.options.max_file_length)
            .await?
        {
            Ok(()) => {
                log::info!(target: LOG_TARGET, "Resolved {subject_file} ('{}')", file.file_name);
                Ok(true)
            }
            Err(reason) => {
                log::info!(target: LOG_TARGET, "Skipped {subject_file} ('{}'): {reason}", file.file_name);
                Ok(false)
            }
        }
    }

    /// Download `url`, read its manifest, and store the dependencies of `subject_file`.
    ///
    /// A `declared_length` above `max_file_length` is rejected without any network traffic;
    /// `None` defers the size check to the download itself. Every skip is written to the ledger
    /// and a success clears the ledger entry. The outer error reports storage failures only.
    pub async fn resolve_file(
        &self,
        subject_file: FileIdentifier,
        file_name: &str,
        url: &str,
        declared_length: Option<u64>,
        max_file_length: u64,
    ) -> Result<Resolution> {
        if let Some(declared) = declared_length
            && declared > max_file_length
        {
            log::debug!(target: LOG_TARGET, "'{file_name}' declares {declared} bytes, above the {max_file_length} byte limit");
            return self.skip(subject_file, SkipReason::DownloadTooLarge, url);
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.options.scratch_dir).await {
            log::warn!(
                target: LOG_TARGET,
                "Could not create scratch directory '{}': {e}",
                self.options.scratch_dir.display()
            );
            return self.skip(subject_file, SkipReason::DownloadError, url);
        }

        let scratch = ScratchFile::new(&self.options.scratch_dir, subject_file);

        match self.fetcher.fetch(url, max_file_length, scratch.path()).await {
            Ok(_) => {}
            Err(e @ FetchError::TooLarge(_)) => {
                log::debug!(target: LOG_TARGET, "Could not download '{file_name}': {e}");
                return self.skip(subject_file, SkipReason::DownloadTooLarge, url);
            }
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not download '{file_name}' from <{url}>: {e}");
                return self.skip(subject_file, SkipReason::DownloadError, url);
            }
        }

        let archive = match tokio::fs::read(scratch.path()).await {
            Ok(archive) => archive,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not read downloaded '{file_name}': {e}");
                return self.skip(subject_file, SkipReason::FileParsingError, url);
            }
        };

        let dependency_files = match manifest::parse(&archive) {
            Ok(dependency_files) => dependency_files,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not read the manifest of '{file_name}': {e}");
                return self.skip(subject_file, SkipReason::FileParsingError, url);
            }
        };

        self.store.record_resolution(subject_file, &dependency_files)?;
        self.store.clear_skipped(subject_file)?;

        log::debug!(target: LOG_TARGET, "'{file_name}' declares {} dependencies", dependency_files.len());
        Ok(Ok(()))
    }

    fn skip(&self, subject_file: FileIdentifier, reason: SkipReason, url: &str) -> Result<Resolution> {
        self.store.mark_skipped(subject_file, reason, url)?;
        Ok(Err(reason))
    }

    /// Retry every file skipped for `reason` (optionally only those skipped at `timestamp`)
    /// with a `relaxed_max_file_length` ceiling.
    ///
    /// Declared lengths are not consulted; only the live download enforces the ceiling. Entries
    /// without a recorded URL are left untouched and not counted as attempted.
    pub async fn retry_skipped(&self, reason: SkipReason, relaxed_max_file_length: u64, timestamp: Option<i64>) -> Result<RetrySummary> {
        let entries = self.store.list_skipped(reason, timestamp)?;
        log::info!(target: LOG_TARGET, "Retrying {} files skipped with reason {reason}", entries.len());

        let mut summary = RetrySummary::default();
        for entry in entries {
            // Nothing to fetch; the entry keeps its reason
            if entry.url.is_empty() {
                log::info!(target: LOG_TARGET, "Not retrying {}: no download URL was recorded", entry.file);
                continue;
            }

            summary.attempted += 1;

            let file_name = file_name_from_url(&entry.url);
            match self
                .resolve_file(entry.file, &file_name, &entry.url, None, relaxed_max_file_length)
                .await?
            {
                Ok(()) => {
                    log::info!(target: LOG_TARGET, "Resolved {} ('{file_name}') on retry", entry.file);
                    summary.resolved += 1;
                }
                Err(reason) => log::info!(target: LOG_TARGET, "{} ('{file_name}') still skipped: {reason}", entry.file),
            }
        }

        log::info!(target: LOG_TARGET, "Resolved {} of {} skipped files", summary.resolved, summary.attempted);
        Ok(summary)
    }

    pub fn lookup_edge(&self, subject_file: FileIdentifier, target_project_id: u64) -> Result<Option<FileIdentifier>> {
        self.store.lookup_edge(subject_file, target_project_id)
    }

    pub fn is_dependency_of(&self, subject_file: FileIdentifier, target_project_id: u64) -> Result<bool> {
        self.store.is_dependency_of(subject_file, target_project_id)
    }
}

/// The last path segment of `url`, or the whole string if it has none.
fn file_name_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_owned))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| url.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(file_name_from_url("https://edge.example.com/files/42/pack-1.0.zip"), "pack-1.0.zip");
        assert_eq!(file_name_from_url("http://x/mod.zip?token=1"), "mod.zip");
        assert_eq!(file_name_from_url("http://x/"), "http://x/");
        assert_eq!(file_name_from_url("not a url"), "not a url");
    }
}
