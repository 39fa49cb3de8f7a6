use crate::Result;
use crate::api::{FileRecord, ProjectRecord};
use crate::deps::{DependencyResolver, FileIdentifier};
use crate::storage::SaveHandler;
use std::collections::HashSet;
use std::time::Instant;

/// Log target for the collector
const LOG_TARGET: &str = " collector";

/// Gathers the statistics of one project, its files, and the modpack files that bundle it.
#[derive(Debug)]
pub struct DataCollector {
    resolver: DependencyResolver,
}

impl DataCollector {
    #[must_use]
    pub const fn new(resolver: DependencyResolver) -> Self {
        Self { resolver }
    }

    #[must_use]
    pub const fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    /// Collect everything known about `project_id` into `save_handler`.
    ///
    /// Returns `Ok(false)` when nothing worth keeping was collected: the project or its files
    /// could not be fetched, its dependents could not be looked up, or (unless `force` is set)
    /// the stored data is already current. The caller decides whether to commit what was
    /// written. Storage failures are returned as errors.
    pub async fn collect_data(&self, save_handler: &mut dyn SaveHandler, project_id: u64, force: bool) -> Result<bool> {
        let start = Instant::now();
        let curseforge = self.resolver.curseforge();

        let project = match curseforge.get_project(project_id).await {
            Ok(project) => project,
            Err(e) => {
                log::error!(target: LOG_TARGET, "Could not fetch project {project_id}: {e}");
                return Ok(false);
            }
        };

        if !force && !save_handler.is_saved_project_outdated(project.id, project.date_modified, project.download_count)? {
            log::warn!(target: LOG_TARGET, "Skipping project '{}': nothing changed since the last collection", project.slug);
            return Ok(false);
        }

        log::info!(target: LOG_TARGET, "Storing project info for '{}'", project.slug);
        store_project(save_handler, &project)?;

        let files = match curseforge.get_project_files(project.id).await {
            Ok(files) => files,
            Err(e) => {
                log::error!(target: LOG_TARGET, "Could not fetch the files of project '{}': {e}", project.slug);
                return Ok(false);
            }
        };

        if files.is_empty() {
            log::warn!(target: LOG_TARGET, "Project '{}' has no files", project.slug);
            return Ok(false);
        }

        log::info!(target: LOG_TARGET, "Storing {} files of project '{}'", files.len(), project.slug);
        for file in &files {
            store_file(save_handler, file)?;
        }

        let dependents = match self.resolver.get_project_dependents(project.id, &project.name).await {
            Ok(dependents) => dependents,
            Err(e) => {
                log::error!(target: LOG_TARGET, "Could not resolve the dependents of project '{}': {e:#}", project.slug);
                return Ok(false);
            }
        };

        if !dependents.dependents.is_empty() {
            log::info!(target: LOG_TARGET, "Storing info for {} dependents of '{}'", dependents.dependents.len(), project.slug);
            for dependent in &dependents.dependents {
                store_project(save_handler, dependent)?;
            }
        }

        let mut stored_files = 0;
        for file in self.fetch_file_records(&dependents.files).await {
            let subject_file = file.identifier();
            log::debug!(target: LOG_TARGET, "Checking whether '{}' bundles '{}'", file.file_name, project.name);

            match self.resolver.lookup_edge(subject_file, project.id)? {
                Some(dependency_file) => {
                    store_file(save_handler, &file)?;
                    save_handler.save_file_dependency(subject_file, dependency_file)?;
                    stored_files += 1;
                }
                None => {
                    log::warn!(target: LOG_TARGET, "Skipping file '{}': it does not depend on '{}'", file.file_name, project.slug);
                }
            }
        }

        log::info!(
            target: LOG_TARGET,
            "Collected project '{}' with {stored_files} dependent files in {:.2}s",
            project.slug,
            start.elapsed().as_secs_f64()
        );

        Ok(true)
    }

    /// Fetch the records of `files` in one batch, falling back to one request per file.
    ///
    /// Files that cannot be fetched are logged and left out.
    async fn fetch_file_records(&self, files: &[FileIdentifier]) -> Vec<FileRecord> {
        if files.is_empty() {
            return Vec::new();
        }

        let curseforge = self.resolver.curseforge();
        let file_ids: Vec<u64> = files.iter().map(FileIdentifier::file_id).collect();

        match curseforge.get_files(&file_ids).await {
            Ok(records) => {
                let wanted: HashSet<FileIdentifier> = files.iter().copied().collect();
                records.into_iter().filter(|r| wanted.contains(&r.identifier())).collect()
            }
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not fetch {} files in one batch, fetching them one by one: {e}", files.len());

                let mut records = Vec::with_capacity(files.len());
                for file in files {
                    match curseforge.get_file(file.project_id(), file.file_id()).await {
                        Ok(record) => records.push(record),
                        Err(e) => log::error!(target: LOG_TARGET, "Could not fetch file {file}: {e}"),
                    }
                }

                records
            }
        }
    }
}

fn store_project(save_handler: &mut dyn SaveHandler, project: &ProjectRecord) -> Result<()> {
    save_handler.save_project_info(project)?;
    save_handler.save_project_authors(project.id, &project.authors)?;
    save_handler.save_project_download_count(project.id, project.download_count)
}

fn store_file(save_handler: &mut dyn SaveHandler, file: &FileRecord) -> Result<()> {
    save_handler.save_file_info(file)?;
    save_handler.save_file_download_count(file.identifier(), file.download_count)
}
