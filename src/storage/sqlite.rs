//! Relational statistics sink.

use super::SaveHandler;
use crate::Result;
use crate::api::{Author, FileRecord, ProjectRecord};
use crate::deps::FileIdentifier;
use chrono::{DateTime, Utc};
use ohno::IntoAppError;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

const LOG_TARGET: &str = "   storage";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS project (
        id INTEGER PRIMARY KEY,
        slug TEXT NOT NULL,
        name TEXT NOT NULL,
        type TEXT,
        mc_version TEXT NOT NULL,
        summary TEXT NOT NULL,
        logo TEXT,
        date_created INTEGER NOT NULL,
        date_modified INTEGER NOT NULL,
        date_collected INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS author (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS project_authors (
        project_id INTEGER NOT NULL,
        author_id INTEGER NOT NULL,
        timestamp INTEGER NOT NULL,
        PRIMARY KEY (project_id, author_id)
    )",
    "CREATE TABLE IF NOT EXISTS project_downloads (
        project_id INTEGER NOT NULL,
        download_count INTEGER NOT NULL,
        timestamp INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS project_downloads_project ON project_downloads (project_id, timestamp)",
    "CREATE TABLE IF NOT EXISTS file (
        project_id INTEGER NOT NULL,
        file_id INTEGER NOT NULL,
        display_name TEXT NOT NULL,
        file_name TEXT NOT NULL,
        release_type TEXT NOT NULL,
        mc_versions TEXT NOT NULL,
        date_created INTEGER NOT NULL,
        size INTEGER NOT NULL,
        PRIMARY KEY (project_id, file_id)
    )",
    "CREATE TABLE IF NOT EXISTS file_downloads (
        project_id INTEGER NOT NULL,
        file_id INTEGER NOT NULL,
        download_count INTEGER NOT NULL,
        timestamp INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS file_dependencies (
        project_id INTEGER NOT NULL,
        file_id INTEGER NOT NULL,
        dependency_project_id INTEGER NOT NULL,
        dependency_file_id INTEGER NOT NULL,
        UNIQUE (project_id, file_id, dependency_project_id, dependency_file_id)
    )",
    // Downloads of each dependent, per dependency and collection timestamp. A file counts
    // once per dependency project even if it bundles several of its files.
    "CREATE VIEW IF NOT EXISTS dependant_downloads AS
    SELECT project_id, name, dependency_project_id, SUM(download_count) AS download_count, timestamp
    FROM (
        SELECT b.project_id, c.name, b.file_id, a.dependency_project_id, b.download_count, b.timestamp
        FROM file_downloads b
            JOIN file_dependencies a ON b.project_id = a.project_id AND b.file_id = a.file_id
            JOIN project c ON b.project_id = c.id
        GROUP BY b.project_id, b.file_id, a.dependency_project_id, b.timestamp
    )
    GROUP BY timestamp, dependency_project_id, project_id",
];

/// How a project's downloads split between its own page and the modpacks bundling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadComposition {
    pub timestamp: i64,
    pub total: i64,
    pub via_dependents: i64,
    pub direct: i64,
}

/// A project with at least one file bundling the queried project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentProject {
    pub project_id: u64,
    pub name: String,
}

/// Stores collected statistics in `SQLite`.
///
/// Every row written is stamped with the collection timestamp given at construction, so that
/// one run's download counts can be told apart from the next.
#[derive(Debug)]
pub struct SqliteSaveHandler {
    conn: Connection,
    timestamp: i64,
}

impl SqliteSaveHandler {
    pub fn open(path: impl AsRef<Path>, timestamp: i64) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).into_app_err_with(|| format!("unable to open statistics database '{}'", path.display()))?;
        log::debug!(target: LOG_TARGET, "Opened statistics database '{}'", path.display());
        Self::with_connection(conn, timestamp)
    }

    pub fn open_in_memory(timestamp: i64) -> Result<Self> {
        let conn = Connection::open_in_memory().into_app_err("unable to open in-memory statistics database")?;
        Self::with_connection(conn, timestamp)
    }

    fn with_connection(conn: Connection, timestamp: i64) -> Result<Self> {
        for statement in SCHEMA {
            let _ = conn
                .execute(statement, [])
                .into_app_err("unable to initialize statistics database schema")?;
        }

        Ok(Self { conn, timestamp })
    }

    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Total, via-dependents, and direct downloads of `project_id` for every collection run
    /// that found dependents, oldest first.
    pub fn download_composition(&self, project_id: u64) -> Result<Vec<DownloadComposition>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT b.timestamp, b.download_count, SUM(a.download_count)
                 FROM dependant_downloads a
                     INNER JOIN project_downloads b ON a.dependency_project_id = b.project_id AND a.timestamp = b.timestamp
                 WHERE a.dependency_project_id = ?1
                 GROUP BY a.dependency_project_id, a.timestamp
                 ORDER BY b.timestamp",
            )
            .into_app_err("unable to prepare download composition query")?;

        let rows = stmt
            .query_map(params![project_id], |row| {
                let total: i64 = row.get(1)?;
                let via_dependents: i64 = row.get(2)?;
                Ok(DownloadComposition {
                    timestamp: row.get(0)?,
                    total,
                    via_dependents,
                    direct: total - via_dependents,
                })
            })
            .into_app_err("unable to query download composition")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .into_app_err_with(|| format!("unable to read download composition of project {project_id}"))
    }

    /// Stored projects with a file that bundles `project_id`, ordered by id.
    pub fn project_dependents(&self, project_id: u64) -> Result<Vec<DependentProject>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT a.id, a.name
                 FROM project a INNER JOIN file_dependencies b ON a.id = b.project_id
                 WHERE b.dependency_project_id = ?1
                 GROUP BY a.id
                 ORDER BY a.id",
            )
            .into_app_err("unable to prepare dependents query")?;

        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok(DependentProject {
                    project_id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .into_app_err("unable to query dependents")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .into_app_err_with(|| format!("unable to read dependents of project {project_id}"))
    }
}

impl SaveHandler for SqliteSaveHandler {
    fn is_saved_project_outdated(&self, project_id: u64, date_modified: DateTime<Utc>, download_count: u64) -> Result<bool> {
        let stored_modified: Option<i64> = self
            .conn
            .query_row("SELECT date_modified FROM project WHERE id = ?1", params![project_id], |row| row.get(0))
            .optional()
            .into_app_err_with(|| format!("unable to read stored project {project_id}"))?;

        if stored_modified.is_some_and(|stored| date_modified.timestamp_millis() > stored) {
            return Ok(true);
        }

        let latest_count: Option<u64> = self
            .conn
            .query_row(
                "SELECT download_count FROM project_downloads WHERE project_id = ?1
                 ORDER BY timestamp DESC, rowid DESC LIMIT 1",
                params![project_id],
                |row| row.get(0),
            )
            .optional()
            .into_app_err_with(|| format!("unable to read stored downloads of project {project_id}"))?;

        Ok(latest_count.is_none_or(|latest| latest != download_count))
    }

    fn save_project_info(&mut self, project: &ProjectRecord) -> Result<()> {
        let _ = self
            .conn
            .execute(
                "INSERT INTO project (id, slug, name, type, mc_version, summary, logo, date_created, date_modified, date_collected)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT (id) DO UPDATE SET
                     slug = excluded.slug, name = excluded.name, type = excluded.type,
                     mc_version = excluded.mc_version, summary = excluded.summary, logo = excluded.logo,
                     date_created = excluded.date_created, date_modified = excluded.date_modified,
                     date_collected = excluded.date_collected",
                params![
                    project.id,
                    project.slug,
                    project.name,
                    project.project_type(),
                    project.game_versions().join(", "),
                    project.summary,
                    project.logo_url(),
                    project.date_created.timestamp_millis(),
                    project.date_modified.timestamp_millis(),
                    self.timestamp
                ],
            )
            .into_app_err_with(|| format!("unable to save project {}", project.id))?;

        Ok(())
    }

    fn save_project_authors(&mut self, project_id: u64, authors: &[Author]) -> Result<()> {
        for author in authors {
            let _ = self
                .conn
                .execute(
                    "INSERT INTO project_authors (project_id, author_id, timestamp) VALUES (?1, ?2, ?3)
                     ON CONFLICT (project_id, author_id) DO UPDATE SET timestamp = excluded.timestamp",
                    params![project_id, author.id, self.timestamp],
                )
                .into_app_err_with(|| format!("unable to save author {} of project {project_id}", author.id))?;

            let _ = self
                .conn
                .execute(
                    "INSERT INTO author (id, name) VALUES (?1, ?2) ON CONFLICT (id) DO UPDATE SET name = excluded.name",
                    params![author.id, author.name],
                )
                .into_app_err_with(|| format!("unable to save author {}", author.id))?;
        }

        Ok(())
    }

    fn save_project_download_count(&mut self, project_id: u64, download_count: u64) -> Result<()> {
        let _ = self
            .conn
            .execute(
                "INSERT INTO project_downloads (project_id, download_count, timestamp) VALUES (?1, ?2, ?3)",
                params![project_id, download_count, self.timestamp],
            )
            .into_app_err_with(|| format!("unable to save download count of project {project_id}"))?;

        Ok(())
    }

    fn save_file_info(&mut self, file: &FileRecord) -> Result<()> {
        let _ = self
            .conn
            .execute(
                "INSERT INTO file (project_id, file_id, display_name, file_name, release_type, mc_versions, date_created, size)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (project_id, file_id) DO UPDATE SET
                     display_name = excluded.display_name, file_name = excluded.file_name,
                     release_type = excluded.release_type, mc_versions = excluded.mc_versions,
                     date_created = excluded.date_created, size = excluded.size",
                params![
                    file.project_id,
                    file.id,
                    file.display_name,
                    file.file_name,
                    file.release_type.to_string(),
                    file.game_versions.join(", "),
                    file.file_date.timestamp_millis(),
                    file.file_length
                ],
            )
            .into_app_err_with(|| format!("unable to save file {}", file.identifier()))?;

        Ok(())
    }

    fn save_file_download_count(&mut self, file: FileIdentifier, download_count: u64) -> Result<()> {
        let _ = self
            .conn
            .execute(
                "INSERT INTO file_downloads (project_id, file_id, download_count, timestamp) VALUES (?1, ?2, ?3, ?4)",
                params![file.project_id(), file.file_id(), download_count, self.timestamp],
            )
            .into_app_err_with(|| format!("unable to save download count of file {file}"))?;

        Ok(())
    }

    fn save_file_dependency(&mut self, subject_file: FileIdentifier, dependency_file: FileIdentifier) -> Result<()> {
        let _ = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO file_dependencies (project_id, file_id, dependency_project_id, dependency_file_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    subject_file.project_id(),
                    subject_file.file_id(),
                    dependency_file.project_id(),
                    dependency_file.file_id()
                ],
            )
            .into_app_err_with(|| format!("unable to save dependency {subject_file} -> {dependency_file}"))?;

        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN").into_app_err("unable to begin transaction")
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT").into_app_err("unable to commit transaction")
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK").into_app_err("unable to roll back transaction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn project(id: u64, name: &str, downloads: u64, modified: DateTime<Utc>) -> ProjectRecord {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "slug": name.to_lowercase(),
            "name": name,
            "summary": "A project",
            "authors": [{"id": 7, "name": "someone"}],
            "logo": {"thumbnailUrl": "https://media.example.com/logo.png"},
            "latestFilesIndexes": [{"gameVersion": "1.20.1"}, {"gameVersion": "1.19.2"}],
            "dateCreated": "2021-01-01T00:00:00.000Z",
            "dateModified": modified.to_rfc3339(),
            "downloadCount": downloads,
            "links": {"websiteUrl": "https://www.curseforge.com/minecraft/modpacks/some-pack"}
        }))
        .unwrap()
    }

    fn file(project_id: u64, id: u64) -> FileRecord {
        serde_json::from_value(serde_json::json!({
            "modId": project_id,
            "id": id,
            "displayName": "Pack 1.0",
            "fileName": "pack-1.0.zip",
            "releaseType": 1,
            "gameVersions": ["1.20.1"],
            "fileDate": "2023-05-01T10:00:00.123Z",
            "fileLength": 1000,
            "downloadCount": 10,
            "downloadUrl": "http://x/pack-1.0.zip"
        }))
        .unwrap()
    }

    fn modified() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_nothing_stored_is_outdated() {
        let handler = SqliteSaveHandler::open_in_memory(1).unwrap();
        assert!(handler.is_saved_project_outdated(100, modified(), 5).unwrap());
    }

    #[test]
    fn test_outdated_checks() {
        let mut handler = SqliteSaveHandler::open_in_memory(1).unwrap();
        handler.save_project_info(&project(100, "Foo", 5, modified())).unwrap();
        handler.save_project_download_count(100, 5).unwrap();

        assert!(!handler.is_saved_project_outdated(100, modified(), 5).unwrap());
        assert!(handler.is_saved_project_outdated(100, modified(), 6).unwrap());
        assert!(
            handler
                .is_saved_project_outdated(100, modified() + chrono::Duration::seconds(1), 5)
                .unwrap()
        );
    }

    #[test]
    fn test_latest_download_count_wins() {
        let mut handler = SqliteSaveHandler::open_in_memory(1).unwrap();
        handler.save_project_download_count(100, 5).unwrap();

        let mut handler = SqliteSaveHandler {
            timestamp: 2,
            ..handler
        };
        handler.save_project_download_count(100, 9).unwrap();

        assert!(!handler.is_saved_project_outdated(100, modified(), 9).unwrap());
        assert!(handler.is_saved_project_outdated(100, modified(), 5).unwrap());
    }

    #[test]
    fn test_rollback_discards_run() {
        let mut handler = SqliteSaveHandler::open_in_memory(1).unwrap();
        handler.begin().unwrap();
        handler.save_project_info(&project(100, "Foo", 5, modified())).unwrap();
        handler.save_project_download_count(100, 5).unwrap();
        handler.rollback().unwrap();

        assert!(handler.is_saved_project_outdated(100, modified(), 5).unwrap());

        handler.begin().unwrap();
        handler.save_project_info(&project(100, "Foo", 5, modified())).unwrap();
        handler.save_project_download_count(100, 5).unwrap();
        handler.commit().unwrap();

        assert!(!handler.is_saved_project_outdated(100, modified(), 5).unwrap());
    }

    #[test]
    fn test_download_composition() {
        let mut handler = SqliteSaveHandler::open_in_memory(1000).unwrap();
        handler.save_project_info(&project(100, "Foo", 500, modified())).unwrap();
        handler.save_project_download_count(100, 500).unwrap();

        handler.save_project_info(&project(200, "Pack", 80, modified())).unwrap();
        handler.save_project_info(&project(300, "Other Pack", 50, modified())).unwrap();

        // Pack bundles two files of Foo from one of its files; that file counts once.
        handler.save_file_info(&file(200, 5)).unwrap();
        handler.save_file_download_count(FileIdentifier::new(200, 5), 60).unwrap();
        handler
            .save_file_dependency(FileIdentifier::new(200, 5), FileIdentifier::new(100, 42))
            .unwrap();
        handler
            .save_file_dependency(FileIdentifier::new(200, 5), FileIdentifier::new(100, 43))
            .unwrap();
        handler
            .save_file_dependency(FileIdentifier::new(200, 5), FileIdentifier::new(100, 43))
            .unwrap();

        handler.save_file_info(&file(300, 8)).unwrap();
        handler.save_file_download_count(FileIdentifier::new(300, 8), 40).unwrap();
        handler
            .save_file_dependency(FileIdentifier::new(300, 8), FileIdentifier::new(100, 42))
            .unwrap();

        let composition = handler.download_composition(100).unwrap();
        assert_eq!(
            composition,
            vec![DownloadComposition {
                timestamp: 1000,
                total: 500,
                via_dependents: 100,
                direct: 400,
            }]
        );

        let dependents = handler.project_dependents(100).unwrap();
        assert_eq!(
            dependents,
            vec![
                DependentProject {
                    project_id: 200,
                    name: "Pack".to_string()
                },
                DependentProject {
                    project_id: 300,
                    name: "Other Pack".to_string()
                },
            ]
        );

        assert!(handler.download_composition(200).unwrap().is_empty());
    }

    #[test]
    fn test_upserts_do_not_duplicate() {
        let mut handler = SqliteSaveHandler::open_in_memory(1).unwrap();
        let record = project(100, "Foo", 5, modified());
        handler.save_project_info(&record).unwrap();
        handler.save_project_info(&record).unwrap();
        handler.save_project_authors(100, &record.authors).unwrap();
        handler.save_project_authors(100, &record.authors).unwrap();
        handler.save_file_info(&file(100, 1)).unwrap();
        handler.save_file_info(&file(100, 1)).unwrap();

        let count = |table: &str| -> i64 {
            handler
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .unwrap()
        };

        assert_eq!(count("project"), 1);
        assert_eq!(count("author"), 1);
        assert_eq!(count("project_authors"), 1);
        assert_eq!(count("file"), 1);
    }
}
