//! Persistent dependency graph and skip ledger.

use super::{FileIdentifier, SkipReason};
use crate::Result;
use chrono::Utc;
use ohno::{IntoAppError, app_err};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const LOG_TARGET: &str = "     store";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS file (
        project_id INTEGER NOT NULL,
        file_id INTEGER NOT NULL,
        dependency_count INTEGER NOT NULL,
        PRIMARY KEY (project_id, file_id)
    )",
    "CREATE TABLE IF NOT EXISTS dependency (
        project_id INTEGER NOT NULL,
        file_id INTEGER NOT NULL,
        dependency_project_id INTEGER NOT NULL,
        dependency_file_id INTEGER NOT NULL,
        UNIQUE (project_id, file_id, dependency_project_id, dependency_file_id)
    )",
    "CREATE INDEX IF NOT EXISTS dependency_target ON dependency (dependency_project_id)",
    "CREATE TABLE IF NOT EXISTS skipped_file (
        project_id INTEGER NOT NULL,
        file_id INTEGER NOT NULL,
        reason INTEGER NOT NULL,
        timestamp INTEGER NOT NULL,
        url TEXT NOT NULL,
        PRIMARY KEY (project_id, file_id)
    )",
];

/// A file the resolver declined to fully process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub file: FileIdentifier,
    pub reason: SkipReason,

    /// Unix seconds of the most recent skip.
    pub timestamp: i64,
    pub url: String,
}

/// `SQLite`-backed store of dependency edges, per-file resolution records, and the skip ledger.
///
/// All access goes through a single connection guarded by a mutex, which serializes writers.
#[derive(Debug)]
pub struct DependencyStore {
    conn: Mutex<Connection>,
}

impl DependencyStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).into_app_err_with(|| format!("unable to open dependency store '{}'", path.display()))?;
        log::debug!(target: LOG_TARGET, "Opened dependency store '{}'", path.display());
        Self::with_connection(conn)
    }

    /// A throwaway store, used for dry runs and tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().into_app_err("unable to open in-memory dependency store")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        for statement in SCHEMA {
            let _ = conn
                .execute(statement, [])
                .into_app_err("unable to initialize dependency store schema")?;
        }

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| app_err!("dependency store lock is poisoned: {e}"))
    }

    /// Whether every dependency declared by `file` has been stored.
    pub fn has_resolved_edges(&self, file: FileIdentifier) -> Result<bool> {
        let conn = self.conn()?;

        let declared: Option<u64> = conn
            .query_row(
                "SELECT dependency_count FROM file WHERE project_id = ?1 AND file_id = ?2",
                params![file.project_id(), file.file_id()],
                |row| row.get(0),
            )
            .optional()
            .into_app_err_with(|| format!("unable to read resolution record for {file}"))?;

        let Some(declared) = declared else {
            return Ok(false);
        };

        let stored: u64 = conn
            .query_row(
                "SELECT COUNT(*) FROM dependency WHERE project_id = ?1 AND file_id = ?2",
                params![file.project_id(), file.file_id()],
                |row| row.get(0),
            )
            .into_app_err_with(|| format!("unable to count dependencies of {file}"))?;

        Ok(declared == stored)
    }

    /// Record the dependencies `subject_file` declares, replacing anything stored for it before.
    ///
    /// Duplicate edges collapse to one (first occurrence wins the position) and the recorded count
    /// is the number of distinct edges, so a completed resolution always reads back as resolved.
    /// Both writes commit together.
    pub fn record_resolution(&self, subject_file: FileIdentifier, dependency_files: &[FileIdentifier]) -> Result<()> {
        let mut seen = HashSet::new();
        let distinct: Vec<FileIdentifier> = dependency_files.iter().copied().filter(|f| seen.insert(*f)).collect();

        let mut conn = self.conn()?;
        let tx = conn.transaction().into_app_err("unable to start transaction")?;

        let _ = tx
            .execute(
                "INSERT INTO file (project_id, file_id, dependency_count) VALUES (?1, ?2, ?3)
                 ON CONFLICT (project_id, file_id) DO UPDATE SET dependency_count = excluded.dependency_count",
                params![subject_file.project_id(), subject_file.file_id(), distinct.len() as u64],
            )
            .into_app_err_with(|| format!("unable to record resolution of {subject_file}"))?;

        let _ = tx
            .execute(
                "DELETE FROM dependency WHERE project_id = ?1 AND file_id = ?2",
                params![subject_file.project_id(), subject_file.file_id()],
            )
            .into_app_err_with(|| format!("unable to clear stale dependencies of {subject_file}"))?;

        {
            let mut insert = tx
                .prepare(
                    "INSERT OR IGNORE INTO dependency (project_id, file_id, dependency_project_id, dependency_file_id)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .into_app_err("unable to prepare dependency insert")?;

            for dependency_file in &distinct {
                let _ = insert
                    .execute(params![
                        subject_file.project_id(),
                        subject_file.file_id(),
                        dependency_file.project_id(),
                        dependency_file.file_id()
                    ])
                    .into_app_err_with(|| format!("unable to store dependency {subject_file} -> {dependency_file}"))?;
            }
        }

        tx.commit()
            .into_app_err_with(|| format!("unable to commit resolution of {subject_file}"))?;

        log::trace!(target: LOG_TARGET, "Stored {} dependencies for {subject_file}", distinct.len());
        Ok(())
    }

    /// The first stored dependency of `subject_file` that belongs to `target_project_id`.
    pub fn lookup_edge(&self, subject_file: FileIdentifier, target_project_id: u64) -> Result<Option<FileIdentifier>> {
        self.conn()?
            .query_row(
                "SELECT dependency_project_id, dependency_file_id FROM dependency
                 WHERE project_id = ?1 AND file_id = ?2 AND dependency_project_id = ?3
                 ORDER BY rowid LIMIT 1",
                params![subject_file.project_id(), subject_file.file_id(), target_project_id],
                |row| Ok(FileIdentifier::new(row.get(0)?, row.get(1)?)),
            )
            .optional()
            .into_app_err_with(|| format!("unable to look up dependencies of {subject_file}"))
    }

    pub fn is_dependency_of(&self, subject_file: FileIdentifier, target_project_id: u64) -> Result<bool> {
        Ok(self.lookup_edge(subject_file, target_project_id)?.is_some())
    }

    /// Add `file` to the skip ledger, replacing any earlier entry.
    pub fn mark_skipped(&self, file: FileIdentifier, reason: SkipReason, url: &str) -> Result<()> {
        let _ = self
            .conn()?
            .execute(
                "INSERT INTO skipped_file (project_id, file_id, reason, timestamp, url) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (project_id, file_id) DO UPDATE SET
                     reason = excluded.reason, timestamp = excluded.timestamp, url = excluded.url",
                params![file.project_id(), file.file_id(), reason.code(), Utc::now().timestamp(), url],
            )
            .into_app_err_with(|| format!("unable to record skip of {file}"))?;

        log::debug!(target: LOG_TARGET, "Skip ledger: {file} marked {reason}");
        Ok(())
    }

    pub fn clear_skipped(&self, file: FileIdentifier) -> Result<()> {
        let _ = self
            .conn()?
            .execute(
                "DELETE FROM skipped_file WHERE project_id = ?1 AND file_id = ?2",
                params![file.project_id(), file.file_id()],
            )
            .into_app_err_with(|| format!("unable to clear skip record of {file}"))?;

        Ok(())
    }

    /// Skip ledger entries with `reason`, optionally limited to an exact timestamp, oldest first.
    pub fn list_skipped(&self, reason: SkipReason, timestamp: Option<i64>) -> Result<Vec<SkippedFile>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT project_id, file_id, reason, timestamp, url FROM skipped_file
                 WHERE reason = ?1 AND (?2 IS NULL OR timestamp = ?2)
                 ORDER BY timestamp, project_id, file_id",
            )
            .into_app_err("unable to prepare skip ledger query")?;

        let rows = stmt
            .query_map(params![reason.code(), timestamp], skipped_from_row)
            .into_app_err("unable to query skip ledger")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .into_app_err("unable to read skip ledger")
    }

    /// Every skip ledger entry, oldest first.
    pub fn list_all_skipped(&self) -> Result<Vec<SkippedFile>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT project_id, file_id, reason, timestamp, url FROM skipped_file ORDER BY timestamp, project_id, file_id")
            .into_app_err("unable to prepare skip ledger query")?;

        let rows = stmt.query_map([], skipped_from_row).into_app_err("unable to query skip ledger")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .into_app_err("unable to read skip ledger")
    }

    /// The skip ledger entry for `file`, if any.
    pub fn skipped(&self, file: FileIdentifier) -> Result<Option<SkippedFile>> {
        self.conn()?
            .query_row(
                "SELECT project_id, file_id, reason, timestamp, url FROM skipped_file WHERE project_id = ?1 AND file_id = ?2",
                params![file.project_id(), file.file_id()],
                skipped_from_row,
            )
            .optional()
            .into_app_err_with(|| format!("unable to read skip record of {file}"))
    }
}

fn skipped_from_row(row: &Row<'_>) -> rusqlite::Result<SkippedFile> {
    let code: i64 = row.get(2)?;
    let reason = SkipReason::from_code(code).ok_or(rusqlite::Error::IntegralValueOutOfRange(2, code))?;

    Ok(SkippedFile {
        file: FileIdentifier::new(row.get(0)?, row.get(1)?),
        reason,
        timestamp: row.get(3)?,
        url: row.get(4)?,
    })
}
