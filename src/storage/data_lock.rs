use crate::Result;
use fs4::fs_std::FileExt;
use ohno::IntoAppError;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Log target for `data_lock`
const LOG_TARGET: &str = "   storage";

/// Guard that releases the data directory lock when dropped
#[derive(Debug)]
pub struct DataDirLockGuard(File);

impl Drop for DataDirLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.unlock() {
            log::warn!(target: LOG_TARGET, "Failed to unlock data directory: {e}");
        }
    }
}

/// Take an exclusive advisory lock on the data directory, waiting for other processes to
/// release it first.
///
/// Only one process may write the databases in a data directory at a time.
pub async fn acquire_data_dir_lock(data_dir: &Path) -> Result<DataDirLockGuard> {
    let lock_path = data_dir.join("modstats.lock");

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .into_app_err_with(|| format!("Failed to open data directory lock file at '{}'", lock_path.display()))?;

    // Blocking may take arbitrarily long
    let file = tokio::task::spawn_blocking(move || {
        file.lock_exclusive()
            .into_app_err_with(|| format!("Failed to acquire exclusive lock on '{}'", lock_path.display()))?;
        log::debug!(target: LOG_TARGET, "Acquired data directory lock at '{}'", lock_path.display());
        Ok::<_, ohno::AppError>(file)
    })
    .await
    .into_app_err("Lock task panicked")??;

    Ok(DataDirLockGuard(file))
}
