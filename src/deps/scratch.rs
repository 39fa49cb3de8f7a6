use super::FileIdentifier;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "   scratch";

/// A scratch download location that is deleted when dropped.
///
/// The file name is derived from the project and file ids so that downloads of different
/// files never share a path.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    #[must_use]
    pub fn new(scratch_dir: impl AsRef<Path>, file: FileIdentifier) -> Self {
        Self {
            path: scratch_dir.as_ref().join(file.scratch_name()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::trace!(target: LOG_TARGET, "Removed scratch file '{}'", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!(target: LOG_TARGET, "Could not remove scratch file '{}': {e}", self.path.display()),
        }
    }
}
