use core::fmt::{Display, Formatter, Result as FmtResult};
use serde::{Deserialize, Serialize};

/// Identifies one distributable file of one project.
///
/// The same type names both ends of a dependency edge; call sites distinguish the file being
/// inspected (`subject_file`) from the file it bundles (`dependency_file`) by naming alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileIdentifier {
    project_id: u64,
    file_id: u64,
}

impl FileIdentifier {
    #[must_use]
    pub const fn new(project_id: u64, file_id: u64) -> Self {
        Self { project_id, file_id }
    }

    #[must_use]
    pub const fn project_id(&self) -> u64 {
        self.project_id
    }

    #[must_use]
    pub const fn file_id(&self) -> u64 {
        self.file_id
    }

    /// Name used for the scratch download of this file, unique per file.
    #[must_use]
    pub fn scratch_name(&self) -> String {
        format!("{}_{}", self.project_id, self.file_id)
    }
}

impl Display for FileIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.project_id, self.file_id)
    }
}
