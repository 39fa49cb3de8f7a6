//! Where collected statistics end up.

mod data_lock;
mod null;
mod save_handler;
mod sqlite;

pub use data_lock::{DataDirLockGuard, acquire_data_dir_lock};
pub use null::NullSaveHandler;
pub use save_handler::SaveHandler;
pub use sqlite::{DependentProject, DownloadComposition, SqliteSaveHandler};
