mod collect;
mod common;
mod init;
mod report;
mod retry;
mod skipped;
mod validate;

pub use collect::{CollectArgs, collect};
pub use init::{InitArgs, init_config};
pub use report::{ReportArgs, report};
pub use retry::{RetryArgs, retry};
pub use skipped::{SkippedArgs, list_skipped};
pub use validate::{ValidateArgs, validate_config};
