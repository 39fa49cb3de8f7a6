//! Dependency resolution: which files of which projects bundle a given project.

mod fetcher;
mod file_identifier;
pub mod manifest;
mod resolver;
mod scratch;
mod skip_reason;
mod store;

pub use fetcher::{BoundedFetcher, FetchError};
pub use file_identifier::FileIdentifier;
pub use manifest::ManifestError;
pub use resolver::{DependencyResolver, ProjectDependents, Resolution, ResolverOptions, RetrySummary};
pub use scratch::ScratchFile;
pub use skip_reason::SkipReason;
pub use store::{DependencyStore, SkippedFile};
