//! Clients for the remote services the collector talks to.
//!
//! - [`CurseForgeClient`]: project and file metadata from the marketplace.
//! - [`ModpackIndexClient`]: discovery of the modpacks that bundle a mod.
//!
//! Both clients share a [`Pacer`] so that the combined request rate stays polite.

pub mod curseforge;
mod http;
pub mod modpack_index;
mod pacer;
mod records;

pub use curseforge::CurseForgeClient;
pub use http::DEFAULT_REQUEST_TIMEOUT;
pub use modpack_index::ModpackIndexClient;
pub use pacer::Pacer;
pub use records::{Author, FileRecord, LatestFileIndex, Links, Logo, ProjectRecord, ReleaseType};
