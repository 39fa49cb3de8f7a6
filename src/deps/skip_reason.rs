use clap::ValueEnum;
use strum::{Display, EnumIter};

/// Why the resolver declined to fully process a file.
///
/// The discriminants are the values persisted in the skip ledger and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, ValueEnum)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// The file (or its whole project) has never been downloaded.
    ZeroDownloads = 0,

    /// The file is larger than the configured download ceiling.
    DownloadTooLarge = 2,

    /// The file could not be retrieved.
    DownloadError = 3,

    /// The archive or its manifest could not be read.
    FileParsingError = 4,
}

impl SkipReason {
    #[must_use]
    pub const fn code(self) -> i64 {
        self as i64
    }

    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::ZeroDownloads),
            2 => Some(Self::DownloadTooLarge),
            3 => Some(Self::DownloadError),
            4 => Some(Self::FileParsingError),
            _ => None,
        }
    }
}
