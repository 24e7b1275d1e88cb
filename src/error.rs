use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tokio::task::JoinError;

use crate::zip::ParseError;

/// Errors that abort an archive build.
#[derive(Debug, Error)]
pub enum Error {
    #[error("input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("cannot read {}: {source}", path.display())]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed nested archive {}: {source}", path.display())]
    MalformedNestedArchive {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("cannot write {}: {source}", path.display())]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("duplicate entry name {name}")]
    DuplicateEntryName { name: String },

    #[error("{} is {size} bytes, too large for an entry without ZIP64", path.display())]
    EntryTooLarge { path: PathBuf, size: u64 },

    #[error("archive requires ZIP64: {0}")]
    Zip64Required(String),

    #[error("producer task failed: {0}")]
    Task(#[from] JoinError),

    #[error("build was cancelled before all producers finished")]
    Cancelled,
}

impl Error {
    /// Classify a failed read of an input path.
    pub fn input(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Error::InputNotFound { path }
        } else {
            Error::InputUnreadable { path, source }
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
