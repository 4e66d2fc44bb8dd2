//! Error types for yoko operations.

use thiserror::Error;
use zip::result::ZipError;

use crate::document::DocumentError;

/// Errors that can occur while repairing an EPUB.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid archive: {0}")]
    Archive(ZipError),

    #[error("encrypted archive entry: {0}")]
    Encrypted(String),

    #[error("cannot parse {entry}: {source}")]
    Parse {
        entry: String,
        #[source]
        source: DocumentError,
    },

    #[error("{0}")]
    Validation(String),
}

impl Error {
    /// True for errors caused by the zip container itself.
    pub fn is_archive_error(&self) -> bool {
        matches!(self, Error::Archive(_) | Error::Encrypted(_))
    }
}

impl From<ZipError> for Error {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::Io(io) => Error::Io(io),
            other => Error::Archive(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
