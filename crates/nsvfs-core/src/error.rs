use std::io;
use thiserror::Error;

/// Errors that can occur when working with a virtual filesystem.
#[derive(Debug, Error)]
pub enum Error {
    /// The path is absent from the namespace or archive index.
    #[error("{0}: file does not exist")]
    NotExist(String),

    /// A directory operation was applied to a file.
    #[error("{0}: not a directory")]
    NotADirectory(String),

    /// A file operation was applied to a directory.
    #[error("{0}: is a directory")]
    IsADirectory(String),

    /// The archive header is malformed or uses an unsupported decoder version.
    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// Archive member streams only support rewinding to the start.
    #[error("unsupported seek in {0}")]
    UnsupportedSeek(String),

    /// I/O error from the host or a decoder.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Map a host I/O error, turning "not found" into [`Error::NotExist`] for `path`.
    pub fn from_io(err: io::Error, path: impl Into<String>) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Error::NotExist(path.into())
        } else {
            Error::Io(err)
        }
    }

    /// Reports whether this error means the path does not exist.
    pub fn is_not_exist(&self) -> bool {
        match self {
            Error::NotExist(_) => true,
            Error::Io(err) => err.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Reports whether an archive was rejected as not being of the probed format.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, Error::UnsupportedFormat(_))
    }
}

/// Convert VFS errors to `std::io::Error` for `Read`/`Seek` implementations.
impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::NotExist(_) => io::Error::new(io::ErrorKind::NotFound, e),
            Error::UnsupportedSeek(_) => io::Error::new(io::ErrorKind::Unsupported, e),
            Error::UnsupportedFormat(_) => io::Error::new(io::ErrorKind::InvalidData, e),
            Error::NotADirectory(_) | Error::IsADirectory(_) => io::Error::other(e),
        }
    }
}

/// Result type for VFS operations.
pub type Result<T> = std::result::Result<T, Error>;
