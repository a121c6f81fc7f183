use crate::error::Result;
use crate::record::FileRecord;
use std::fmt;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

/// Readable, seekable stream returned by [`FileSystem::open`].
///
/// Dropping the stream closes it.
pub trait VfsFile: Read + Seek + Send {
    /// Whether arbitrary seeks work, as opposed to rewinding to the start only.
    fn is_seekable(&self) -> bool {
        true
    }

    /// Host path backing this stream, when there is one.
    fn host_path(&self) -> Option<&Path> {
        None
    }
}

impl VfsFile for Cursor<Vec<u8>> {}

/// A read-only (virtual) filesystem addressed by slash-separated paths.
///
/// `Display` provides a human readable label with no functional contract.
pub trait FileSystem: fmt::Display + Send + Sync {
    /// Stat `path`, following symlinks.
    fn stat(&self, path: &str) -> Result<FileRecord>;

    /// Stat `path` without following symlinks.
    fn lstat(&self, path: &str) -> Result<FileRecord> {
        self.stat(path)
    }

    /// List the directory at `path`, sorted by name.
    fn read_dir(&self, path: &str) -> Result<Vec<FileRecord>>;

    /// Open the regular file at `path` for reading.
    fn open(&self, path: &str) -> Result<Box<dyn VfsFile>>;
}
