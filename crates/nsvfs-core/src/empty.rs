use crate::error::{Error, Result};
use crate::fs::{FileSystem, VfsFile};
use crate::record::FileRecord;
use std::fmt;

/// Always-empty directory; the default root binding of every scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFs;

impl FileSystem for EmptyFs {
    fn stat(&self, path: &str) -> Result<FileRecord> {
        if path == "/" {
            Ok(FileRecord::directory("/"))
        } else {
            Err(Error::NotExist(path.to_string()))
        }
    }

    fn read_dir(&self, path: &str) -> Result<Vec<FileRecord>> {
        if path == "/" {
            Ok(Vec::new())
        } else {
            Err(Error::NotExist(path.to_string()))
        }
    }

    fn open(&self, path: &str) -> Result<Box<dyn VfsFile>> {
        if path == "/" {
            Err(Error::IsADirectory(path.to_string()))
        } else {
            Err(Error::NotExist(path.to_string()))
        }
    }
}

impl fmt::Display for EmptyFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("empty(/)")
    }
}
