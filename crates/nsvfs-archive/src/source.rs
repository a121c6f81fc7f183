//! Ways of producing a [`Reopen`] for an archive file.

use crate::engine::Reopen;
use nsvfs_core::{path, Error, FileSystem, OsFile, Result, VfsFile};
use std::path::PathBuf;
use std::sync::Arc;

/// Reopen a host file by path.
pub fn host_file(path: impl Into<PathBuf>) -> Reopen {
    let path = path.into();
    Arc::new(move || -> Result<Box<dyn VfsFile>> {
        let file =
            OsFile::open(&path).map_err(|e| Error::from_io(e, path.display().to_string()))?;
        Ok(Box::new(file))
    })
}

/// Reopen `name` through `fs` on every call.
pub fn in_filesystem(fs: Arc<dyn FileSystem>, name: &str) -> Reopen {
    let name = path::clean(name);
    Arc::new(move || fs.open(&name))
}
